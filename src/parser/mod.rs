// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stateless decoders for broker messages.
//!
//! Every parser has the shape `(topic, payload) -> Option<T>`. A parser
//! returns `None` when the topic has the wrong shape (arity, prefix, missing
//! id) or when a required field is missing. Optional sub-structures that fail
//! to decode are left empty instead of rejecting the whole message. Parsers do
//! no I/O and can be called from any thread.
//!
//! # Examples
//!
//! ```
//! use homegate::parser::{parse_discovery_leave, parse_status};
//!
//! let state = parse_status("devices/abc/status", r#"{"online":true,"battery":85}"#).unwrap();
//! assert!(state.is_online);
//! assert_eq!(state.battery, Some(85));
//!
//! assert_eq!(parse_discovery_leave("discovery/devices/xyz/leave", r#"{"deviceId":"xyz"}"#), Some("xyz".to_string()));
//! ```

mod discovery;
mod state;

pub use discovery::{
    UNKNOWN_DEVICE_NAME, parse_announce, parse_discovery_config, parse_discovery_leave,
    parse_state_topic_discovery,
};
pub use state::{parse_home_state, parse_status, parse_telemetry};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Decodes a payload that must be a JSON object.
fn json_object(payload: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            tracing::debug!("Payload is JSON but not an object");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "Payload is not valid JSON");
            None
        }
    }
}

/// Reads an optional string field.
fn string_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

/// Reads an optional timestamp given as unix seconds or RFC 3339.
fn timestamp_field(object: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    match object.get(key)? {
        Value::Number(n) => {
            let secs = n.as_f64()?;
            #[allow(clippy::cast_possible_truncation)]
            let millis = (secs * 1000.0).round() as i64;
            DateTime::from_timestamp_millis(millis)
        }
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        _ => None,
    }
}
