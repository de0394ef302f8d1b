// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Commands sent to devices.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A command addressed to a single device.
///
/// Commands are JSON-encoded and published to `devices/{id}/commands`.
///
/// # Examples
///
/// ```
/// use homegate::model::Command;
///
/// let command = Command::json("setBrightness", &serde_json::json!({"level": 40}), "lamp").unwrap();
/// assert_eq!(command.command_type, "setBrightness");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Command name understood by the device.
    #[serde(rename = "type")]
    pub command_type: String,
    /// Opaque command payload.
    pub payload: Vec<u8>,
    /// Identifier of the target device.
    pub target_device: String,
}

impl Command {
    /// Creates a command with a raw payload.
    #[must_use]
    pub fn new(
        command_type: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        target_device: impl Into<String>,
    ) -> Self {
        Self {
            command_type: command_type.into(),
            payload: payload.into(),
            target_device: target_device.into(),
        }
    }

    /// Creates a command whose payload is the JSON encoding of `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] if `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(
        command_type: impl Into<String>,
        value: &T,
        target_device: impl Into<String>,
    ) -> Result<Self, ParseError> {
        Ok(Self::new(
            command_type,
            serde_json::to_vec(value)?,
            target_device,
        ))
    }

    /// Encodes the command as the JSON published on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ParseError> {
        serde_json::to_string(self).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_json_uses_wire_keys() {
        let command = Command::new("toggle", b"on".to_vec(), "plug");
        let json: serde_json::Value = serde_json::from_str(&command.to_json().unwrap()).unwrap();

        assert_eq!(json["type"], "toggle");
        assert_eq!(json["targetDevice"], "plug");
        assert_eq!(json["payload"], serde_json::json!([111, 110]));
    }

    #[test]
    fn json_payload_holds_encoded_value() {
        let command = Command::json("set", &serde_json::json!({"on": true}), "lamp").unwrap();
        assert_eq!(command.payload, br#"{"on":true}"#.to_vec());
    }
}
