// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topic grammar used by the gateway.
//!
//! The gateway works against a fixed set of topics on a single broker:
//!
//! | Pattern | Direction |
//! |---|---|
//! | `homeassistant/+/+/config` | subscribe |
//! | `home/+/+/state` | subscribe |
//! | `discovery/devices/+/announce` | subscribe |
//! | `discovery/devices/+/leave` | subscribe |
//! | `devices/+/status` | subscribe |
//! | `devices/+/telemetry` | subscribe |
//! | `devices/{id}/commands` | publish |
//! | `system/discovery/start`, `system/discovery/stop` | publish |

mod matcher;

pub use matcher::{SINGLE_LEVEL_WILDCARD, matches};

/// Home-Assistant style discovery configuration topics.
pub const HOME_ASSISTANT_CONFIG: &str = "homeassistant/+/+/config";

/// Generic device state topics whose presence implies a device.
pub const HOME_STATE: &str = "home/+/+/state";

/// Explicit device announcements from a discovery agent.
pub const DISCOVERY_ANNOUNCE: &str = "discovery/devices/+/announce";

/// Explicit device departures from a discovery agent.
pub const DISCOVERY_LEAVE: &str = "discovery/devices/+/leave";

/// Device online/offline status topics.
pub const DEVICE_STATUS: &str = "devices/+/status";

/// Device telemetry topics.
pub const DEVICE_TELEMETRY: &str = "devices/+/telemetry";

/// Control topic asking discovery agents to start scanning.
pub const DISCOVERY_START: &str = "system/discovery/start";

/// Control topic asking discovery agents to stop scanning.
pub const DISCOVERY_STOP: &str = "system/discovery/stop";

/// Returns the command topic for a device.
///
/// # Examples
///
/// ```
/// assert_eq!(homegate::topic::command_topic("lamp"), "devices/lamp/commands");
/// ```
#[must_use]
pub fn command_topic(device_id: &str) -> String {
    format!("devices/{device_id}/commands")
}

/// Splits a topic into its `/`-delimited segments.
pub(crate) fn segments(topic: &str) -> Vec<&str> {
    topic.split('/').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_topic_format() {
        assert_eq!(command_topic("abc"), "devices/abc/commands");
    }

    #[test]
    fn subscription_patterns_match_their_topics() {
        assert!(matches(HOME_ASSISTANT_CONFIG, "homeassistant/sensor/node/config"));
        assert!(matches(HOME_STATE, "home/light/kitchen/state"));
        assert!(matches(DISCOVERY_ANNOUNCE, "discovery/devices/abc/announce"));
        assert!(matches(DISCOVERY_LEAVE, "discovery/devices/abc/leave"));
        assert!(matches(DEVICE_STATUS, "devices/abc/status"));
        assert!(matches(DEVICE_TELEMETRY, "devices/abc/telemetry"));
    }

    #[test]
    fn segments_keep_empty_parts() {
        assert_eq!(segments("/a//b/"), vec!["", "a", "", "b", ""]);
    }
}
