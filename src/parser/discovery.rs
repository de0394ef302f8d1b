// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parsers for discovery topics.

use serde_json::Value;

use crate::model::{DeviceType, DiscoveredDevice, UNKNOWN_FIELD};
use crate::topic::segments;

use super::{json_object, string_field};

/// Name used when a discovery config carries none.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";

/// Parses a Home-Assistant discovery config.
///
/// Topic: `homeassistant/<component>/<node_id>/.../config` (at least four
/// segments). The payload must be a JSON object. The device id is
/// `device.identifiers[0]` when present, otherwise the node id.
///
/// # Examples
///
/// ```
/// use homegate::model::DeviceType;
/// use homegate::parser::parse_discovery_config;
///
/// let device = parse_discovery_config(
///     "homeassistant/light/kitchen/config",
///     r#"{"name":"Kitchen","device":{"identifiers":["hue-1"],"manufacturer":"Signify"}}"#,
/// ).unwrap();
/// assert_eq!(device.id, "hue-1");
/// assert_eq!(device.device_type, DeviceType::SmartLight);
/// ```
#[must_use]
pub fn parse_discovery_config(topic: &str, payload: &str) -> Option<DiscoveredDevice> {
    let parts = segments(topic);
    if parts.len() < 4 || parts[0] != "homeassistant" {
        return None;
    }

    let config = json_object(payload)?;
    let device_info = config.get("device").and_then(Value::as_object);

    let name = string_field(&config, "name").unwrap_or(UNKNOWN_DEVICE_NAME);
    let manufacturer = device_info
        .and_then(|d| string_field(d, "manufacturer"))
        .unwrap_or(UNKNOWN_FIELD);
    let model = device_info
        .and_then(|d| string_field(d, "model"))
        .unwrap_or(UNKNOWN_FIELD);

    let identifier = device_info
        .and_then(|d| d.get("identifiers"))
        .and_then(|ids| match ids {
            Value::Array(items) => items.first().and_then(Value::as_str),
            Value::String(id) => Some(id.as_str()),
            _ => None,
        })
        .filter(|id| !id.is_empty());
    let id = identifier.unwrap_or(parts[2]);
    if id.is_empty() {
        return None;
    }

    Some(
        DiscoveredDevice::new(id, name, DeviceType::from_component(parts[1]))
            .with_vendor(manufacturer, model),
    )
}

/// Infers a device from a `home/<component>/<id>/state` message.
///
/// Any non-empty payload counts as a presence signal. The display name is
/// derived from the id: `living_room_temp` becomes `Living Room Temp`.
#[must_use]
pub fn parse_state_topic_discovery(topic: &str, payload: &str) -> Option<DiscoveredDevice> {
    let parts = segments(topic);
    if parts.len() < 4 || parts[0] != "home" || parts[3] != "state" || payload.is_empty() {
        return None;
    }

    let id = parts[2];
    if id.is_empty() {
        return None;
    }

    Some(DiscoveredDevice::new(
        id,
        title_case(id),
        DeviceType::from_component(parts[1]),
    ))
}

/// Parses an explicit announcement on `discovery/devices/<id>/announce`.
///
/// Payload: `{"deviceId": ..., "name": ..., "type": ..., "signalStrength": ...}`.
/// Only `deviceId` is required.
#[must_use]
pub fn parse_announce(topic: &str, payload: &str) -> Option<DiscoveredDevice> {
    let parts = segments(topic);
    if parts.len() < 4 || parts[0] != "discovery" || parts[1] != "devices" {
        return None;
    }

    let announce = json_object(payload)?;
    let id = string_field(&announce, "deviceId").filter(|id| !id.is_empty())?;
    let name = string_field(&announce, "name").unwrap_or(id);
    let device_type = string_field(&announce, "type").map_or(DeviceType::Unknown, DeviceType::from_name);

    let mut device = DiscoveredDevice::new(id, name, device_type);
    device.signal_strength = announce
        .get("signalStrength")
        .and_then(Value::as_i64)
        .and_then(|rssi| i32::try_from(rssi).ok());
    Some(device)
}

/// Returns the id of a device that left, from a `{"deviceId": ...}` payload.
///
/// The topic is not validated.
#[must_use]
pub fn parse_discovery_leave(_topic: &str, payload: &str) -> Option<String> {
    let leave = json_object(payload)?;
    string_field(&leave, "deviceId").map(str::to_string)
}

/// `living_room_temp` -> `Living Room Temp`.
fn title_case(id: &str) -> String {
    id.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
