// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parsers for status and telemetry topics.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::model::{DeviceState, DeviceType, LightState, TemperatureSensorState};
use crate::topic::segments;

use super::{json_object, string_field, timestamp_field};

/// Parses `devices/<id>/status`.
///
/// The payload must be a JSON object with a boolean `online` field.
/// `battery` and `temperature` are read when present. `last_update` is the
/// parse time.
#[must_use]
pub fn parse_status(topic: &str, payload: &str) -> Option<DeviceState> {
    let device_id = device_topic_id(topic, "status")?;
    let status = json_object(payload)?;
    let online = status.get("online").and_then(Value::as_bool)?;

    Some(state_from_readings(device_id, online, &status, payload))
}

/// Parses `devices/<id>/telemetry`.
///
/// Telemetry carries no `online` flag: a device sending telemetry is online.
#[must_use]
pub fn parse_telemetry(topic: &str, payload: &str) -> Option<DeviceState> {
    let device_id = device_topic_id(topic, "telemetry")?;
    let telemetry = json_object(payload)?;

    Some(state_from_readings(device_id, true, &telemetry, payload))
}

/// Parses `home/<component>/<id>[/...]` state messages.
///
/// An empty payload means the device is offline and carries no readings.
/// Otherwise the device is online and the raw payload is kept. For
/// temperature sensors and lights the JSON payload is decoded into the
/// matching sub-record, using its embedded `timestamp` when present. A
/// payload whose sub-record cannot be decoded still yields a record, with
/// that sub-record left empty.
///
/// # Examples
///
/// ```
/// use homegate::parser::parse_home_state;
///
/// let state = parse_home_state("home/sensor/living_room_temp", "").unwrap();
/// assert!(!state.is_online);
/// assert!(state.temperature_sensor.is_none());
/// ```
#[must_use]
pub fn parse_home_state(topic: &str, payload: &str) -> Option<DeviceState> {
    let parts = segments(topic);
    if parts.len() < 3 || parts[0] != "home" || parts[2].is_empty() {
        return None;
    }

    let device_type = DeviceType::from_component(parts[1]);
    if payload.trim().is_empty() {
        return Some(DeviceState::new(parts[2], device_type, false));
    }

    let mut state = DeviceState::new(parts[2], device_type, true).with_payload(payload);
    let Some(object) = json_object(payload) else {
        return Some(state);
    };

    state.battery = object.get("battery").and_then(Value::as_i64);
    state.temperature = object.get("temperature").and_then(Value::as_f64);

    match device_type {
        DeviceType::TemperatureSensor => {
            state.temperature_sensor = temperature_sensor(&object);
        }
        DeviceType::SmartLight => {
            state.light_state = light_state(&object);
        }
        _ => {}
    }

    Some(state)
}

/// Extracts `<id>` from `devices/<id>/<kind>`.
fn device_topic_id<'a>(topic: &'a str, kind: &str) -> Option<&'a str> {
    match segments(topic).as_slice() {
        ["devices", id, suffix] if *suffix == kind && !id.is_empty() => Some(*id),
        _ => None,
    }
}

fn state_from_readings(
    device_id: &str,
    online: bool,
    readings: &Map<String, Value>,
    payload: &str,
) -> DeviceState {
    let device_type = string_field(readings, "type").map_or(DeviceType::Unknown, DeviceType::from_name);

    let mut state = DeviceState::new(device_id, device_type, online).with_payload(payload);
    state.battery = readings.get("battery").and_then(Value::as_i64);
    state.temperature = readings.get("temperature").and_then(Value::as_f64);
    state
}

fn temperature_sensor(object: &Map<String, Value>) -> Option<TemperatureSensorState> {
    let temperature = object.get("temperature").and_then(Value::as_f64)?;
    Some(TemperatureSensorState {
        temperature,
        battery: object.get("battery").and_then(Value::as_i64),
        timestamp: timestamp_field(object, "timestamp").unwrap_or_else(Utc::now),
    })
}

fn light_state(object: &Map<String, Value>) -> Option<LightState> {
    let on = match object.get("on").or_else(|| object.get("state"))? {
        Value::Bool(on) => *on,
        Value::String(s) if s.eq_ignore_ascii_case("on") => true,
        Value::String(s) if s.eq_ignore_ascii_case("off") => false,
        _ => return None,
    };
    Some(LightState {
        on,
        brightness: object.get("brightness").and_then(Value::as_i64),
        timestamp: timestamp_field(object, "timestamp").unwrap_or_else(Utc::now),
    })
}
