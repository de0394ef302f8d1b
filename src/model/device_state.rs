// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Latest known state of a device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DeviceType;

/// Reading from a temperature sensor payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureSensorState {
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Battery level in percent.
    pub battery: Option<i64>,
    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,
}

/// State reported by a light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightState {
    /// Whether the light is on.
    pub on: bool,
    /// Brightness when reported.
    pub brightness: Option<i64>,
    /// When the state was reported.
    pub timestamp: DateTime<Utc>,
}

/// Latest state of a device, keyed by [`device_id`](Self::device_id).
///
/// State records are replaced wholesale by the state cache: the last record
/// to arrive wins.
///
/// # Examples
///
/// ```
/// use homegate::model::{DeviceState, DeviceType};
///
/// let state = DeviceState::new("abc", DeviceType::TemperatureSensor, true)
///     .with_battery(85)
///     .with_temperature(22.5);
/// assert_eq!(state.battery, Some(85));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceState {
    /// Device identifier.
    pub device_id: String,
    /// Device kind.
    pub device_type: DeviceType,
    /// Whether the device is reachable.
    pub is_online: bool,
    /// When this record was produced.
    pub last_update: DateTime<Utc>,
    /// Raw payload the record was decoded from.
    pub payload: Option<String>,
    /// Battery level in percent.
    pub battery: Option<i64>,
    /// Temperature in degrees Celsius.
    pub temperature: Option<f64>,
    /// Temperature sensor reading, for sensor payloads.
    pub temperature_sensor: Option<TemperatureSensorState>,
    /// Light state, for light payloads.
    pub light_state: Option<LightState>,
}

impl DeviceState {
    /// Creates a state record stamped with the current time.
    #[must_use]
    pub fn new(device_id: impl Into<String>, device_type: DeviceType, is_online: bool) -> Self {
        Self {
            device_id: device_id.into(),
            device_type,
            is_online,
            last_update: Utc::now(),
            payload: None,
            battery: None,
            temperature: None,
            temperature_sensor: None,
            light_state: None,
        }
    }

    /// Sets the battery level.
    #[must_use]
    pub fn with_battery(mut self, battery: i64) -> Self {
        self.battery = Some(battery);
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the raw payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_has_no_readings() {
        let state = DeviceState::new("x", DeviceType::Unknown, false);
        assert!(!state.is_online);
        assert!(state.battery.is_none());
        assert!(state.temperature.is_none());
        assert!(state.temperature_sensor.is_none());
        assert!(state.light_state.is_none());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let state = DeviceState::new("x", DeviceType::SmartLight, true).with_payload("{}");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["deviceId"], "x");
        assert_eq!(json["deviceType"], "smartLight");
        assert_eq!(json["isOnline"], true);
        assert_eq!(json["payload"], "{}");
    }
}
