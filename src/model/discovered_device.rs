// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Devices learned from passive discovery traffic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DeviceType;

/// Placeholder used when a discovery payload carries no manufacturer or model.
pub const UNKNOWN_FIELD: &str = "Unknown";

/// A device whose presence was inferred from broker traffic.
///
/// Identity is [`id`](Self::id): two records with the same id describe the
/// same device and the newer one replaces the older one in the discovery
/// cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredDevice {
    /// Unique device identifier.
    pub id: String,
    /// Human readable name.
    pub name: String,
    /// Device kind.
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    /// Manufacturer, `"Unknown"` when not reported.
    pub manufacturer: String,
    /// Model, `"Unknown"` when not reported.
    pub model: String,
    /// Signal strength (RSSI, dBm) when reported.
    pub signal_strength: Option<i32>,
    /// When the device was last seen.
    pub discovered_at: DateTime<Utc>,
    /// Whether the user already added this device.
    pub is_already_added: bool,
}

impl DiscoveredDevice {
    /// Creates a record stamped with the current time and unknown vendor data.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            device_type,
            manufacturer: UNKNOWN_FIELD.to_string(),
            model: UNKNOWN_FIELD.to_string(),
            signal_strength: None,
            discovered_at: Utc::now(),
            is_already_added: false,
        }
    }

    /// Sets manufacturer and model.
    #[must_use]
    pub fn with_vendor(mut self, manufacturer: impl Into<String>, model: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self.model = model.into();
        self
    }

    /// Sets the reported signal strength.
    #[must_use]
    pub fn with_signal_strength(mut self, rssi: i32) -> Self {
        self.signal_strength = Some(rssi);
        self
    }

    /// Overrides the discovery timestamp.
    #[must_use]
    pub fn discovered_at(mut self, at: DateTime<Utc>) -> Self {
        self.discovered_at = at;
        self
    }

    /// Returns the age of this record relative to `now`.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.discovered_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_unknown_vendor() {
        let device = DiscoveredDevice::new("lamp", "Lamp", DeviceType::SmartLight);
        assert_eq!(device.manufacturer, "Unknown");
        assert_eq!(device.model, "Unknown");
        assert!(device.signal_strength.is_none());
        assert!(!device.is_already_added);
    }

    #[test]
    fn age_is_relative_to_now() {
        let now = Utc::now();
        let device = DiscoveredDevice::new("lamp", "Lamp", DeviceType::SmartLight)
            .discovered_at(now - chrono::Duration::seconds(42));
        assert_eq!(device.age(now).num_seconds(), 42);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let device = DiscoveredDevice::new("plug-1", "Plug", DeviceType::SmartPlug)
            .with_vendor("Acme", "P1")
            .with_signal_strength(-60);
        let json = serde_json::to_value(&device).unwrap();

        assert_eq!(json["id"], "plug-1");
        assert_eq!(json["type"], "smartPlug");
        assert_eq!(json["signalStrength"], -60);
        assert_eq!(json["isAlreadyAdded"], false);
        assert!(json.get("discoveredAt").is_some());
    }
}
