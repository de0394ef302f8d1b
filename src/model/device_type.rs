// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closed set of device kinds the gateway understands.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a discovered device.
///
/// Topic grammars name device kinds by their Home-Assistant component
/// (`light`, `sensor`, ...). [`DeviceType::from_component`] maps those names;
/// anything unrecognised becomes [`DeviceType::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceType {
    /// Dimmable or switchable light.
    SmartLight,
    /// Temperature (and usually battery) sensor.
    TemperatureSensor,
    /// Switchable plug.
    SmartPlug,
    /// Climate controller.
    SmartThermostat,
    /// Door lock.
    SmartLock,
    /// Camera.
    SmartCamera,
    /// Anything else.
    #[default]
    Unknown,
}

impl DeviceType {
    /// Maps a Home-Assistant component name to a device type (case-insensitive).
    ///
    /// # Examples
    ///
    /// ```
    /// use homegate::model::DeviceType;
    ///
    /// assert_eq!(DeviceType::from_component("Light"), DeviceType::SmartLight);
    /// assert_eq!(DeviceType::from_component("fan"), DeviceType::Unknown);
    /// ```
    #[must_use]
    pub fn from_component(component: &str) -> Self {
        match component.to_ascii_lowercase().as_str() {
            "light" => Self::SmartLight,
            "sensor" => Self::TemperatureSensor,
            "switch" => Self::SmartPlug,
            "climate" => Self::SmartThermostat,
            "lock" => Self::SmartLock,
            "camera" => Self::SmartCamera,
            _ => Self::Unknown,
        }
    }

    /// Maps either a component name or a device type name (`smartLight`, ...).
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match Self::from_component(name) {
            Self::Unknown => Self::ALL
                .iter()
                .copied()
                .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
                .unwrap_or(Self::Unknown),
            kind => kind,
        }
    }

    /// Every device type, `Unknown` last.
    pub const ALL: [Self; 7] = [
        Self::SmartLight,
        Self::TemperatureSensor,
        Self::SmartPlug,
        Self::SmartThermostat,
        Self::SmartLock,
        Self::SmartCamera,
        Self::Unknown,
    ];

    /// Returns the wire name of this type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SmartLight => "smartLight",
            Self::TemperatureSensor => "temperatureSensor",
            Self::SmartPlug => "smartPlug",
            Self::SmartThermostat => "smartThermostat",
            Self::SmartLock => "smartLock",
            Self::SmartCamera => "smartCamera",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
