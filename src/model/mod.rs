// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Domain records produced and consumed by the gateway.

mod command;
mod device_state;
mod device_type;
mod discovered_device;

pub use command::Command;
pub use device_state::{DeviceState, LightState, TemperatureSensorState};
pub use device_type::DeviceType;
pub use discovered_device::{DiscoveredDevice, UNKNOWN_FIELD};
