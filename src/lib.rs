// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Homegate - MQTT device discovery and state synchronization.
//!
//! This library keeps one broker connection per application and turns the
//! traffic on it into live streams of discovered devices and device states.
//!
//! # Supported Topics
//!
//! | Topic | Meaning |
//! |---|---|
//! | `homeassistant/+/+/config` | Home Assistant discovery config |
//! | `home/+/+/state` | Device presence and state |
//! | `discovery/devices/+/announce` | Reply to a discovery request |
//! | `discovery/devices/+/leave` | Device going away |
//! | `devices/+/status` | Online flag, battery, temperature |
//! | `devices/+/telemetry` | Battery, temperature |
//! | `devices/{id}/commands` | Outgoing commands |
//! | `system/discovery/start`, `system/discovery/stop` | Discovery control |
//!
//! Topic patterns support the single-level wildcard `+` only.
//!
//! # Quick Start
//!
//! ```no_run
//! use homegate::config::{GatewayConfig, MqttBrokerConfig};
//! use homegate::model::Command;
//! use homegate::source::DeviceDataSource;
//! use tokio_stream::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> homegate::Result<()> {
//!     let broker = MqttBrokerConfig::from_url("mqtt://192.168.1.50:1883")?;
//!     let source = DeviceDataSource::mqtt(broker, GatewayConfig::new());
//!
//!     // Subscriptions made before connecting are replayed once connected
//!     let mut states = source.subscribe_to_device_states().await?;
//!     source.connect().await?;
//!
//!     source
//!         .send_device_command("lamp-1", &Command::new("toggle", Vec::new(), "lamp-1"))
//!         .await?;
//!
//!     while let Some(batch) = states.next().await {
//!         for state in batch {
//!             println!("{} online={}", state.device_id, state.is_online);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Feature Flags
//!
//! - `mqtt` (default): the `rumqttc` transport. Without it, supply your own
//!   [`protocol::Transport`].

pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod protocol;
pub mod source;
pub mod store;
pub mod subscription;
pub mod topic;

pub use config::{DispatchPolicy, GatewayConfig, MqttBrokerConfig};
pub use error::{Error, ParseError, ProtocolError, Result, StoreError};
pub use model::{Command, DeviceState, DeviceType, DiscoveredDevice};
#[cfg(feature = "mqtt")]
pub use protocol::MqttTransport;
pub use protocol::{ConnectionManager, ConnectionState, MqttMessage, Transport};
pub use source::{DeviceDataSource, DeviceStream};
pub use store::{DeviceRepository, KeyValueStore, MemoryStore};
pub use subscription::{SubscriptionHandle, SubscriptionId};
