// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration for the broker connection and the gateway.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use homegate::config::{DispatchPolicy, GatewayConfig, MqttBrokerConfig};
//!
//! let broker = MqttBrokerConfig::builder()
//!     .host("192.168.1.50")
//!     .port(1883)
//!     .credentials("user", "password")
//!     .keep_alive(Duration::from_secs(60))
//!     .build();
//!
//! let gateway = GatewayConfig::new()
//!     .with_dispatch_policy(DispatchPolicy::FanOut)
//!     .with_discovery_ttl(Duration::from_secs(120));
//! # let _ = (broker, gateway);
//! ```

use std::time::Duration;

use uuid::Uuid;

use crate::cache::{DEFAULT_DISCOVERY_CAPACITY, DEFAULT_DISCOVERY_TTL};
use crate::error::ProtocolError;

/// Default MQTT port.
pub const DEFAULT_PORT: u16 = 1883;

/// Prefix of generated client ids.
const CLIENT_ID_PREFIX: &str = "homegate";

/// Generates a unique client id.
#[must_use]
pub fn generate_client_id() -> String {
    format!("{CLIENT_ID_PREFIX}-{}", Uuid::new_v4().simple())
}

/// Configuration for an MQTT broker connection.
///
/// Credentials are passed through to the broker untouched.
#[derive(Debug, Clone)]
pub struct MqttBrokerConfig {
    host: String,
    port: u16,
    client_id: String,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
    clean_session: bool,
    request_capacity: usize,
}

impl Default for MqttBrokerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            client_id: generate_client_id(),
            credentials: None,
            keep_alive: Duration::from_secs(30),
            clean_session: true,
            request_capacity: 10,
        }
    }
}

impl MqttBrokerConfig {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> MqttBrokerConfigBuilder {
        MqttBrokerConfigBuilder::default()
    }

    /// Creates a configuration from a broker URL.
    ///
    /// Accepts `mqtt://host:port`, `tcp://host:port`, or a bare `host[:port]`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidAddress`] if the host is empty or the
    /// port is not a number.
    pub fn from_url(url: &str) -> Result<Self, ProtocolError> {
        let (host, port) = parse_mqtt_url(url)?;
        Ok(Self::builder().host(host).port(port).build())
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the client id presented to the broker.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the credentials if configured.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(u, p)| (u.as_str(), p.as_str()))
    }

    /// Returns the keep-alive interval.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Returns whether a clean session is requested.
    #[must_use]
    pub fn clean_session(&self) -> bool {
        self.clean_session
    }

    /// Returns the capacity of the client request queue.
    #[must_use]
    pub fn request_capacity(&self) -> usize {
        self.request_capacity
    }
}

/// Builder for [`MqttBrokerConfig`].
#[derive(Debug, Default)]
pub struct MqttBrokerConfigBuilder {
    config: MqttBrokerConfig,
}

impl MqttBrokerConfigBuilder {
    /// Sets the broker host address.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the broker port (default: 1883).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Sets the client id (default: `homegate-<uuid>`).
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.client_id = client_id.into();
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.config.keep_alive = duration;
        self
    }

    /// Sets whether to request a clean session (default: true).
    #[must_use]
    pub fn clean_session(mut self, clean: bool) -> Self {
        self.config.clean_session = clean;
        self
    }

    /// Sets the client request queue capacity (default: 10).
    #[must_use]
    pub fn request_capacity(mut self, capacity: usize) -> Self {
        self.config.request_capacity = capacity.max(1);
        self
    }

    /// Finishes the configuration.
    #[must_use]
    pub fn build(self) -> MqttBrokerConfig {
        self.config
    }
}

/// How inbound messages are dispatched when several handler patterns match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchPolicy {
    /// A handler registered for the exact topic string runs alone; wildcard
    /// handlers are only scanned when no exact handler exists.
    #[default]
    ExactFirst,
    /// Every matching handler runs, exact or wildcard.
    FanOut,
}

/// Configuration for the gateway data source.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    client_id: String,
    discovery_ttl: Duration,
    discovery_capacity: usize,
    dispatch_policy: DispatchPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            client_id: generate_client_id(),
            discovery_ttl: DEFAULT_DISCOVERY_TTL,
            discovery_capacity: DEFAULT_DISCOVERY_CAPACITY,
            dispatch_policy: DispatchPolicy::default(),
        }
    }
}

impl GatewayConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client id announced in discovery control messages.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Sets how long discovered devices are remembered (default: 300 seconds).
    #[must_use]
    pub fn with_discovery_ttl(mut self, ttl: Duration) -> Self {
        self.discovery_ttl = ttl;
        self
    }

    /// Sets the maximum number of discovered devices kept (default: 256).
    #[must_use]
    pub fn with_discovery_capacity(mut self, capacity: usize) -> Self {
        self.discovery_capacity = capacity;
        self
    }

    /// Sets the dispatch policy (default: [`DispatchPolicy::ExactFirst`]).
    #[must_use]
    pub fn with_dispatch_policy(mut self, policy: DispatchPolicy) -> Self {
        self.dispatch_policy = policy;
        self
    }

    /// Returns the client id announced in discovery control messages.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the discovery TTL.
    #[must_use]
    pub fn discovery_ttl(&self) -> Duration {
        self.discovery_ttl
    }

    /// Returns the discovery capacity.
    #[must_use]
    pub fn discovery_capacity(&self) -> usize {
        self.discovery_capacity
    }

    /// Returns the dispatch policy.
    #[must_use]
    pub fn dispatch_policy(&self) -> DispatchPolicy {
        self.dispatch_policy
    }
}

/// Parses an MQTT URL into host and port.
fn parse_mqtt_url(url: &str) -> Result<(String, u16), ProtocolError> {
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port) = if let Some((h, p)) = url.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {p}")))?;
        (h.to_string(), port)
    } else {
        (url.to_string(), DEFAULT_PORT)
    };

    if host.is_empty() {
        return Err(ProtocolError::InvalidAddress(
            "MQTT broker host is required".to_string(),
        ));
    }

    Ok((host, port))
}
