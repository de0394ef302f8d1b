// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker connection management.
//!
//! A single broker connection is shared by every logical subscription of the
//! gateway. The pieces are:
//!
//! - [`Transport`]: the physical connection. [`MqttTransport`] is the
//!   `rumqttc` implementation.
//! - [`ConnectionManager`]: owns a transport, tracks [`ConnectionState`],
//!   queues subscriptions made before the broker acknowledges the connection
//!   and dispatches inbound messages through a [`TopicRouter`].

mod connection_manager;
#[cfg(feature = "mqtt")]
mod mqtt_transport;
#[cfg(test)]
pub(crate) mod testing;
mod topic_router;

pub use connection_manager::ConnectionManager;
#[cfg(feature = "mqtt")]
pub use mqtt_transport::MqttTransport;
pub use topic_router::TopicRouter;

use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;

use crate::error::ProtocolError;

/// State of the broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No connection, and none in progress.
    #[default]
    Disconnected,
    /// `connect()` was called and the broker has not answered yet.
    Connecting,
    /// The broker acknowledged the connection.
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(label)
    }
}

/// An inbound broker message.
///
/// The transport copies topic and payload out of its own buffers before
/// handing the message on, so a message can be moved freely between tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    /// Topic the message was published on.
    pub topic: String,
    /// UTF-8 payload.
    pub payload: String,
}

impl MqttMessage {
    /// Creates a message.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Events reported by a [`Transport`] after [`Transport::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The broker accepted the connection.
    Connected,
    /// The broker refused the connection, or it failed before being acknowledged.
    ConnectionRefused(String),
    /// A message arrived.
    Message(MqttMessage),
    /// The connection was lost.
    Disconnected(Option<String>),
}

/// The physical broker connection driven by a [`ConnectionManager`].
///
/// `open` starts connecting and returns immediately; the outcome and every
/// later inbound message arrive as [`TransportEvent`]s on `events`. A
/// transport does not reconnect on its own.
pub trait Transport: Send + Sync + 'static {
    /// Starts connecting.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection attempt cannot be started.
    fn open(&self, events: mpsc::UnboundedSender<TransportEvent>) -> Result<(), ProtocolError>;

    /// Subscribes to a topic pattern at QoS 1.
    fn subscribe(&self, pattern: &str) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Unsubscribes from a topic pattern.
    fn unsubscribe(&self, pattern: &str) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Publishes a payload at QoS 1. Resolves once the transport accepted it.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Tears the connection down. Closing a closed transport is a no-op.
    fn close(&self) -> impl Future<Output = Result<(), ProtocolError>> + Send;
}
