// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `homegate` library.
//!
//! Transport failures surface from `connect()`, `subscribe()` and
//! `publish()`. Message parsing never fails loudly: parsers return `None`
//! and the pipeline keeps running. [`ParseError`] covers JSON encoding of
//! outgoing payloads.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred while talking to the broker.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while encoding or decoding a payload.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Error occurred in the persistent key-value store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    /// Returns `true` if this error was caused by publishing without a connection.
    #[must_use]
    pub fn is_not_connected(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::NotConnected))
    }
}

/// Errors related to the broker connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The broker rejected the connection or the transport failed before acknowledging it.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The operation requires a connected transport.
    #[error("not connected to the broker")]
    NotConnected,

    /// The transport refused to accept a publish.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// The transport refused to accept a subscribe or unsubscribe request.
    #[error("subscribe failed: {0}")]
    SubscribeFailed(String),

    /// Invalid broker URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The MQTT client rejected a request.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
}

/// Errors related to decoding or encoding payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing or serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by a [`KeyValueStore`](crate::store::KeyValueStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A value could not be serialized or deserialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store failed.
    #[error("store backend failed: {0}")]
    Backend(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
