// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory transport for unit tests.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::ProtocolError;

use super::{MqttMessage, Transport, TransportEvent};

#[derive(Default)]
struct Script {
    auto_ack: bool,
    fail_open: bool,
    fail_subscribe: bool,
    fail_publish: bool,
    events: Option<mpsc::UnboundedSender<TransportEvent>>,
    opens: usize,
    closes: usize,
    subscribed: Vec<String>,
    unsubscribed: Vec<String>,
    published: Vec<(String, Vec<u8>)>,
}

/// Transport whose broker side is driven by the test.
///
/// Clones share the same script, so a test keeps one clone and hands the
/// other to the code under test.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    /// A transport that waits for [`ack`](Self::ack) or [`refuse`](Self::refuse).
    pub(crate) fn manual() -> Self {
        Self::default()
    }

    /// A transport whose broker accepts every connection at once.
    pub(crate) fn auto_ack() -> Self {
        let transport = Self::default();
        transport.script.lock().auto_ack = true;
        transport
    }

    /// A transport that cannot start a connection.
    pub(crate) fn failing_open() -> Self {
        let transport = Self::default();
        transport.script.lock().fail_open = true;
        transport
    }

    pub(crate) fn fail_subscribe(&self, fail: bool) {
        self.script.lock().fail_subscribe = fail;
    }

    pub(crate) fn fail_publish(&self, fail: bool) {
        self.script.lock().fail_publish = fail;
    }

    fn emit(&self, event: TransportEvent) {
        if let Some(events) = &self.script.lock().events {
            let _ = events.send(event);
        }
    }

    pub(crate) fn ack(&self) {
        self.emit(TransportEvent::Connected);
    }

    pub(crate) fn refuse(&self, reason: &str) {
        self.emit(TransportEvent::ConnectionRefused(reason.to_string()));
    }

    pub(crate) fn deliver(&self, topic: &str, payload: &str) {
        self.emit(TransportEvent::Message(MqttMessage::new(topic, payload)));
    }

    pub(crate) fn drop_connection(&self, reason: &str) {
        self.emit(TransportEvent::Disconnected(Some(reason.to_string())));
    }

    /// Returns `true` once the consumer of the last session's events is gone.
    pub(crate) fn events_closed(&self) -> bool {
        self.script
            .lock()
            .events
            .as_ref()
            .is_some_and(mpsc::UnboundedSender::is_closed)
    }

    pub(crate) fn open_count(&self) -> usize {
        self.script.lock().opens
    }

    pub(crate) fn close_count(&self) -> usize {
        self.script.lock().closes
    }

    pub(crate) fn subscribed(&self) -> Vec<String> {
        self.script.lock().subscribed.clone()
    }

    pub(crate) fn unsubscribed(&self) -> Vec<String> {
        self.script.lock().unsubscribed.clone()
    }

    pub(crate) fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.script.lock().published.clone()
    }

    /// Returns the published payloads on `topic`, decoded as JSON.
    pub(crate) fn published_json(&self, topic: &str) -> Vec<serde_json::Value> {
        self.script
            .lock()
            .published
            .iter()
            .filter(|(t, _)| t == topic)
            .filter_map(|(_, payload)| serde_json::from_slice(payload).ok())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, events: mpsc::UnboundedSender<TransportEvent>) -> Result<(), ProtocolError> {
        let mut script = self.script.lock();
        script.opens += 1;
        if script.fail_open {
            return Err(ProtocolError::ConnectionFailed("connection refused".to_string()));
        }
        if script.auto_ack {
            let _ = events.send(TransportEvent::Connected);
        }
        script.events = Some(events);
        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<(), ProtocolError> {
        let mut script = self.script.lock();
        script.subscribed.push(pattern.to_string());
        if script.fail_subscribe {
            return Err(ProtocolError::SubscribeFailed(pattern.to_string()));
        }
        Ok(())
    }

    async fn unsubscribe(&self, pattern: &str) -> Result<(), ProtocolError> {
        self.script.lock().unsubscribed.push(pattern.to_string());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ProtocolError> {
        let mut script = self.script.lock();
        if script.fail_publish {
            return Err(ProtocolError::PublishFailed("broker unavailable".to_string()));
        }
        script.published.push((topic.to_string(), payload));
        Ok(())
    }

    async fn close(&self) -> Result<(), ProtocolError> {
        self.script.lock().closes += 1;
        Ok(())
    }
}

/// Lets spawned tasks run until they block.
pub(crate) async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
