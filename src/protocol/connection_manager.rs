// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection state machine and subscription bookkeeping.
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──ack──▶ Connected
//!      ▲                          │                   │
//!      └──────refused/lost────────┴───────lost────────┘
//! ```
//!
//! There is no automatic reconnect: after a loss the manager stays
//! disconnected until `connect()` is called again.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use homegate::config::{DispatchPolicy, MqttBrokerConfig};
//! use homegate::protocol::{ConnectionManager, MqttMessage, MqttTransport};
//!
//! # async fn example() -> homegate::Result<()> {
//! let config = MqttBrokerConfig::from_url("mqtt://192.168.1.50:1883")?;
//! let manager = ConnectionManager::new(MqttTransport::new(config), DispatchPolicy::default());
//!
//! // Subscriptions made before connecting are replayed on connect
//! manager
//!     .subscribe("devices/+/status", Arc::new(|msg: &MqttMessage| println!("{}: {}", msg.topic, msg.payload)))
//!     .await?;
//! manager.connect().await?;
//! manager.publish("devices/lamp/commands", r#"{"type":"toggle"}"#).await?;
//! manager.disconnect().await?;
//! # Ok(())
//! # }
//! ```

use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::DispatchPolicy;
use crate::error::ProtocolError;
use crate::subscription::{MessageHandler, SubscriptionHandle};

use super::{ConnectionState, MqttMessage, TopicRouter, Transport, TransportEvent};

type ConnectWaiter = oneshot::Sender<Result<(), String>>;

/// Connection-scoped state guarded by one lock.
///
/// `pending` lives next to `state` so that "check state, then queue" in
/// `subscribe` and "mark connected, then drain queue" in the event loop
/// cannot interleave.
#[derive(Default)]
struct Link {
    state: ConnectionState,
    /// Incremented by every `connect()` from `Disconnected` and by
    /// `disconnect()`; events from an older transport session are ignored.
    epoch: u64,
    waiters: Vec<ConnectWaiter>,
    pending: Vec<String>,
}

struct Inner<T> {
    transport: T,
    /// Registered, unregistered and cleared only while `link` is held.
    router: TopicRouter,
    link: Mutex<Link>,
    state_tx: watch::Sender<ConnectionState>,
}

/// Owns the broker connection and multiplexes subscriptions over it.
///
/// `ConnectionManager` is cheaply cloneable; clones share the connection,
/// the handler table and the pending-subscription queue.
pub struct ConnectionManager<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for ConnectionManager<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> ConnectionManager<T> {
    /// Creates a disconnected manager around `transport`.
    #[must_use]
    pub fn new(transport: T, policy: DispatchPolicy) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                transport,
                router: TopicRouter::new(policy),
                link: Mutex::new(Link::default()),
                state_tx,
            }),
        }
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.link.lock().state
    }

    /// Returns `true` if the broker acknowledged the connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns a receiver that observes every state transition.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Returns the topic patterns waiting for the connection to be acknowledged.
    #[must_use]
    pub fn pending_subscriptions(&self) -> Vec<String> {
        self.inner.link.lock().pending.clone()
    }

    /// Returns the handler table.
    #[must_use]
    pub fn router(&self) -> &TopicRouter {
        &self.inner.router
    }

    /// Connects to the broker and waits for the acknowledgement.
    ///
    /// The state moves to [`ConnectionState::Connecting`] before this future
    /// first suspends. Calling `connect()` while connected returns `Ok(())`
    /// immediately; calling it while a connection attempt is in flight waits
    /// for that same attempt. No timeout is applied.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ConnectionFailed`] if the broker refuses the
    /// connection, the transport fails before acknowledging it, or
    /// [`disconnect`](Self::disconnect) is called meanwhile.
    pub async fn connect(&self) -> Result<(), ProtocolError> {
        let (tx, rx) = oneshot::channel();
        let new_epoch = {
            let mut link = self.inner.link.lock();
            match link.state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting => {
                    tracing::debug!("Connection attempt already in flight, joining it");
                    link.waiters.push(tx);
                    None
                }
                ConnectionState::Disconnected => {
                    link.epoch += 1;
                    link.waiters.push(tx);
                    self.inner.set_state(&mut link, ConnectionState::Connecting);
                    Some(link.epoch)
                }
            }
        };

        if let Some(epoch) = new_epoch {
            tracing::info!("Connecting to MQTT broker");
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            match self.inner.transport.open(events_tx) {
                Ok(()) => {
                    tokio::spawn(run_events(Arc::downgrade(&self.inner), epoch, events_rx));
                }
                Err(e) => self.inner.connection_lost(epoch, e.to_string()),
            }
        }

        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(ProtocolError::ConnectionFailed(reason)),
            Err(_) => Err(ProtocolError::ConnectionFailed(
                "connection attempt abandoned".to_string(),
            )),
        }
    }

    /// Registers `handler` for `pattern` and subscribes on the wire.
    ///
    /// The handler always goes into the handler table, replacing any handler
    /// previously registered for the same pattern. When connected the
    /// wire-level subscribe is issued now, otherwise it is queued and issued
    /// once the next connection is acknowledged.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport rejects an immediate subscribe. The
    /// handler stays registered.
    pub async fn subscribe(
        &self,
        pattern: impl Into<String>,
        handler: MessageHandler,
    ) -> Result<SubscriptionHandle, ProtocolError> {
        let pattern = pattern.into();

        // Registration and queueing happen under the link lock so a
        // concurrent disconnect clears both or neither.
        let (handle, connected) = {
            let mut link = self.inner.link.lock();
            let handle = self.inner.router.register(pattern.clone(), handler);
            let connected = if link.state == ConnectionState::Connected {
                true
            } else {
                if !link.pending.contains(&pattern) {
                    link.pending.push(pattern.clone());
                }
                false
            };
            (handle, connected)
        };

        if connected {
            self.inner.transport.subscribe(&pattern).await?;
            tracing::debug!(pattern = %pattern, "Subscribed to topic");
        } else {
            tracing::debug!(pattern = %pattern, "Not connected, subscription queued");
        }

        Ok(handle)
    }

    /// Removes a handler registered by [`subscribe`](Self::subscribe).
    ///
    /// Returns `false` if the handle is stale (its pattern was re-registered
    /// or the tables were cleared). When connected the wire-level
    /// unsubscribe is sent; a failure there is logged, not returned.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        match self.inner.remove_handler(handle) {
            None => false,
            Some(connected) => {
                if connected {
                    self.inner.wire_unsubscribe(handle.pattern()).await;
                }
                true
            }
        }
    }

    /// Synchronous variant of [`unsubscribe`](Self::unsubscribe) for use in
    /// `Drop`.
    ///
    /// The handler is removed before this returns. When connected, the
    /// wire-level unsubscribe is spawned onto the current Tokio runtime; it
    /// is skipped outside a runtime.
    pub fn release(&self, handle: &SubscriptionHandle) -> bool {
        match self.inner.remove_handler(handle) {
            None => false,
            Some(connected) => {
                if connected {
                    if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                        let inner = Arc::clone(&self.inner);
                        let pattern = handle.pattern().to_string();
                        runtime.spawn(async move {
                            inner.wire_unsubscribe(&pattern).await;
                        });
                    } else {
                        tracing::debug!(
                            pattern = %handle.pattern(),
                            "No runtime available, skipping wire unsubscribe"
                        );
                    }
                }
                true
            }
        }
    }

    /// Publishes a payload.
    ///
    /// Publishing is fire-and-forget: success means the transport accepted
    /// the message, not that the broker acknowledged it.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotConnected`] unless connected (the
    /// transport is not called), or [`ProtocolError::PublishFailed`] if the
    /// transport rejects the message.
    pub async fn publish(
        &self,
        topic: &str,
        payload: impl Into<Vec<u8>>,
    ) -> Result<(), ProtocolError> {
        if !self.is_connected() {
            tracing::debug!(topic = %topic, "Publish rejected, not connected");
            return Err(ProtocolError::NotConnected);
        }

        let payload = payload.into();
        tracing::debug!(topic = %topic, bytes = payload.len(), "Publishing MQTT message");

        self.inner
            .transport
            .publish(topic, payload)
            .await
            .map_err(|e| match e {
                ProtocolError::PublishFailed(_) => e,
                other => ProtocolError::PublishFailed(other.to_string()),
            })
    }

    /// Disconnects and clears every handler and queued subscription.
    ///
    /// Safe to call while already disconnected. A pending `connect()` fails
    /// with [`ProtocolError::ConnectionFailed`].
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails to close. State and tables are
    /// reset regardless.
    pub async fn disconnect(&self) -> Result<(), ProtocolError> {
        let previous = {
            let mut link = self.inner.link.lock();
            let previous = link.state;
            link.epoch += 1;
            link.pending.clear();
            for waiter in mem::take(&mut link.waiters) {
                let _ = waiter.send(Err("disconnected".to_string()));
            }
            self.inner.set_state(&mut link, ConnectionState::Disconnected);
            self.inner.router.clear();
            previous
        };

        if previous != ConnectionState::Disconnected {
            tracing::info!(from = %previous, "Disconnecting from MQTT broker");
        }

        self.inner.transport.close().await
    }
}

impl<T: Transport> std::fmt::Debug for ConnectionManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("handlers", &self.inner.router.handler_count())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Inner<T> {
    fn set_state(&self, link: &mut Link, state: ConnectionState) {
        link.state = state;
        self.state_tx.send_replace(state);
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.link.lock().epoch == epoch
    }

    /// Marks the session connected, releases waiters and replays the queue.
    async fn connected(&self, epoch: u64) {
        let pending = {
            let mut link = self.link.lock();
            if link.epoch != epoch || link.state != ConnectionState::Connecting {
                return;
            }
            self.set_state(&mut link, ConnectionState::Connected);
            for waiter in mem::take(&mut link.waiters) {
                let _ = waiter.send(Ok(()));
            }
            mem::take(&mut link.pending)
        };

        tracing::info!(pending = pending.len(), "Connected to MQTT broker");

        for pattern in pending {
            match self.transport.subscribe(&pattern).await {
                Ok(()) => tracing::debug!(pattern = %pattern, "Replayed queued subscription"),
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "Failed to replay queued subscription");
                }
            }
        }
    }

    /// Moves the session to disconnected and fails pending `connect()` calls.
    ///
    /// Handlers stay registered; their patterns are queued again so the next
    /// acknowledged connection re-subscribes them.
    fn connection_lost(&self, epoch: u64, reason: String) {
        let mut link = self.link.lock();
        if link.epoch != epoch || link.state == ConnectionState::Disconnected {
            return;
        }

        let previous = link.state;
        self.set_state(&mut link, ConnectionState::Disconnected);
        for waiter in mem::take(&mut link.waiters) {
            let _ = waiter.send(Err(reason.clone()));
        }
        for pattern in self.router.patterns() {
            if !link.pending.contains(&pattern) {
                link.pending.push(pattern);
            }
        }

        if previous == ConnectionState::Connecting {
            tracing::warn!(reason = %reason, "MQTT connection failed");
        } else {
            tracing::info!(reason = %reason, "MQTT connection lost");
        }
    }

    /// Removes a handler and its queued pattern.
    ///
    /// Returns `None` for a stale handle, otherwise whether the session is
    /// connected and needs a wire-level unsubscribe.
    fn remove_handler(&self, handle: &SubscriptionHandle) -> Option<bool> {
        let mut link = self.link.lock();
        if !self.router.unregister(handle) {
            return None;
        }
        link.pending.retain(|p| p != handle.pattern());
        Some(link.state == ConnectionState::Connected)
    }

    async fn wire_unsubscribe(&self, pattern: &str) {
        match self.transport.unsubscribe(pattern).await {
            Ok(()) => tracing::debug!(pattern = %pattern, "Unsubscribed from topic"),
            Err(e) => tracing::warn!(pattern = %pattern, error = %e, "Failed to unsubscribe"),
        }
    }

    fn dispatch(&self, message: &MqttMessage) {
        tracing::trace!(topic = %message.topic, "Dispatching MQTT message");
        self.router.route(message);
    }
}

/// Consumes the events of one transport session.
///
/// Holds only a weak reference so the task ends once every manager clone is
/// dropped.
async fn run_events<T: Transport>(
    inner: Weak<Inner<T>>,
    epoch: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            tracing::debug!(epoch, "Connection manager dropped, stopping event loop");
            return;
        };
        if !inner.is_current(epoch) {
            tracing::debug!(epoch, "Ignoring events from a closed transport session");
            return;
        }

        match event {
            TransportEvent::Connected => inner.connected(epoch).await,
            TransportEvent::ConnectionRefused(reason) => inner.connection_lost(epoch, reason),
            TransportEvent::Message(message) => inner.dispatch(&message),
            TransportEvent::Disconnected(reason) => inner.connection_lost(
                epoch,
                reason.unwrap_or_else(|| "broker closed the connection".to_string()),
            ),
        }
    }

    if let Some(inner) = inner.upgrade() {
        inner.connection_lost(epoch, "transport event stream ended".to_string());
    }
}
