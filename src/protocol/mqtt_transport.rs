// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `rumqttc` implementation of [`Transport`].

use parking_lot::Mutex;
use rumqttc::{AsyncClient, ConnectReturnCode, EventLoop, MqttOptions, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::MqttBrokerConfig;
use crate::error::ProtocolError;

use super::{MqttMessage, Transport, TransportEvent};

/// MQTT connection backed by `rumqttc`.
///
/// Every call to [`Transport::open`] creates a fresh client and event loop;
/// the previous ones are dropped. Subscriptions and publishes use QoS 1.
pub struct MqttTransport {
    config: MqttBrokerConfig,
    client: Mutex<Option<AsyncClient>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttTransport {
    /// Creates a transport for the given broker. Nothing connects until `open`.
    #[must_use]
    pub fn new(config: MqttBrokerConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
            event_task: Mutex::new(None),
        }
    }

    /// Returns the broker configuration.
    #[must_use]
    pub fn config(&self) -> &MqttBrokerConfig {
        &self.config
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(
            self.config.client_id(),
            self.config.host(),
            self.config.port(),
        );
        options.set_keep_alive(self.config.keep_alive());
        options.set_clean_session(self.config.clean_session());
        if let Some((username, password)) = self.config.credentials() {
            options.set_credentials(username, password);
        }
        options
    }

    fn client(&self) -> Result<AsyncClient, ProtocolError> {
        self.client.lock().clone().ok_or(ProtocolError::NotConnected)
    }
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("host", &self.config.host())
            .field("port", &self.config.port())
            .field("client_id", &self.config.client_id())
            .finish_non_exhaustive()
    }
}

impl Transport for MqttTransport {
    fn open(&self, events: mpsc::UnboundedSender<TransportEvent>) -> Result<(), ProtocolError> {
        if self.config.host().is_empty() {
            return Err(ProtocolError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }

        let (client, event_loop) = AsyncClient::new(self.options(), self.config.request_capacity());

        tracing::debug!(
            host = %self.config.host(),
            port = self.config.port(),
            client_id = %self.config.client_id(),
            "Opening MQTT connection"
        );

        let task = tokio::spawn(handle_events(event_loop, events));
        *self.client.lock() = Some(client);
        if let Some(previous) = self.event_task.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> Result<(), ProtocolError> {
        let client = self.client()?;
        client
            .subscribe(pattern, QoS::AtLeastOnce)
            .await
            .map_err(|e| ProtocolError::SubscribeFailed(format!("{pattern}: {e}")))
    }

    async fn unsubscribe(&self, pattern: &str) -> Result<(), ProtocolError> {
        let client = self.client()?;
        client
            .unsubscribe(pattern)
            .await
            .map_err(|e| ProtocolError::SubscribeFailed(format!("{pattern}: {e}")))
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), ProtocolError> {
        let client = self.client()?;
        client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| ProtocolError::PublishFailed(e.to_string()))
    }

    async fn close(&self) -> Result<(), ProtocolError> {
        let client = self.client.lock().take();
        let task = self.event_task.lock().take();

        let result = match client {
            Some(client) => client.disconnect().await.map_err(ProtocolError::from),
            None => Ok(()),
        };
        if let Some(task) = task {
            task.abort();
        }
        result
    }
}

/// Drives the event loop and forwards what the connection manager needs.
///
/// Stops at the first error; reconnecting is left to the caller.
async fn handle_events(mut event_loop: EventLoop, events: mpsc::UnboundedSender<TransportEvent>) {
    use rumqttc::{Event, Packet};

    let mut acknowledged = false;

    loop {
        let event = match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT broker answered connect");
                if connack.code == ConnectReturnCode::Success {
                    acknowledged = true;
                    TransportEvent::Connected
                } else {
                    let reason = format!("{:?}", connack.code);
                    if events.send(TransportEvent::ConnectionRefused(reason)).is_err() {
                        tracing::debug!("Connection manager gone, stopping event loop");
                    }
                    break;
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
                continue;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                match String::from_utf8(publish.payload.to_vec()) {
                    Ok(payload) => {
                        tracing::trace!(topic = %publish.topic, "MQTT message received");
                        TransportEvent::Message(MqttMessage::new(publish.topic, payload))
                    }
                    Err(_) => {
                        tracing::debug!(topic = %publish.topic, "Dropping non UTF-8 payload");
                        continue;
                    }
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT broker sent disconnect");
                let _ = events.send(TransportEvent::Disconnected(None));
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::error!(error = %e, "MQTT event loop error");
                let event = if acknowledged {
                    TransportEvent::Disconnected(Some(e.to_string()))
                } else {
                    TransportEvent::ConnectionRefused(e.to_string())
                };
                let _ = events.send(event);
                break;
            }
        };

        if events.send(event).is_err() {
            tracing::debug!("Connection manager gone, stopping event loop");
            break;
        }
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.get_mut().take() {
            task.abort();
        }
    }
}
