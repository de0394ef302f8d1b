// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The device data source.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::cache::{DiscoveryCache, StateCache};
use crate::config::GatewayConfig;
use crate::error::{ParseError, ProtocolError, Result};
use crate::model::{Command, DeviceState, DiscoveredDevice};
use crate::parser;
use crate::protocol::{ConnectionManager, ConnectionState, MqttMessage, Transport};
use crate::subscription::{MessageHandler, SubscriptionHandle};
use crate::topic;

use super::fanout::Consumers;

/// Stream returned by the subscribe methods of [`DeviceDataSource`].
///
/// The stream yields `None` once the [`DeviceDataSource`] that returned it is
/// dropped. [`disconnect`](DeviceDataSource::disconnect) and
/// [`unsubscribe_all`](DeviceDataSource::unsubscribe_all) leave it open but
/// silent.
pub type DeviceStream<T> = UnboundedReceiverStream<T>;

type DiscoveryParser = fn(&str, &str) -> Option<DiscoveredDevice>;
type StateParser = fn(&str, &str) -> Option<DeviceState>;

/// Payload of the discovery control topics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveryControl<'a> {
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
}

/// Discovered devices and device states, exposed as live streams.
///
/// Owns the discovery and state caches and registers parsing handlers on a
/// [`ConnectionManager`]. Every stream of a pipeline receives every
/// emission; the caches are shared by all of them.
///
/// # Examples
///
/// ```no_run
/// use homegate::config::{GatewayConfig, MqttBrokerConfig};
/// use homegate::source::DeviceDataSource;
/// use tokio_stream::StreamExt;
///
/// # async fn example() -> homegate::Result<()> {
/// let broker = MqttBrokerConfig::from_url("mqtt://192.168.1.50:1883")?;
/// let source = DeviceDataSource::mqtt(broker, GatewayConfig::new());
///
/// let mut discovered = source.subscribe_to_device_discovery().await?;
/// source.connect().await?;
/// source.start_device_discovery().await?;
///
/// while let Some(devices) = discovered.next().await {
///     println!("{} devices nearby", devices.len());
/// }
/// # Ok(())
/// # }
/// ```
pub struct DeviceDataSource<T: Transport> {
    connection: ConnectionManager<T>,
    config: GatewayConfig,
    discovery: Arc<DiscoveryCache>,
    states: Arc<StateCache>,
    discovery_consumers: Arc<Consumers<Vec<DiscoveredDevice>>>,
    state_consumers: Arc<Consumers<Vec<DeviceState>>>,
    handles: Mutex<HashMap<String, SubscriptionHandle>>,
}

#[cfg(feature = "mqtt")]
impl DeviceDataSource<crate::protocol::MqttTransport> {
    /// Creates a data source that talks to an MQTT broker.
    #[must_use]
    pub fn mqtt(broker: crate::config::MqttBrokerConfig, config: GatewayConfig) -> Self {
        Self::new(crate::protocol::MqttTransport::new(broker), config)
    }
}

impl<T: Transport> DeviceDataSource<T> {
    /// Creates a data source with its own connection over `transport`.
    #[must_use]
    pub fn new(transport: T, config: GatewayConfig) -> Self {
        let connection = ConnectionManager::new(transport, config.dispatch_policy());
        Self::with_connection(connection, config)
    }

    /// Creates a data source on top of an existing connection.
    #[must_use]
    pub fn with_connection(connection: ConnectionManager<T>, config: GatewayConfig) -> Self {
        let discovery = DiscoveryCache::with_limits(config.discovery_ttl(), config.discovery_capacity());
        Self {
            connection,
            config,
            discovery: Arc::new(discovery),
            states: Arc::new(StateCache::new()),
            discovery_consumers: Arc::new(Consumers::new()),
            state_consumers: Arc::new(Consumers::new()),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the underlying connection.
    #[must_use]
    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    /// Returns the gateway configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Connects to the broker. See [`ConnectionManager::connect`].
    ///
    /// # Errors
    ///
    /// Returns error if the broker refuses or the transport fails.
    pub async fn connect(&self) -> Result<()> {
        self.connection.connect().await?;
        Ok(())
    }

    /// Disconnects and drops every registered subscription.
    ///
    /// The caches keep their contents.
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails to close.
    pub async fn disconnect(&self) -> Result<()> {
        self.handles.lock().clear();
        self.connection.disconnect().await?;
        Ok(())
    }

    /// Streams discovery-cache snapshots.
    ///
    /// Registers the Home Assistant config and `home/+/+/state` handlers
    /// (again, if already registered) and returns a new stream. Every parsed
    /// discovery message yields the full current snapshot, not just the
    /// device that changed.
    ///
    /// # Errors
    ///
    /// Returns error if the broker rejects an immediate subscribe.
    pub async fn subscribe_to_device_discovery(&self) -> Result<DeviceStream<Vec<DiscoveredDevice>>> {
        let stream = self.discovery_consumers.attach();

        self.register(
            topic::HOME_ASSISTANT_CONFIG,
            self.discovery_handler(parser::parse_discovery_config),
        )
        .await?;
        self.register(topic::HOME_STATE, self.home_state_handler()).await?;

        tracing::debug!(
            consumers = self.discovery_consumers.len(),
            "Device discovery stream opened"
        );
        Ok(stream)
    }

    /// Streams device states.
    ///
    /// Registers the status and telemetry handlers and returns a new stream.
    /// Every parsed message yields a one-element batch; a stream opened late
    /// does not see earlier states (use [`device_states`](Self::device_states)).
    ///
    /// # Errors
    ///
    /// Returns error if the broker rejects an immediate subscribe.
    pub async fn subscribe_to_device_states(&self) -> Result<DeviceStream<Vec<DeviceState>>> {
        let stream = self.state_consumers.attach();

        self.register(topic::DEVICE_STATUS, self.state_handler(parser::parse_status))
            .await?;
        self.register(
            topic::DEVICE_TELEMETRY,
            self.state_handler(parser::parse_telemetry),
        )
        .await?;

        tracing::debug!(
            consumers = self.state_consumers.len(),
            "Device state stream opened"
        );
        Ok(stream)
    }

    /// Asks discovery agents on the broker to start announcing devices.
    ///
    /// Listens for announce and leave messages first, then publishes
    /// `{"clientId", "timestamp"}` to the start control topic.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotConnected`] when not connected, or another
    /// protocol error if the transport rejects the request.
    pub async fn start_device_discovery(&self) -> Result<()> {
        self.register(
            topic::DISCOVERY_ANNOUNCE,
            self.discovery_handler(parser::parse_announce),
        )
        .await?;
        self.register(topic::DISCOVERY_LEAVE, self.leave_handler()).await?;

        let control = DiscoveryControl {
            client_id: self.config.client_id(),
            timestamp: Some(Utc::now().timestamp()),
        };
        self.publish_json(topic::DISCOVERY_START, &control).await?;
        tracing::info!(client_id = %self.config.client_id(), "Device discovery started");
        Ok(())
    }

    /// Asks discovery agents on the broker to stop announcing devices.
    ///
    /// Announce and leave handlers stay registered, so late replies still
    /// update the cache.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotConnected`] when not connected, or another
    /// protocol error if the transport rejects the request.
    pub async fn stop_device_discovery(&self) -> Result<()> {
        let control = DiscoveryControl {
            client_id: self.config.client_id(),
            timestamp: None,
        };
        self.publish_json(topic::DISCOVERY_STOP, &control).await?;
        tracing::info!(client_id = %self.config.client_id(), "Device discovery stopped");
        Ok(())
    }

    /// Publishes `command` to `devices/{device_id}/commands`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NotConnected`] or
    /// [`ProtocolError::PublishFailed`] unchanged from the connection, or a
    /// parse error if the command cannot be encoded.
    pub async fn send_device_command(&self, device_id: &str, command: &Command) -> Result<()> {
        let topic = topic::command_topic(device_id);
        let payload = command.to_json()?;

        tracing::debug!(
            device = %device_id,
            command = %command.command_type,
            "Sending device command"
        );
        self.connection.publish(&topic, payload).await?;
        Ok(())
    }

    /// Returns the current discovery snapshot, expired entries excluded.
    #[must_use]
    pub fn discovered_devices(&self) -> Vec<DiscoveredDevice> {
        self.discovery.read_all()
    }

    /// Returns the latest state of a device.
    #[must_use]
    pub fn device_state(&self, device_id: &str) -> Option<DeviceState> {
        self.states.read(device_id)
    }

    /// Returns the latest state of every device.
    #[must_use]
    pub fn device_states(&self) -> Vec<DeviceState> {
        self.states.read_all()
    }

    /// Removes every handler this data source registered.
    ///
    /// Open streams stay open but receive nothing further.
    pub async fn unsubscribe_all(&self) {
        let handles: Vec<_> = self.handles.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            self.connection.unsubscribe(&handle).await;
        }
    }

    async fn register(&self, pattern: &str, handler: MessageHandler) -> std::result::Result<(), ProtocolError> {
        let handle = self.connection.subscribe(pattern, handler).await?;
        self.handles.lock().insert(pattern.to_string(), handle);
        Ok(())
    }

    async fn publish_json<P: Serialize>(&self, topic: &str, payload: &P) -> Result<()> {
        let payload = serde_json::to_vec(payload).map_err(ParseError::from)?;
        self.connection.publish(topic, payload).await?;
        Ok(())
    }

    fn discovery_handler(&self, parse: DiscoveryParser) -> MessageHandler {
        let cache = Arc::clone(&self.discovery);
        let consumers = Arc::clone(&self.discovery_consumers);

        Arc::new(move |message: &MqttMessage| {
            let Some(device) = parse(&message.topic, &message.payload) else {
                tracing::debug!(topic = %message.topic, "Ignoring undecodable discovery message");
                return;
            };
            tracing::debug!(device = %device.id, device_type = %device.device_type, "Device discovered");
            consumers.emit(&cache.upsert(device));
        })
    }

    /// `home/+/+/state` both announces a device and reports its state.
    fn home_state_handler(&self) -> MessageHandler {
        let discover = self.discovery_handler(parser::parse_state_topic_discovery);
        let states = Arc::clone(&self.states);

        Arc::new(move |message: &MqttMessage| {
            discover(message);
            if let Some(state) = parser::parse_home_state(&message.topic, &message.payload) {
                states.upsert(state);
            }
        })
    }

    fn leave_handler(&self) -> MessageHandler {
        let cache = Arc::clone(&self.discovery);
        let consumers = Arc::clone(&self.discovery_consumers);

        Arc::new(move |message: &MqttMessage| {
            let Some(device_id) = parser::parse_discovery_leave(&message.topic, &message.payload)
            else {
                tracing::debug!(topic = %message.topic, "Ignoring undecodable leave message");
                return;
            };
            tracing::debug!(device = %device_id, "Device left");
            consumers.emit(&cache.remove(&device_id));
        })
    }

    fn state_handler(&self, parse: StateParser) -> MessageHandler {
        let states = Arc::clone(&self.states);
        let consumers = Arc::clone(&self.state_consumers);

        Arc::new(move |message: &MqttMessage| {
            let Some(state) = parse(&message.topic, &message.payload) else {
                tracing::debug!(topic = %message.topic, "Ignoring undecodable state message");
                return;
            };
            tracing::trace!(device = %state.device_id, online = state.is_online, "Device state updated");
            states.upsert(state.clone());
            consumers.emit(&vec![state]);
        })
    }
}

impl<T: Transport> std::fmt::Debug for DeviceDataSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceDataSource")
            .field("connection", &self.connection)
            .field("discovered", &self.discovery.len())
            .field("states", &self.states.len())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Drop for DeviceDataSource<T> {
    fn drop(&mut self) {
        // The handlers own the stream senders; releasing them ends the
        // streams even when the connection outlives this data source.
        for (_, handle) in self.handles.get_mut().drain() {
            self.connection.release(&handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatchPolicy;
    use crate::model::DeviceType;
    use crate::protocol::testing::{ScriptedTransport, settle};
    use std::time::Duration;
    use tokio_stream::StreamExt;

    async fn connected_source() -> (DeviceDataSource<ScriptedTransport>, ScriptedTransport) {
        let transport = ScriptedTransport::auto_ack();
        let source = DeviceDataSource::new(
            transport.clone(),
            GatewayConfig::new().with_client_id("test-app"),
        );
        source.connect().await.unwrap();
        (source, transport)
    }

    async fn next<S: tokio_stream::Stream + Unpin>(stream: &mut S) -> S::Item {
        tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("stream emitted nothing")
            .expect("stream ended")
    }

    #[tokio::test]
    async fn discovery_stream_emits_snapshots() {
        let (source, transport) = connected_source().await;
        let mut stream = source.subscribe_to_device_discovery().await.unwrap();

        transport.deliver(
            "homeassistant/light/lamp_1/config",
            r#"{"name":"Desk Lamp","device":{"identifiers":["lamp-1"],"manufacturer":"Acme"}}"#,
        );
        let snapshot = next(&mut stream).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "lamp-1");
        assert_eq!(snapshot[0].device_type, DeviceType::SmartLight);

        transport.deliver("home/sensor/living_room_temp/state", r#"{"temperature":21.5}"#);
        let snapshot = next(&mut stream).await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[1].name, "Living Room Temp");
        assert_eq!(source.discovered_devices().len(), 2);
    }

    #[tokio::test]
    async fn home_state_updates_state_cache() {
        let (source, transport) = connected_source().await;
        let _stream = source.subscribe_to_device_discovery().await.unwrap();

        transport.deliver("home/sensor/kitchen/state", r#"{"temperature":19.0,"battery":70}"#);
        settle().await;

        let state = source.device_state("kitchen").unwrap();
        assert!(state.is_online);
        assert_eq!(state.temperature, Some(19.0));
    }

    #[tokio::test]
    async fn undecodable_discovery_is_dropped() {
        let (source, transport) = connected_source().await;
        let mut stream = source.subscribe_to_device_discovery().await.unwrap();

        transport.deliver("homeassistant/light/lamp/config", "not json");
        transport.deliver("homeassistant/light/lamp/config", r#"{"name":"Lamp"}"#);

        let snapshot = next(&mut stream).await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, "lamp");
    }

    #[tokio::test]
    async fn every_discovery_stream_receives_snapshots() {
        let (source, transport) = connected_source().await;
        let mut first = source.subscribe_to_device_discovery().await.unwrap();
        let mut second = source.subscribe_to_device_discovery().await.unwrap();

        transport.deliver("home/light/porch/state", "ON");

        assert_eq!(next(&mut first).await.len(), 1);
        assert_eq!(next(&mut second).await.len(), 1);
        assert_eq!(source.connection().router().handler_count(), 2);
    }

    #[tokio::test]
    async fn state_stream_emits_single_element_batches() {
        let (source, transport) = connected_source().await;
        let mut stream = source.subscribe_to_device_states().await.unwrap();

        transport.deliver(
            "devices/abc/status",
            r#"{"online":true,"battery":85,"temperature":22.5}"#,
        );
        let batch = next(&mut stream).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].device_id, "abc");
        assert!(batch[0].is_online);
        assert_eq!(batch[0].battery, Some(85));
        assert_eq!(batch[0].temperature, Some(22.5));

        transport.deliver("devices/abc/telemetry", r#"{"temperature":23.0}"#);
        let batch = next(&mut stream).await;
        assert_eq!(batch[0].temperature, Some(23.0));
        assert_eq!(source.device_state("abc").unwrap().temperature, Some(23.0));
    }

    #[tokio::test]
    async fn dropped_stream_keeps_updating_cache() {
        let (source, transport) = connected_source().await;
        drop(source.subscribe_to_device_states().await.unwrap());

        transport.deliver("devices/abc/status", r#"{"online":false}"#);
        settle().await;

        assert!(!source.device_state("abc").unwrap().is_online);
    }

    #[tokio::test]
    async fn subscriptions_before_connect_are_replayed() {
        let transport = ScriptedTransport::auto_ack();
        let source = DeviceDataSource::new(transport.clone(), GatewayConfig::new());
        let mut stream = source.subscribe_to_device_states().await.unwrap();
        assert!(transport.subscribed().is_empty());

        source.connect().await.unwrap();
        settle().await;
        assert_eq!(
            transport.subscribed(),
            vec![topic::DEVICE_STATUS, topic::DEVICE_TELEMETRY]
        );

        transport.deliver("devices/x/status", r#"{"online":true}"#);
        assert_eq!(next(&mut stream).await[0].device_id, "x");
    }

    #[tokio::test]
    async fn start_discovery_listens_then_publishes() {
        let (source, transport) = connected_source().await;
        let mut stream = source.subscribe_to_device_discovery().await.unwrap();

        source.start_device_discovery().await.unwrap();
        assert!(transport.subscribed().contains(&topic::DISCOVERY_ANNOUNCE.to_string()));
        assert!(transport.subscribed().contains(&topic::DISCOVERY_LEAVE.to_string()));

        let control = transport.published_json(topic::DISCOVERY_START);
        assert_eq!(control.len(), 1);
        assert_eq!(control[0]["clientId"], "test-app");
        assert!(control[0]["timestamp"].is_i64());

        transport.deliver(
            "discovery/devices/plug-7/announce",
            r#"{"deviceId":"plug-7","name":"Heater Plug","type":"smartPlug","signalStrength":-60}"#,
        );
        let snapshot = next(&mut stream).await;
        assert_eq!(snapshot[0].device_type, DeviceType::SmartPlug);
        assert_eq!(snapshot[0].signal_strength, Some(-60));

        transport.deliver("discovery/devices/plug-7/leave", r#"{"deviceId":"plug-7"}"#);
        assert!(next(&mut stream).await.is_empty());
    }

    #[tokio::test]
    async fn stop_discovery_publishes_client_id_only() {
        let (source, transport) = connected_source().await;
        source.stop_device_discovery().await.unwrap();

        let control = transport.published_json(topic::DISCOVERY_STOP);
        assert_eq!(control, vec![serde_json::json!({"clientId": "test-app"})]);
    }

    #[tokio::test]
    async fn discovery_control_requires_connection() {
        let source = DeviceDataSource::new(ScriptedTransport::manual(), GatewayConfig::new());
        let err = source.start_device_discovery().await.unwrap_err();
        assert!(err.is_not_connected());
    }

    #[tokio::test]
    async fn send_command_publishes_json() {
        let (source, transport) = connected_source().await;
        let command = Command::new("setBrightness", b"80".to_vec(), "lamp-1");
        source.send_device_command("lamp-1", &command).await.unwrap();

        let published = transport.published_json("devices/lamp-1/commands");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0]["type"], "setBrightness");
        assert_eq!(published[0]["targetDevice"], "lamp-1");
        assert_eq!(published[0]["payload"], serde_json::json!([56, 48]));
    }

    #[tokio::test]
    async fn send_command_surfaces_publish_errors() {
        let source = DeviceDataSource::new(ScriptedTransport::manual(), GatewayConfig::new());
        let command = Command::new("toggle", Vec::new(), "lamp-1");
        let err = source.send_device_command("lamp-1", &command).await.unwrap_err();
        assert!(err.is_not_connected());

        let (source, transport) = connected_source().await;
        transport.fail_publish(true);
        let err = source.send_device_command("lamp-1", &command).await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Protocol(ProtocolError::PublishFailed(_))
        ));
    }

    #[tokio::test]
    async fn unsubscribe_all_releases_handlers() {
        let (source, transport) = connected_source().await;
        let _states = source.subscribe_to_device_states().await.unwrap();
        source.unsubscribe_all().await;

        assert_eq!(source.connection().router().handler_count(), 0);
        assert_eq!(transport.unsubscribed().len(), 2);
    }

    #[tokio::test]
    async fn disconnect_keeps_caches() {
        let (source, transport) = connected_source().await;
        let _states = source.subscribe_to_device_states().await.unwrap();
        transport.deliver("devices/abc/status", r#"{"online":true}"#);
        settle().await;

        source.disconnect().await.unwrap();
        assert_eq!(source.connection_state(), ConnectionState::Disconnected);
        assert_eq!(source.device_states().len(), 1);
    }

    #[tokio::test]
    async fn dropping_source_ends_streams() {
        let (source, transport) = connected_source().await;
        let mut discovered = source.subscribe_to_device_discovery().await.unwrap();
        let mut states = source.subscribe_to_device_states().await.unwrap();

        drop(source);

        let ended = tokio::time::timeout(Duration::from_secs(1), discovered.next()).await;
        assert!(matches!(ended, Ok(None)));
        let ended = tokio::time::timeout(Duration::from_secs(1), states.next()).await;
        assert!(matches!(ended, Ok(None)));

        // The event loop notices the manager is gone on the next event
        settle().await;
        transport.deliver("devices/abc/status", r#"{"online":true}"#);
        settle().await;
        assert!(transport.events_closed());
    }

    #[tokio::test]
    async fn dropping_source_releases_handlers_on_shared_connection() {
        let transport = ScriptedTransport::auto_ack();
        let connection = ConnectionManager::new(transport.clone(), DispatchPolicy::default());
        connection.connect().await.unwrap();

        let source = DeviceDataSource::with_connection(connection.clone(), GatewayConfig::new());
        let mut states = source.subscribe_to_device_states().await.unwrap();
        assert_eq!(connection.router().handler_count(), 2);

        drop(source);
        assert_eq!(connection.router().handler_count(), 0);

        let ended = tokio::time::timeout(Duration::from_secs(1), states.next()).await;
        assert!(matches!(ended, Ok(None)));

        settle().await;
        assert_eq!(transport.unsubscribed().len(), 2);
        assert!(connection.is_connected());
    }
}
