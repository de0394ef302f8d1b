// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests against a mock broker using mockforge-mqtt.

#![cfg(feature = "mqtt")]

use std::sync::Arc;
use std::time::Duration;

use homegate::config::{GatewayConfig, MqttBrokerConfig};
use homegate::model::Command;
use homegate::protocol::{ConnectionManager, ConnectionState, MqttMessage, MqttTransport};
use homegate::source::DeviceDataSource;
use homegate::{DispatchPolicy, ProtocolError};
use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use tokio::time::sleep;

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to start, bind to port, and be ready to accept connections
    sleep(Duration::from_millis(500)).await;
}

fn manager_for(port: u16) -> ConnectionManager<MqttTransport> {
    let config = MqttBrokerConfig::from_url(&format!("mqtt://127.0.0.1:{port}")).unwrap();
    ConnectionManager::new(MqttTransport::new(config), DispatchPolicy::default())
}

// ============================================================================
// Connection Manager Tests
// ============================================================================

mod connection_manager {
    use super::*;

    #[tokio::test]
    async fn connect_to_broker() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let manager = manager_for(port);
        let result = manager.connect().await;

        assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn connect_twice_is_noop() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let manager = manager_for(port);
        manager.connect().await.unwrap();
        manager.connect().await.unwrap();
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn connect_without_broker_fails() {
        let port = get_test_port();

        let manager = manager_for(port);
        let result = manager.connect().await;

        assert!(matches!(result, Err(ProtocolError::ConnectionFailed(_))));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn publish_before_connect_fails() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let manager = manager_for(port);
        let result = manager.publish("devices/lamp/commands", "{}").await;
        assert!(matches!(result, Err(ProtocolError::NotConnected)));
    }

    #[tokio::test]
    async fn publish_after_connect() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let manager = manager_for(port);
        manager.connect().await.unwrap();

        let result = manager.publish("devices/lamp/commands", r#"{"type":"toggle"}"#).await;
        assert!(result.is_ok(), "Publish failed: {:?}", result.err());
    }

    #[tokio::test]
    async fn queued_subscription_is_replayed() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let manager = manager_for(port);
        manager
            .subscribe("devices/+/status", Arc::new(|_msg: &MqttMessage| {}))
            .await
            .unwrap();
        assert_eq!(manager.pending_subscriptions().len(), 1);

        manager.connect().await.unwrap();
        sleep(Duration::from_millis(100)).await;
        assert!(manager.pending_subscriptions().is_empty());
        assert!(manager.router().contains("devices/+/status"));
    }

    #[tokio::test]
    async fn disconnect_and_reconnect() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let manager = manager_for(port);
        manager.connect().await.unwrap();
        manager
            .subscribe("devices/+/telemetry", Arc::new(|_msg: &MqttMessage| {}))
            .await
            .unwrap();

        manager.disconnect().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.router().handler_count(), 0);

        // Disconnecting twice is safe
        manager.disconnect().await.unwrap();

        manager.connect().await.unwrap();
        assert!(manager.is_connected());
    }
}

// ============================================================================
// Data Source Tests
// ============================================================================

mod data_source {
    use super::*;

    fn source_for(port: u16) -> DeviceDataSource<MqttTransport> {
        let broker = MqttBrokerConfig::from_url(&format!("mqtt://127.0.0.1:{port}")).unwrap();
        DeviceDataSource::mqtt(broker, GatewayConfig::new().with_client_id("integration"))
    }

    #[tokio::test]
    async fn discovery_lifecycle() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let source = source_for(port);
        let _devices = source.subscribe_to_device_discovery().await.unwrap();
        source.connect().await.unwrap();

        source.start_device_discovery().await.unwrap();
        source.stop_device_discovery().await.unwrap();
        assert_eq!(source.connection().router().handler_count(), 4);

        source.disconnect().await.unwrap();
        assert_eq!(source.connection().router().handler_count(), 0);
    }

    #[tokio::test]
    async fn dropping_source_ends_streams() {
        use tokio_stream::StreamExt;

        let port = get_test_port();
        start_mock_broker(port).await;

        let source = source_for(port);
        let mut devices = source.subscribe_to_device_discovery().await.unwrap();
        source.connect().await.unwrap();

        drop(source);
        let ended = tokio::time::timeout(Duration::from_secs(2), devices.next()).await;
        assert!(matches!(ended, Ok(None)));
    }

    #[tokio::test]
    async fn send_command() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let source = source_for(port);
        let command = Command::json("setBrightness", &serde_json::json!({"level": 40}), "lamp-1").unwrap();

        let err = source.send_device_command("lamp-1", &command).await.unwrap_err();
        assert!(err.is_not_connected());

        source.connect().await.unwrap();
        source.send_device_command("lamp-1", &command).await.unwrap();
    }
}
