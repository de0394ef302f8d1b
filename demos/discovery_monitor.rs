// SPDX-License-Identifier: MPL-2.0

//! Demo program: watch devices appear on an MQTT broker.
//!
//! Subscribes to discovery and state traffic, asks discovery agents to
//! announce devices, then prints every discovery snapshot and state update
//! for the requested duration.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example discovery_monitor -- <host> [port] [seconds] [username] [password]
//! ```
//!
//! # Example
//!
//! ```bash
//! # Listen for 30 seconds (default)
//! cargo run --example discovery_monitor -- 192.168.1.50
//!
//! # Verbose logging
//! RUST_LOG=homegate=debug cargo run --example discovery_monitor -- 192.168.1.50 1883 60
//! ```

use std::env;
use std::time::Duration;

use homegate::config::{GatewayConfig, MqttBrokerConfig};
use homegate::source::DeviceDataSource;
use homegate::store::{DeviceRepository, MemoryStore};
use tokio_stream::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <host> [port] [seconds] [username] [password]", args[0]);
        std::process::exit(1);
    }

    let host = &args[1];
    let port: u16 = args.get(2).and_then(|p| p.parse().ok()).unwrap_or(1883);
    let seconds: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(30);

    let mut broker = MqttBrokerConfig::builder().host(host).port(port);
    if let (Some(username), Some(password)) = (args.get(4), args.get(5)) {
        broker = broker.credentials(username, password);
    }

    let source = DeviceDataSource::mqtt(broker.build(), GatewayConfig::new());
    let repository = DeviceRepository::new(MemoryStore::new());

    let mut discovered = source.subscribe_to_device_discovery().await?;
    let mut states = source.subscribe_to_device_states().await?;

    println!("Connecting to MQTT broker {host}:{port}...");
    source.connect().await?;
    source.start_device_discovery().await?;
    println!("Listening for {seconds} seconds");
    println!();

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = &mut deadline => break,
            Some(devices) = discovered.next() => {
                repository.save_discovery_snapshot(&devices)?;
                println!("Discovered {} device(s):", devices.len());
                for device in &devices {
                    println!(
                        "  {:<24} {:<18} {} {}",
                        device.id, device.device_type, device.manufacturer, device.model
                    );
                }
            }
            Some(batch) = states.next() => {
                for state in batch {
                    println!(
                        "State {}: online={} battery={:?} temperature={:?}",
                        state.device_id, state.is_online, state.battery, state.temperature
                    );
                }
            }
        }
    }

    source.stop_device_discovery().await?;
    source.disconnect().await?;

    let snapshot = repository.last_discovery_snapshot()?;
    println!();
    println!("{} device(s) seen, {} state(s) cached", snapshot.len(), source.device_states().len());
    Ok(())
}
