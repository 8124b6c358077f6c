//! rumqttc-backed session client
//!
//! Separates pure option building and event mapping from the I/O pump:
//!
//! - [`connection`] - pure option building and retry pacing
//! - [`message_handler`] - pure event and error mapping
//! - [`client`] - the event-loop pump and request side
//!
//! # Usage
//!
//! ```rust,no_run
//! use mqtt_uplink::credential::Credential;
//! use mqtt_uplink::session::{SessionClient, SessionConfig, SessionFactory};
//! use mqtt_uplink::transport::mqtt::RumqttSessionFactory;
//! use mqtt_uplink::protocol::Qos;
//! use std::time::Duration;
//! use tokio::sync::mpsc;
//!
//! # tokio_test::block_on(async {
//! let config = SessionConfig {
//!     broker_url: "mqtt://localhost:1883".to_string(),
//!     credential: Credential::with_client_id("ESP32S3_AABBCC"),
//!     trust: None,
//!     keep_alive: Duration::from_secs(60),
//!     last_will_topic: None,
//! };
//!
//! let (events_tx, mut events_rx) = mpsc::channel(100);
//! let client = RumqttSessionFactory::default().init(config, events_tx)?;
//! client.start()?;
//! client.publish("t/1", b"hello", Qos::AtLeastOnce, false)?;
//! while let Some(event) = events_rx.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::{RumqttSession, RumqttSessionFactory};
pub use connection::{configure_mqtt_options, parse_broker_url, BrokerEndpoint, ReconnectConfig};
pub use message_handler::MessageHandler;
