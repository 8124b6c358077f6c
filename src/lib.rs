//! mqtt-uplink - connectivity orchestrator for constrained devices
//!
//! Brings up a network link, layers a TLS-secured MQTT session on top of it
//! and keeps both alive across radio drops, broker disconnects and transient
//! handshake failures.
//!
//! # Overview
//!
//! - [`link`] - link monitor (edge-triggered `LinkUp`) and the route-probe driver
//! - [`session`] - session manager, session events and the client seam
//! - [`dispatch`] - publish/subscribe gate and inbound handler registry
//! - [`periodic`] - fixed-interval publisher that skips while not ready
//! - [`orchestrator`] - the single state-machine loop tying them together
//! - [`transport`] - rumqttc implementation of the session client
//!
//! # Quick Start
//!
//! ```rust
//! use mqtt_uplink::protocol::topic_matches;
//!
//! assert!(topic_matches("a/+/c", "a/b/c"));
//! assert!(topic_matches("a/#", "a/b/c"));
//! assert!(!topic_matches("a/+/c", "x/b/c"));
//! ```

pub mod config;
pub mod credential;
pub mod dispatch;
pub mod echo;
pub mod error;
pub mod health;
pub mod link;
pub mod observability;
pub mod orchestrator;
pub mod periodic;
pub mod protocol;
pub mod session;
pub mod state;
pub mod testing;
pub mod transport;
pub mod trust;

pub use config::{ConfigError, DeviceConfig};
pub use dispatch::{DispatchBridge, DispatchError};
pub use error::{UplinkError, UplinkResult};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use protocol::*;
pub use state::{ConnectivityState, FaultKind, LinkState, SessionState};
