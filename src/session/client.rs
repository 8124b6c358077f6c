//! Seam to the underlying secure messaging client
//!
//! The orchestrator never talks to a concrete MQTT library directly. It goes
//! through these traits, which mirror the client's imperative primitives:
//! `init`, `start`, `publish` and `subscribe`. None of them wait for network
//! completion; outcomes come back later as [`SessionEvent`]s.

use super::events::SessionEvent;
use crate::credential::Credential;
use crate::protocol::{MessageId, Qos};
use crate::trust::TrustStore;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Everything the client needs to open the session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub broker_url: String,
    pub credential: Credential,
    pub trust: Option<Arc<TrustStore>>,
    pub keep_alive: Duration,
    pub last_will_topic: Option<String>,
}

/// Handle to a constructed session client
pub trait SessionClient: Send + Sync + 'static {
    /// Begin connecting; the client keeps reconnecting on its own afterwards
    fn start(&self) -> Result<(), ClientError>;

    /// Queue a publish and return the identifier assigned to it
    fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: Qos,
        retain: bool,
    ) -> Result<MessageId, ClientError>;

    /// Queue a subscribe and return the identifier assigned to it
    fn subscribe(&self, topic: &str, qos: Qos) -> Result<MessageId, ClientError>;
}

/// Constructs session clients wired to an event sink
pub trait SessionFactory: Send + Sync + 'static {
    type Client: SessionClient;

    fn init(
        &self,
        config: SessionConfig,
        events: mpsc::Sender<SessionEvent>,
    ) -> Result<Self::Client, ClientError>;
}

/// Errors raised synchronously by the session client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid broker address: {0}")]
    InvalidBrokerAddress(String),
    #[error("Secure broker {0} requires a trust anchor")]
    MissingTrustAnchor(String),
    #[error("Session client already running")]
    AlreadyRunning,
    #[error("Request rejected by session client")]
    Rejected(#[source] Box<dyn std::error::Error + Send + Sync>),
}
