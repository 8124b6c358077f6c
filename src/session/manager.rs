//! Session manager
//!
//! Owns the underlying session client for the lifetime of the process:
//! constructs and starts it once after the link comes up, folds session
//! events into [`SessionState`] and runs the post-connect subscribe/announce
//! sequence on every `Connected`.

use super::client::{ClientError, SessionClient, SessionConfig, SessionFactory};
use super::events::{SessionEvent, SessionLifecycle};
use crate::credential::Credential;
use crate::dispatch::DispatchBridge;
use crate::protocol::{OutboundMessage, Subscription};
use crate::state::{LinkState, SessionState, StateCell};
use crate::trust::TrustStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Session events buffered between the client's worker and the state loop
pub const SESSION_EVENT_CAPACITY: usize = 100;

#[derive(Debug, Error)]
pub enum SessionError {
    /// A second client would share ownership of the session handle
    #[error("Session client already started")]
    AlreadyStarted,
    #[error("Link not ready (state: {link:?})")]
    LinkNotReady { link: LinkState },
    #[error("Failed to initialise session client: {0}")]
    Init(#[from] ClientError),
}

/// Where the session goes and how it is identified
#[derive(Debug, Clone)]
pub struct SessionTarget {
    pub broker_url: String,
    pub credential: Credential,
    pub trust: Option<Arc<TrustStore>>,
    pub keep_alive: Duration,
    pub last_will_topic: Option<String>,
}

impl SessionTarget {
    fn to_config(&self) -> SessionConfig {
        SessionConfig {
            broker_url: self.broker_url.clone(),
            credential: self.credential.clone(),
            trust: self.trust.clone(),
            keep_alive: self.keep_alive,
            last_will_topic: self.last_will_topic.clone(),
        }
    }
}

/// Counters kept for the health snapshot
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub connect_count: u64,
    pub fault_count: u64,
    pub last_connected: Option<Instant>,
    pub last_message: Option<Instant>,
}

pub struct SessionManager<F: SessionFactory> {
    factory: F,
    subscriptions: Vec<Subscription>,
    announce: Option<OutboundMessage>,
    bridge: DispatchBridge<F::Client>,
    state: StateCell,
    events_tx: mpsc::Sender<SessionEvent>,
    started: bool,
    stats: SessionStats,
}

impl<F: SessionFactory> SessionManager<F> {
    /// Create the manager in `Idle`. The returned receiver carries events
    /// from the client once it is started.
    pub fn new(
        factory: F,
        subscriptions: Vec<Subscription>,
        announce: Option<OutboundMessage>,
        state: StateCell,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::channel(SESSION_EVENT_CAPACITY);
        let bridge = DispatchBridge::new(state.watch());

        let manager = Self {
            factory,
            subscriptions,
            announce,
            bridge,
            state,
            events_tx,
            started: false,
            stats: SessionStats::default(),
        };
        (manager, events_rx)
    }

    pub fn bridge(&self) -> DispatchBridge<F::Client> {
        self.bridge.clone()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Construct and start the session client exactly once.
    ///
    /// Fails with `LinkNotReady` unless the link is up, which keeps the
    /// session in `Idle` until a `LinkUp` edge has been seen. Init/start
    /// failures leave the manager unstarted so the next edge can retry.
    pub fn start(&mut self, target: &SessionTarget) -> Result<(), SessionError> {
        if self.started {
            return Err(SessionError::AlreadyStarted);
        }

        let link = self.state.link();
        if link != LinkState::Up {
            return Err(SessionError::LinkNotReady { link });
        }

        info!(
            broker = %target.broker_url,
            client_id = %target.credential.client_id(),
            trust_anchors = target.trust.as_ref().map(|t| t.len()).unwrap_or(0),
            "Starting session client"
        );

        let client = self
            .factory
            .init(target.to_config(), self.events_tx.clone())?;
        client.start()?;
        self.bridge.attach(Arc::new(client))?;
        self.started = true;

        self.transition(SessionState::Connecting);
        Ok(())
    }

    /// Fold one session event into state and run its side effects
    pub async fn on_session_event(&mut self, event: SessionEvent) {
        let current = self.state.session();
        let next = SessionLifecycle::determine_next_state(&current, &event);

        if current == SessionState::Idle {
            debug!(event = ?event, "Ignoring session event before start");
            return;
        }

        match event {
            SessionEvent::Connected => {
                self.stats.connect_count += 1;
                self.stats.last_connected = Some(Instant::now());
                self.transition(next);
                self.after_connect();
            }
            SessionEvent::Disconnected => {
                self.transition(next);
            }
            SessionEvent::Error(ref kind) => {
                self.stats.fault_count += 1;
                debug!(fault = ?kind, "Session error reported by client");
                self.transition(next);
            }
            SessionEvent::DataReceived { topic, payload } => {
                self.stats.last_message = Some(Instant::now());
                debug!(topic = %topic, bytes = payload.len(), "Inbound message");
                self.bridge.dispatch(&topic, &payload).await;
            }
            SessionEvent::Delivered(id) => {
                debug!(msg_id = %id, "Delivery acknowledged");
            }
            SessionEvent::Subscribed(id) => {
                info!(msg_id = %id, "Subscription acknowledged");
            }
        }
    }

    fn transition(&self, next: SessionState) {
        let previous = self.state.set_session(next.clone());
        if previous != next {
            SessionLifecycle::log_state_transition(&previous, &next);
        }
    }

    /// Re-issue the declared subscriptions, then the optional announce.
    /// Failures are logged; the next connect runs the sequence again.
    fn after_connect(&self) {
        for subscription in &self.subscriptions {
            match self.bridge.subscribe(&subscription.topic, subscription.qos) {
                Ok(id) => info!(
                    topic = %subscription.topic,
                    qos = u8::from(subscription.qos),
                    msg_id = %id,
                    "Subscribe sent"
                ),
                Err(e) => warn!(
                    topic = %subscription.topic,
                    error = %e,
                    "Failed to subscribe after connect"
                ),
            }
        }

        if let Some(announce) = &self.announce {
            match self.bridge.publish(
                &announce.topic,
                &announce.payload,
                announce.qos,
                announce.retain,
            ) {
                Ok(id) => info!(topic = %announce.topic, msg_id = %id, "Announce sent"),
                Err(e) => error!(topic = %announce.topic, error = %e, "Failed to publish announce"),
            }
        }
    }
}
