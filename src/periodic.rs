//! Periodic task driver
//!
//! Publishes a freshly generated payload once per interval while the session
//! is ready. Ticks that find the session not ready are logged and dropped;
//! nothing is replayed after a reconnect.

use crate::dispatch::{DispatchBridge, DispatchError};
use crate::protocol::{MessageId, Qos, TemperatureReading};
use crate::session::SessionClient;
use crate::state::SessionState;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Produces the payload for one periodic publish
pub trait PayloadSource: Send {
    fn next_payload(&mut self) -> Vec<u8>;
}

/// `Message #N from <client id>`
#[derive(Debug, Clone)]
pub struct CounterPayload {
    client_id: String,
    count: u32,
}

impl CounterPayload {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            count: 0,
        }
    }
}

impl PayloadSource for CounterPayload {
    fn next_payload(&mut self) -> Vec<u8> {
        self.count += 1;
        format!("Message #{} from {}", self.count, self.client_id).into_bytes()
    }
}

/// Simulated temperature sensor: random walk of at most ±1.0 per reading,
/// kept within 20.0..=30.0
#[derive(Debug)]
pub struct TemperatureSimulator {
    device: String,
    value: f32,
    count: u32,
    rng: StdRng,
}

impl TemperatureSimulator {
    pub const MIN: f32 = 20.0;
    pub const MAX: f32 = 30.0;
    const START: f32 = 25.0;

    pub fn new(device: impl Into<String>) -> Self {
        Self::with_rng(device, StdRng::from_entropy())
    }

    /// Deterministic sequence for tests
    pub fn seeded(device: impl Into<String>, seed: u64) -> Self {
        Self::with_rng(device, StdRng::seed_from_u64(seed))
    }

    fn with_rng(device: impl Into<String>, rng: StdRng) -> Self {
        Self {
            device: device.into(),
            value: Self::START,
            count: 0,
            rng,
        }
    }

    pub fn next_reading(&mut self) -> TemperatureReading {
        let step: f32 = self.rng.gen_range(-1.0..=1.0);
        let next = (self.value + step).clamp(Self::MIN, Self::MAX);
        self.value = (next * 100.0).round() / 100.0;
        self.count += 1;

        TemperatureReading {
            device: self.device.clone(),
            sensor: "temperature".to_string(),
            value: self.value,
            unit: "C".to_string(),
            count: self.count,
            timestamp: Utc::now(),
        }
    }
}

impl PayloadSource for TemperatureSimulator {
    fn next_payload(&mut self) -> Vec<u8> {
        let reading = self.next_reading();
        match serde_json::to_vec(&reading) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to serialize temperature reading");
                Vec::new()
            }
        }
    }
}

/// What happened on one tick
#[derive(Debug)]
pub enum TickOutcome {
    Published(MessageId),
    /// Session was not ready; nothing was generated or sent
    Skipped(SessionState),
    /// Ready at the check, but the publish itself failed
    Failed(DispatchError),
}

pub struct PeriodicPublisher<C: SessionClient> {
    bridge: DispatchBridge<C>,
    topic: String,
    qos: Qos,
    interval: Duration,
    source: Box<dyn PayloadSource>,
}

impl<C: SessionClient> PeriodicPublisher<C> {
    pub fn new(
        bridge: DispatchBridge<C>,
        topic: impl Into<String>,
        qos: Qos,
        interval: Duration,
        source: Box<dyn PayloadSource>,
    ) -> Self {
        Self {
            bridge,
            topic: topic.into(),
            qos,
            interval,
            source,
        }
    }

    /// One attempt: publish if ready, otherwise skip
    pub fn tick(&mut self) -> TickOutcome {
        let session = self.bridge.current_state().session;
        if !session.is_ready() {
            info!(state = ?session, "Session not ready, skipping periodic publish");
            return TickOutcome::Skipped(session);
        }

        let payload = self.source.next_payload();
        match self.bridge.publish(&self.topic, &payload, self.qos, false) {
            Ok(id) => {
                info!(topic = %self.topic, msg_id = %id, "Periodic message published");
                TickOutcome::Published(id)
            }
            // State flipped between the check and the publish
            Err(DispatchError::NotReady { state }) => {
                info!(state = ?state, "Session dropped before publish, skipping");
                TickOutcome::Skipped(state)
            }
            Err(e) => {
                warn!(topic = %self.topic, error = %e, "Periodic publish failed");
                TickOutcome::Failed(e)
            }
        }
    }

    /// Tick at a fixed period until shutdown; missed ticks are not replayed
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            topic = %self.topic,
            interval_secs = self.interval.as_secs(),
            "Periodic publisher started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        debug!("Periodic publisher stopped");
    }
}
