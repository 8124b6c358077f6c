//! Connection lifecycle state machine
//!
//! A single task owns the link monitor and the session manager and is the
//! only writer of [`ConnectivityState`]. Link and session events arrive on
//! channels and are folded in one at a time; application code only holds a
//! [`DispatchBridge`] and reads snapshots.

use crate::dispatch::DispatchBridge;
use crate::error::UplinkError;
use crate::health::{ConnectionQuality, HealthMetrics, HealthMonitor};
use crate::link::{LinkDriver, LinkEvent, LinkMonitor};
use crate::protocol::{OutboundMessage, Subscription};
use crate::session::{SessionError, SessionEvent, SessionFactory, SessionManager, SessionTarget};
use crate::state::{ConnectivityState, StateCell};
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn, Instrument};

/// Link events buffered between the driver and the state loop
pub const LINK_EVENT_CAPACITY: usize = 16;

/// Immutable inputs supplied at construction time
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub target: SessionTarget,
    pub subscriptions: Vec<Subscription>,
    pub announce: Option<OutboundMessage>,
}

pub struct Orchestrator<F: SessionFactory, D: LinkDriver> {
    state: StateCell,
    link: LinkMonitor<D>,
    session: SessionManager<F>,
    session_events: mpsc::Receiver<SessionEvent>,
    target: SessionTarget,
}

impl<F: SessionFactory, D: LinkDriver> Orchestrator<F, D> {
    pub fn new(settings: OrchestratorSettings, factory: F, driver: D) -> Self {
        let state = StateCell::new();
        let link = LinkMonitor::new(driver, state.clone());
        let (session, session_events) = SessionManager::new(
            factory,
            settings.subscriptions,
            settings.announce,
            state.clone(),
        );

        Self {
            state,
            link,
            session,
            session_events,
            target: settings.target,
        }
    }

    /// Handle for publish/subscribe/register_handler
    pub fn bridge(&self) -> DispatchBridge<F::Client> {
        self.session.bridge()
    }

    pub fn current_state(&self) -> ConnectivityState {
        self.state.snapshot()
    }

    /// Receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<ConnectivityState> {
        self.state.watch()
    }

    pub fn health(&self) -> HealthMetrics {
        HealthMonitor::calculate_health_metrics(
            &self.state.snapshot(),
            self.session.stats(),
            Instant::now(),
        )
    }

    pub fn connection_quality(&self) -> ConnectionQuality {
        HealthMonitor::assess_connection_quality(&self.health())
    }

    pub fn link_connect_attempts(&self) -> u64 {
        self.link.connect_attempts()
    }

    /// Fold a link event; the `LinkUp` edge starts the session once.
    ///
    /// Only `AlreadyStarted` is returned as an error. Any other start
    /// failure is logged and retried on the next edge.
    pub fn handle_link_event(&mut self, event: LinkEvent) -> Result<(), UplinkError> {
        let _span = crate::link_span!(event = ?event).entered();
        let Some(link_up) = self.link.on_link_event(event) else {
            return Ok(());
        };

        if self.session.is_started() {
            debug!(
                address = %link_up.address,
                "Link back up, session client reconnects on its own"
            );
            return Ok(());
        }

        match self.session.start(&self.target) {
            Ok(()) => Ok(()),
            Err(SessionError::AlreadyStarted) => {
                error!("Session client started twice");
                Err(SessionError::AlreadyStarted.into())
            }
            Err(e) => {
                warn!(error = %e, "Failed to start session client, retrying on next link up");
                Ok(())
            }
        }
    }

    pub async fn handle_session_event(&mut self, event: SessionEvent) {
        let span = crate::session_span!(event = ?event);
        self.session.on_session_event(event).instrument(span).await;
    }

    /// Drain session events already queued by the client
    pub async fn process_pending_session_events(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(event) = self.session_events.try_recv() {
            self.handle_session_event(event).await;
            processed += 1;
        }
        processed
    }

    /// Run the state machine until shutdown is signalled
    pub async fn run(
        mut self,
        mut link_events: mpsc::Receiver<LinkEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), UplinkError> {
        info!("Connectivity orchestrator running");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, stopping orchestrator");
                        break;
                    }
                }

                event = link_events.recv() => {
                    match event {
                        Some(event) => self.handle_link_event(event)?,
                        None => return Err(UplinkError::ChannelClosed("link events")),
                    }
                }

                Some(event) = self.session_events.recv() => {
                    self.handle_session_event(event).await;
                }
            }
        }

        let state = self.state.snapshot();
        info!(link = ?state.link, session = ?state.session, "Orchestrator stopped");
        Ok(())
    }
}
