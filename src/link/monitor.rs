//! Link monitor
//!
//! Tracks [`LinkState`] from link-layer events and asks the driver to
//! reconnect whenever the link is started or lost. The driver's own retry
//! pacing applies; this component never gives up.

use crate::state::{LinkState, StateCell};
use std::net::IpAddr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Events delivered by the link-layer driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Started,
    Disconnected,
    AddressAcquired(IpAddr),
}

/// Edge notification: the link just became usable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkUp {
    pub address: IpAddr,
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Link driver is not running")]
    DriverStopped,
    #[error("Link driver rejected connect: {0}")]
    Rejected(String),
}

/// Link-layer imperative consumed by the monitor
pub trait LinkDriver: Send + Sync + 'static {
    /// Request an association attempt; completion arrives as a [`LinkEvent`]
    fn connect(&self) -> Result<(), LinkError>;
}

/// Result of folding one link event into the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTransition {
    pub next: LinkState,
    pub connect: bool,
    pub link_up: Option<LinkUp>,
}

pub struct LinkMonitor<D: LinkDriver> {
    driver: D,
    state: StateCell,
    connect_attempts: u64,
}

impl<D: LinkDriver> LinkMonitor<D> {
    pub fn new(driver: D, state: StateCell) -> Self {
        Self {
            driver,
            state,
            connect_attempts: 0,
        }
    }

    /// Determine next state and side effects (pure function)
    pub fn determine_transition(current: LinkState, event: &LinkEvent) -> LinkTransition {
        match event {
            LinkEvent::Started => LinkTransition {
                next: LinkState::Starting,
                connect: true,
                link_up: None,
            },
            LinkEvent::Disconnected => LinkTransition {
                next: LinkState::Down,
                connect: true,
                link_up: None,
            },
            LinkEvent::AddressAcquired(address) => LinkTransition {
                next: LinkState::Up,
                connect: false,
                link_up: (current != LinkState::Up).then_some(LinkUp { address: *address }),
            },
        }
    }

    /// Consume one link event; returns `Some` only on the Down/Starting -> Up edge
    pub fn on_link_event(&mut self, event: LinkEvent) -> Option<LinkUp> {
        let current = self.state.link();
        let transition = Self::determine_transition(current, &event);

        self.state.set_link(transition.next);
        Self::log_state_transition(current, transition.next, &event);

        if transition.connect {
            self.request_connect();
        }
        transition.link_up
    }

    pub fn current_state(&self) -> LinkState {
        self.state.link()
    }

    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts
    }

    fn request_connect(&mut self) {
        self.connect_attempts += 1;
        match self.driver.connect() {
            Ok(()) => debug!(attempt = self.connect_attempts, "Link connect requested"),
            Err(e) => warn!(
                attempt = self.connect_attempts,
                error = %e,
                "Link connect request failed, waiting for next link event"
            ),
        }
    }

    fn log_state_transition(from: LinkState, to: LinkState, event: &LinkEvent) {
        match (from, to, event) {
            (LinkState::Up, LinkState::Up, _) => {
                debug!("Address re-acquired while link already up");
            }
            (_, LinkState::Up, LinkEvent::AddressAcquired(address)) => {
                info!(address = %address, "Link up");
            }
            (LinkState::Up, LinkState::Down, _) => {
                warn!("Link lost, reconnecting");
            }
            (_, LinkState::Down, _) => {
                info!("Link association failed, retrying");
            }
            _ => {
                info!("Link state: {:?} -> {:?}", from, to);
            }
        }
    }
}
