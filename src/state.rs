//! Shared connectivity state
//!
//! Link and session state live together in a single `watch` channel. The
//! state-machine loop is the only writer; the dispatch bridge and any
//! observer read synchronized snapshots through `borrow()`.

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Link-layer readiness as seen by the link monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// No association, or association lost
    #[default]
    Down,
    /// Driver started, association in progress
    Starting,
    /// Associated and an address has been acquired
    Up,
}

/// Classification of the last session-layer failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    /// Socket-level failure (refused, reset, unreachable, timeout)
    Transport { errno: Option<i32>, detail: String },
    /// Handshake or certificate verification failure
    Tls { detail: String },
    /// Broker answered the connect with a refusal code
    BrokerRefusal { code: String },
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Transport {
                errno: Some(errno),
                detail,
            } => write!(f, "transport failure (errno {errno}): {detail}"),
            FaultKind::Transport { errno: None, detail } => {
                write!(f, "transport failure: {detail}")
            }
            FaultKind::Tls { detail } => write!(f, "TLS failure: {detail}"),
            FaultKind::BrokerRefusal { code } => write!(f, "broker refused connection: {code}"),
        }
    }
}

/// Messaging session readiness as seen by the session manager
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Session client not started yet
    #[default]
    Idle,
    /// Started, waiting for the broker to accept the session
    Connecting,
    /// Connected; publish and subscribe are allowed
    Ready,
    /// Last attempt failed; the client keeps retrying on its own
    Faulted(FaultKind),
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionState::Ready)
    }
}

/// Read-only snapshot returned by `current_state()`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectivityState {
    pub link: LinkState,
    pub session: SessionState,
}

/// Single synchronization boundary for link and session state
#[derive(Debug, Clone)]
pub struct StateCell {
    tx: Arc<watch::Sender<ConnectivityState>>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectivityState::default());
        Self { tx: Arc::new(tx) }
    }

    /// Atomic snapshot of both layers
    pub fn snapshot(&self) -> ConnectivityState {
        self.tx.borrow().clone()
    }

    pub fn link(&self) -> LinkState {
        self.tx.borrow().link
    }

    pub fn session(&self) -> SessionState {
        self.tx.borrow().session.clone()
    }

    /// Receiver for readers that only observe (dispatch bridge, health checks)
    pub fn watch(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }

    /// Replace the link state, returning the previous value
    pub fn set_link(&self, next: LinkState) -> LinkState {
        let mut previous = next;
        self.tx.send_if_modified(|state| {
            previous = state.link;
            state.link = next;
            previous != next
        });
        previous
    }

    /// Replace the session state, returning the previous value
    pub fn set_session(&self, next: SessionState) -> SessionState {
        let mut previous = None;
        self.tx.send_if_modified(|state| {
            let changed = state.session != next;
            previous = Some(std::mem::replace(&mut state.session, next));
            changed
        });
        previous.unwrap_or_default()
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
