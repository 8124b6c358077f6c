//! Pure session state transitions
//!
//! Session-layer events and the functions that decide the next
//! [`SessionState`] for each of them. No I/O happens here.

use crate::protocol::MessageId;
use crate::state::{FaultKind, SessionState};
use tracing::{error, info, warn};

/// Events emitted by the underlying session client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Broker accepted the session
    Connected,
    /// Session lost; the client's reconnect timer is running
    Disconnected,
    /// Connect attempt or live session failed
    Error(FaultKind),
    /// Inbound message on a subscribed topic
    DataReceived { topic: String, payload: Vec<u8> },
    /// Broker acknowledged a QoS > 0 publish
    Delivered(MessageId),
    /// Broker acknowledged a subscribe
    Subscribed(MessageId),
}

/// Pure state machine for the messaging session
pub struct SessionLifecycle;

impl SessionLifecycle {
    /// Determine next state after a session event (pure function)
    ///
    /// `Idle` is only left through `start`, so events seen before it are ignored.
    pub fn determine_next_state(current: &SessionState, event: &SessionEvent) -> SessionState {
        if *current == SessionState::Idle {
            return SessionState::Idle;
        }

        match event {
            SessionEvent::Connected => SessionState::Ready,
            SessionEvent::Disconnected => SessionState::Connecting,
            SessionEvent::Error(kind) => SessionState::Faulted(kind.clone()),
            SessionEvent::DataReceived { .. }
            | SessionEvent::Delivered(_)
            | SessionEvent::Subscribed(_) => current.clone(),
        }
    }

    /// Check if session state allows publishing (pure function)
    pub fn can_publish(state: &SessionState) -> bool {
        matches!(state, SessionState::Ready)
    }

    /// Check if session state allows subscribing (pure function)
    pub fn can_subscribe(state: &SessionState) -> bool {
        matches!(state, SessionState::Ready)
    }

    /// Log session state transition
    pub fn log_state_transition(from: &SessionState, to: &SessionState) {
        match (from, to) {
            (SessionState::Idle, SessionState::Connecting) => {
                info!("Session client started, connecting to broker");
            }
            (SessionState::Ready, SessionState::Ready) => {}
            (_, SessionState::Ready) => {
                info!("Session ready");
            }
            (SessionState::Ready, SessionState::Connecting) => {
                warn!("Session lost, publishing suspended until reconnect");
            }
            (_, SessionState::Faulted(FaultKind::BrokerRefusal { code })) => {
                error!(code = %code, "Broker refused the session");
            }
            (_, SessionState::Faulted(kind)) => {
                warn!(fault = %kind, "Session faulted, client will retry");
            }
            _ => {
                info!("Session state: {:?} -> {:?}", from, to);
            }
        }
    }
}
