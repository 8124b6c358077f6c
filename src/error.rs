//! Top-level error type
//!
//! Each layer owns its own error enum; this module folds them into one type
//! for `main` and the orchestrator loop. Network-origin failures never reach
//! here: they surface as session state transitions instead.

use crate::config::ConfigError;
use crate::credential::CredentialError;
use crate::dispatch::DispatchError;
use crate::link::LinkError;
use crate::session::{ClientError, SessionError};
use crate::trust::TrustError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UplinkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Trust store error: {0}")]
    Trust(#[from] TrustError),

    #[error("Device identity error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Session client error: {0}")]
    Client(#[from] ClientError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Event channel closed: {0}")]
    ChannelClosed(&'static str),
}

impl UplinkError {
    /// Errors that indicate a construction bug rather than a runtime condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, UplinkError::Session(SessionError::AlreadyStarted))
    }
}

/// Result type for uplink operations
pub type UplinkResult<T> = Result<T, UplinkError>;
