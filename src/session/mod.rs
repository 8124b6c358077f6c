//! Secure messaging session layer

pub mod client;
pub mod events;
pub mod manager;

pub use client::{ClientError, SessionClient, SessionConfig, SessionFactory};
pub use events::{SessionEvent, SessionLifecycle};
pub use manager::{SessionError, SessionManager, SessionStats, SessionTarget};
