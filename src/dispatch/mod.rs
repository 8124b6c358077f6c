//! Inbound routing and outbound gating

pub mod bridge;
pub mod registry;

pub use bridge::{DispatchBridge, DispatchError};
pub use registry::{HandlerRegistry, MessageCallback};
