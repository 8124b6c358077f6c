//! Protocol-level types and topic rules
//!
//! QoS levels, message identifiers, subscriptions and the wildcard matching
//! rules used when routing inbound messages to handlers.

pub mod messages;
pub mod topics;

pub use messages::*;
pub use topics::*;
