//! Testing utilities and mock implementations
//!
//! Lets the lifecycle be exercised without a broker or a real link.

pub mod mocks;

pub use mocks::*;
