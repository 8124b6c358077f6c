//! Concrete session client implementations

pub mod mqtt;
