//! Network link layer

pub mod monitor;
pub mod probe;

pub use monitor::{LinkDriver, LinkError, LinkEvent, LinkMonitor, LinkTransition, LinkUp};
pub use probe::{ProbeSettings, RouteProbe};
