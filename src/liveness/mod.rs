//! Connection liveness monitor.
//!
//! Every tracked connection carries an "answered last probe" flag. A sweep
//! terminates connections that never answered the previous probe and probes
//! the rest again.

mod monitor;

pub use monitor::{LivenessMonitor, SweepOutcome, DEFAULT_HEARTBEAT_INTERVAL};
