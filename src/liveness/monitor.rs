//! Heartbeat bookkeeping for open connections.

use crate::connection::ConnectionHandle;
use crate::types::ConnectionId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Interval between heartbeat sweeps.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// A connection under watch.
struct Tracked {
    handle: ConnectionHandle,
    /// Set on any heartbeat response, cleared when a new probe goes out.
    answered: AtomicBool,
}

/// Result of one heartbeat sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Connections that were probed again.
    pub probed: usize,
    /// Connections terminated for missing the previous probe.
    pub terminated: Vec<ConnectionId>,
}

/// Tracks which open connections answered the last probe.
pub struct LivenessMonitor {
    connections: RwLock<HashMap<ConnectionId, Tracked>>,
}

impl LivenessMonitor {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Start watching a connection. New connections count as alive.
    pub fn track(&self, handle: ConnectionHandle) {
        let id = handle.id();
        self.connections.write().insert(
            id,
            Tracked {
                handle,
                answered: AtomicBool::new(true),
            },
        );
    }

    /// Stop watching a connection. Returns false if it was not tracked.
    pub fn untrack(&self, id: ConnectionId) -> bool {
        self.connections.write().remove(&id).is_some()
    }

    /// Record a heartbeat response.
    pub fn mark_alive(&self, id: ConnectionId) {
        if let Some(tracked) = self.connections.read().get(&id) {
            tracked.answered.store(true, Ordering::SeqCst);
        }
    }

    pub fn is_tracked(&self, id: ConnectionId) -> bool {
        self.connections.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Terminate connections that missed the previous probe, probe the rest.
    ///
    /// Terminated connections stay tracked; the caller tears them down so the
    /// subscription registry is cleaned in the same place as for a normal
    /// close.
    pub fn sweep(&self) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        let connections = self.connections.read();

        debug!(count = connections.len(), "Pinging client connections");

        for (id, tracked) in connections.iter() {
            if !tracked.answered.swap(false, Ordering::SeqCst) {
                warn!(connection = %id, "Connection missed heartbeat, terminating");
                tracked.handle.terminate();
                outcome.terminated.push(*id);
            } else {
                tracked.handle.ping();
                outcome.probed += 1;
            }
        }

        outcome
    }
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::new()
    }
}
