//! Connection handles held by the relay.
//!
//! The relay never owns a connection's transport. It keeps an
//! [`Arc<dyn Connection>`](ConnectionHandle) for sending, probing and identity
//! comparison; the transport drives the lifecycle and reports teardown back
//! through [`Relay::disconnect`](crate::Relay::disconnect).

use crate::error::{RelayError, Result};
use crate::types::ConnectionId;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A live, bidirectional client connection.
///
/// All methods must be non-blocking: they are called while routing frames.
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Whether the transport is open and writable right now.
    fn is_open(&self) -> bool;

    /// Queue a text frame. Fails with [`RelayError::ConnectionClosed`] if the
    /// transport is no longer writable.
    fn send_text(&self, text: String) -> Result<()>;

    /// Send a transport-level liveness probe.
    fn ping(&self);

    /// Forcibly close the transport.
    fn terminate(&self);
}

/// Shared handle to a connection.
pub type ConnectionHandle = Arc<dyn Connection>;

/// Frames written towards a peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Ping,
    Close,
}

/// In-process connection backed by an unbounded channel.
///
/// Used to embed the relay without a network transport and to drive it from
/// tests. The paired [`MemoryPeer`] sees everything the relay writes.
pub struct MemoryConnection {
    id: ConnectionId,
    open: AtomicBool,
    sender: Sender<Outbound>,
}

impl MemoryConnection {
    /// Create a connection and the peer end that receives its output.
    pub fn pair(id: ConnectionId) -> (Arc<MemoryConnection>, MemoryPeer) {
        let (sender, receiver) = unbounded();
        let conn = Arc::new(MemoryConnection {
            id,
            open: AtomicBool::new(true),
            sender,
        });
        (conn, MemoryPeer { receiver })
    }

    /// Mark the transport closed without notifying the relay, as when a
    /// socket dies before its close event has been processed.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl Connection for MemoryConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send_text(&self, text: String) -> Result<()> {
        if !self.is_open() {
            return Err(RelayError::ConnectionClosed);
        }
        self.sender
            .send(Outbound::Text(text))
            .map_err(|_| RelayError::ConnectionClosed)
    }

    fn ping(&self) {
        if self.is_open() {
            let _ = self.sender.send(Outbound::Ping);
        }
    }

    fn terminate(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.sender.send(Outbound::Close);
        }
    }
}

/// Receiving end of a [`MemoryConnection`].
pub struct MemoryPeer {
    receiver: Receiver<Outbound>,
}

impl MemoryPeer {
    /// Receive the next frame (blocking).
    pub fn recv(&self) -> std::result::Result<Outbound, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a frame (non-blocking).
    pub fn try_recv(&self) -> std::result::Result<Outbound, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<Outbound, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain every frame written so far.
    pub fn drain(&self) -> Vec<Outbound> {
        self.receiver.try_iter().collect()
    }

    /// Drain and keep only text frames.
    pub fn drain_text(&self) -> Vec<String> {
        self.drain()
            .into_iter()
            .filter_map(|frame| match frame {
                Outbound::Text(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}
