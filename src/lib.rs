//! # Bridge Relay
//!
//! A store-and-forward message relay. Clients hold persistent connections,
//! subscribe to topics and publish payloads; the relay fans messages out to
//! connected subscribers and buffers them when nobody is listening, so a
//! later subscriber still receives missed traffic.
//!
//! ## Core Concepts
//!
//! - **Subscriptions**: topic to connection bookkeeping, cleared per connection on close
//! - **Pending messages**: per-topic FIFO buffers, evicted after a retention window
//! - **Liveness**: heartbeat probes that prune connections which stop answering
//! - **Webhooks**: best-effort HTTP notifications fired on every publish
//!
//! All state is in memory and lost on restart.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_relay::{MemoryConnection, Relay};
//!
//! let relay = Relay::new(webhook_sender);
//!
//! let (conn, peer) = MemoryConnection::pair(relay.next_connection_id());
//! let handle: bridge_relay::ConnectionHandle = conn;
//! relay.connect(handle.clone());
//!
//! relay.handle_frame(&handle, r#"{"topic":"x","type":"sub","payload":"","time":0}"#)?;
//! relay.handle_frame(&handle, r#"{"topic":"x","type":"pub","payload":"hi","time":0}"#)?;
//!
//! // peer now holds the delivered envelope
//! let frame = peer.recv()?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod liveness;
pub mod pending;
pub mod relay;
pub mod server;
pub mod subscriptions;
pub mod types;
pub mod webhooks;

// Re-exports
pub use config::RelayConfig;
pub use connection::{Connection, ConnectionHandle, MemoryConnection, MemoryPeer, Outbound};
pub use error::{RelayError, Result};
pub use liveness::{LivenessMonitor, SweepOutcome};
pub use pending::{PendingMessage, PendingStore};
pub use relay::{HeartbeatReport, Relay};
pub use server::{HttpWebhookSender, RelayServer};
pub use subscriptions::{Subscriber, SubscriptionRegistry};
pub use types::*;
pub use webhooks::{WebhookDispatcher, WebhookRegistry, WebhookSender};
