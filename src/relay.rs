//! Relay protocol handler.
//!
//! Ties the subscription registry, pending store, liveness monitor and
//! webhook dispatcher together and interprets inbound frames:
//!
//! - `"ping"`: answered with `"pong"` if the connection is writable.
//! - `{"type":"sub"}`: registers the subscriber, then drains and delivers
//!   everything buffered for the topic.
//! - `{"type":"pub"}`: notifies webhooks, then fans out to subscribers or
//!   buffers when there are none.
//!
//! Malformed frames are logged and dropped; the connection stays open.

use crate::connection::ConnectionHandle;
use crate::error::Result;
use crate::liveness::LivenessMonitor;
use crate::pending::{PendingStore, DEFAULT_RETENTION};
use crate::subscriptions::SubscriptionRegistry;
use crate::types::{
    ConnectionId, InboundFrame, MessageKind, RelayStats, SocketMessage, KEEPALIVE_ACK,
};
use crate::webhooks::{WebhookDispatcher, WebhookSender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What one heartbeat tick did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeartbeatReport {
    pub probed: usize,
    pub terminated: Vec<ConnectionId>,
    pub evicted: usize,
}

/// The in-memory routing and buffering engine.
pub struct Relay {
    subscriptions: SubscriptionRegistry,
    pending: PendingStore,
    liveness: LivenessMonitor,
    webhooks: WebhookDispatcher,
    /// Serializes subscribe and publish routing so a publish can never buffer
    /// after a concurrent subscribe has already drained the topic.
    routing: Mutex<()>,
    /// How long undelivered messages are kept.
    retention: Duration,
    next_connection_id: AtomicU64,
}

impl Relay {
    /// Create a relay with the default 30 minute retention window.
    pub fn new(webhook_sender: Arc<dyn WebhookSender>) -> Self {
        Self::with_retention(webhook_sender, DEFAULT_RETENTION)
    }

    pub fn with_retention(webhook_sender: Arc<dyn WebhookSender>, retention: Duration) -> Self {
        Self {
            subscriptions: SubscriptionRegistry::new(),
            pending: PendingStore::new(),
            liveness: LivenessMonitor::new(),
            webhooks: WebhookDispatcher::new(webhook_sender),
            routing: Mutex::new(()),
            retention,
            next_connection_id: AtomicU64::new(1),
        }
    }

    /// Allocate an identifier for a new connection.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    pub fn pending(&self) -> &PendingStore {
        &self.pending
    }

    pub fn webhooks(&self) -> &WebhookDispatcher {
        &self.webhooks
    }

    // --- Connection lifecycle ---

    /// Register a freshly opened connection with the liveness monitor.
    pub fn connect(&self, connection: ConnectionHandle) {
        debug!(connection = %connection.id(), "Connection opened");
        self.liveness.track(connection);
    }

    /// Tear down a connection: drop all its subscriber entries.
    ///
    /// Safe to call more than once; only the first call for a tracked
    /// connection does anything. Returns whether this call performed the
    /// teardown.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        if !self.liveness.untrack(id) {
            return false;
        }
        self.subscriptions.remove_connection(id);
        debug!(connection = %id, "Connection closed");
        true
    }

    /// Record a transport-level heartbeat response.
    pub fn heartbeat_received(&self, id: ConnectionId) {
        self.liveness.mark_alive(id);
    }

    /// One heartbeat period: prune unresponsive connections, probe the rest
    /// and evict expired buffered messages.
    pub fn heartbeat_tick(&self) -> HeartbeatReport {
        let sweep = self.liveness.sweep();
        for id in &sweep.terminated {
            self.disconnect(*id);
        }
        let evicted = self.pending.evict_expired(self.retention);
        if evicted > 0 {
            debug!(evicted, "Evicted expired pending messages");
        }

        HeartbeatReport {
            probed: sweep.probed,
            terminated: sweep.terminated,
            evicted,
        }
    }

    // --- Frames ---

    /// Handle one inbound text frame from `connection`.
    ///
    /// A malformed frame is logged and returned as an error; nothing is
    /// mutated and the connection is unaffected.
    pub fn handle_frame(&self, connection: &ConnectionHandle, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }

        match InboundFrame::parse(text) {
            Ok(InboundFrame::Keepalive) => {
                if connection.is_open() {
                    let _ = connection.send_text(KEEPALIVE_ACK.to_string());
                }
                Ok(())
            }
            Ok(InboundFrame::Message(message)) => {
                self.handle_message(connection, message);
                Ok(())
            }
            Err(e) => {
                warn!(connection = %connection.id(), frame = text, error = %e, "Incoming message parse error");
                Err(e)
            }
        }
    }

    /// Route a parsed envelope.
    pub fn handle_message(&self, connection: &ConnectionHandle, message: SocketMessage) {
        debug!(connection = %connection.id(), topic = %message.topic, kind = ?message.kind, "IN");
        match message.kind {
            MessageKind::Subscribe => self.subscribe(connection, &message.topic),
            MessageKind::Publish => self.publish(message),
        }
    }

    /// Subscribe `connection` to `topic` and hand it everything buffered.
    pub fn subscribe(&self, connection: &ConnectionHandle, topic: &str) {
        let _routing = self.routing.lock();
        self.subscriptions.subscribe(topic, Arc::clone(connection));

        for pending in self.pending.drain_and_clear(topic) {
            self.deliver(connection, pending.message);
        }
    }

    /// Publish to every subscriber of the topic, or buffer if there are none.
    pub fn publish(&self, message: SocketMessage) {
        self.webhooks.notify(&message.topic);

        let _routing = self.routing.lock();
        let subscribers = self.subscriptions.subscribers_of(&message.topic);
        if subscribers.is_empty() {
            self.pending.enqueue(message);
            return;
        }

        for subscriber in &subscribers {
            self.deliver(&subscriber.connection, message.clone());
        }
    }

    /// Send to one connection, re-buffering if it is not writable right now.
    fn deliver(&self, connection: &ConnectionHandle, message: SocketMessage) {
        if !connection.is_open() {
            self.pending.enqueue(message);
            return;
        }

        let text = match message.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(topic = %message.topic, error = %e, "Dropping unserializable message");
                return;
            }
        };

        debug!(connection = %connection.id(), topic = %message.topic, "OUT");
        if connection.send_text(text).is_err() {
            self.pending.enqueue(message);
        }
    }

    // --- Control plane ---

    /// Whether at least one subscriber of `topic` has an open connection.
    pub fn is_topic_alive(&self, topic: &str) -> bool {
        self.subscriptions.has_open_subscriber(topic)
    }

    /// Register a webhook for `topic`. The caller has already validated it.
    pub fn register_webhook(&self, topic: &str, webhook: &str) {
        self.webhooks.register(topic, webhook);
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            pending_topics: self.pending.topic_count(),
            pending_messages: self.pending.message_count(),
            subscribed_topics: self.subscriptions.topic_count(),
            connections: self.liveness.len(),
        }
    }

    /// Log the current counters.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!("Pubs active: {}", stats.pending_topics);
        info!("Subs active: {}", stats.subscribed_topics);
    }
}
