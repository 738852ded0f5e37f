//! Topic to subscriber bookkeeping.

use crate::connection::ConnectionHandle;
use crate::types::{ConnectionId, Timestamp};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// One subscribe request from one connection.
#[derive(Clone)]
pub struct Subscriber {
    pub topic: String,
    pub connection: ConnectionHandle,
    pub registered_at: Timestamp,
}

impl Subscriber {
    pub fn connection_id(&self) -> ConnectionId {
        self.connection.id()
    }
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("topic", &self.topic)
            .field("connection", &self.connection.id())
            .field("registered_at", &self.registered_at)
            .finish()
    }
}

/// Maps topics to their current subscribers.
///
/// A topic is present only while it has at least one entry.
pub struct SubscriptionRegistry {
    topics: RwLock<HashMap<String, Vec<Subscriber>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Append a subscriber entry. Never deduplicates.
    pub fn subscribe(&self, topic: &str, connection: ConnectionHandle) {
        let subscriber = Subscriber {
            topic: topic.to_string(),
            connection,
            registered_at: Timestamp::now(),
        };
        self.topics
            .write()
            .entry(topic.to_string())
            .or_default()
            .push(subscriber);
    }

    /// Snapshot of the subscribers of `topic` (empty if none).
    pub fn subscribers_of(&self, topic: &str) -> Vec<Subscriber> {
        self.topics.read().get(topic).cloned().unwrap_or_default()
    }

    /// Remove every entry owned by `connection` across all topics, dropping
    /// topics left empty.
    pub fn remove_connection(&self, connection: ConnectionId) {
        let mut topics = self.topics.write();
        topics.retain(|topic, subscribers| {
            let before = subscribers.len();
            subscribers.retain(|s| s.connection_id() != connection);
            if subscribers.len() != before {
                debug!(%connection, topic = %topic, removed = before - subscribers.len(), "Removed subscriber entries");
            }
            !subscribers.is_empty()
        });
    }

    /// Whether `topic` has at least one subscriber whose transport is open.
    pub fn has_open_subscriber(&self, topic: &str) -> bool {
        self.topics
            .read()
            .get(topic)
            .map(|subs| subs.iter().any(|s| s.connection.is_open()))
            .unwrap_or(false)
    }

    pub fn contains_topic(&self, topic: &str) -> bool {
        self.topics.read().contains_key(topic)
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.topics.read().len()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MemoryConnection;

    #[test]
    fn test_subscribe_and_lookup() {
        let registry = SubscriptionRegistry::new();
        let (a, _peer) = MemoryConnection::pair(ConnectionId(1));

        assert!(registry.subscribers_of("x").is_empty());

        registry.subscribe("x", a);
        let subs = registry.subscribers_of("x");
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].topic, "x");
        assert_eq!(subs[0].connection_id(), ConnectionId(1));
    }

    #[test]
    fn test_duplicate_subscribe_is_not_deduplicated() {
        let registry = SubscriptionRegistry::new();
        let (a, _peer) = MemoryConnection::pair(ConnectionId(1));

        registry.subscribe("x", a.clone());
        registry.subscribe("x", a);
        assert_eq!(registry.subscribers_of("x").len(), 2);
    }

    #[test]
    fn test_remove_connection_across_topics() {
        let registry = SubscriptionRegistry::new();
        let (a, _pa) = MemoryConnection::pair(ConnectionId(1));
        let (b, _pb) = MemoryConnection::pair(ConnectionId(2));

        registry.subscribe("x", a.clone());
        registry.subscribe("z", a.clone());
        registry.subscribe("z", b);
        assert_eq!(registry.topic_count(), 2);

        registry.remove_connection(ConnectionId(1));

        assert!(!registry.contains_topic("x"));
        let z = registry.subscribers_of("z");
        assert_eq!(z.len(), 1);
        assert_eq!(z[0].connection_id(), ConnectionId(2));
        assert_eq!(registry.topic_count(), 1);
    }

    #[test]
    fn test_open_subscriber_check() {
        let registry = SubscriptionRegistry::new();
        let (a, _peer) = MemoryConnection::pair(ConnectionId(1));

        assert!(!registry.has_open_subscriber("x"));
        registry.subscribe("x", a.clone());
        assert!(registry.has_open_subscriber("x"));

        // Still registered, but the transport is gone.
        a.close();
        assert!(registry.contains_topic("x"));
        assert!(!registry.has_open_subscriber("x"));
    }
}
