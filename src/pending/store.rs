//! Per-topic FIFO queues with time-window eviction.

use crate::types::{SocketMessage, Timestamp};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::debug;

/// How long an undelivered message is kept.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 60);

/// A buffered publish awaiting a subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingMessage {
    pub message: SocketMessage,
    pub enqueued_at: Timestamp,
}

impl PendingMessage {
    pub fn topic(&self) -> &str {
        &self.message.topic
    }
}

/// Undelivered messages by topic.
///
/// The queue for a topic exists only while it holds at least one message.
/// Queue length is unbounded.
pub struct PendingStore {
    queues: Mutex<HashMap<String, VecDeque<PendingMessage>>>,
}

impl PendingStore {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Append to the message's topic queue, stamped with the current time.
    pub fn enqueue(&self, message: SocketMessage) {
        self.enqueue_at(message, Timestamp::now());
    }

    /// Append with an explicit enqueue time.
    ///
    /// The message's `time` field is set to `now` so a later subscriber can
    /// tell when it was buffered.
    pub fn enqueue_at(&self, mut message: SocketMessage, now: Timestamp) {
        message.time = now.0.into();
        let topic = message.topic.clone();
        self.queues
            .lock()
            .entry(topic)
            .or_default()
            .push_back(PendingMessage {
                message,
                enqueued_at: now,
            });
    }

    /// Remove and return the whole queue for `topic`, in enqueue order.
    pub fn drain_and_clear(&self, topic: &str) -> Vec<PendingMessage> {
        self.queues
            .lock()
            .remove(topic)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Evict messages older than `retention`, measured against the wall clock.
    pub fn evict_expired(&self, retention: Duration) -> usize {
        self.evict_expired_at(retention, Timestamp::now())
    }

    /// Evict messages whose age at `now` exceeds `retention`.
    ///
    /// Pops from the front of each queue and stops at the first entry still
    /// inside the window. Returns the number of messages evicted.
    pub fn evict_expired_at(&self, retention: Duration, now: Timestamp) -> usize {
        let mut evicted = 0;
        let mut queues = self.queues.lock();

        queues.retain(|topic, queue| {
            while let Some(front) = queue.front() {
                if front.enqueued_at.age_at(now) > retention {
                    queue.pop_front();
                    evicted += 1;
                } else {
                    break;
                }
            }
            if queue.is_empty() {
                debug!(topic = %topic, "Pending queue emptied by eviction");
            }
            !queue.is_empty()
        });

        evicted
    }

    /// Number of messages buffered for `topic`.
    pub fn len(&self, topic: &str) -> usize {
        self.queues.lock().get(topic).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.queues.lock().is_empty()
    }

    /// Number of topics with buffered messages.
    pub fn topic_count(&self) -> usize {
        self.queues.lock().len()
    }

    /// Total buffered messages across all topics.
    pub fn message_count(&self) -> usize {
        self.queues.lock().values().map(VecDeque::len).sum()
    }
}

impl Default for PendingStore {
    fn default() -> Self {
        Self::new()
    }
}
