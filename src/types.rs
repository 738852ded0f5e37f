//! Core types for the relay.

use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Keepalive probe sent by clients as a bare text frame.
pub const KEEPALIVE_PROBE: &str = "ping";

/// Reply to [`KEEPALIVE_PROBE`].
pub const KEEPALIVE_ACK: &str = "pong";

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();
        Timestamp(millis)
    }

    /// Time elapsed between `self` and a later `now`. Zero if `now` is earlier.
    pub fn age_at(self, now: Timestamp) -> Duration {
        Duration::from_millis(now.0.saturating_sub(self.0).max(0) as u64)
    }

    pub fn saturating_add(self, by: Duration) -> Self {
        Timestamp(self.0.saturating_add(by.as_millis() as i64))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Identifier of a live connection, unique for the lifetime of a relay.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(pub u64);

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Frame envelope kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "sub")]
    Subscribe,
    #[serde(rename = "pub")]
    Publish,
}

/// The JSON envelope exchanged over a relay connection.
///
/// Outbound deliveries reuse the publisher's envelope, so subscribers see the
/// same `{topic, type, payload, time}` shape they would send, along with any
/// other fields the publisher set (e.g. `silent`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketMessage {
    pub topic: String,

    #[serde(rename = "type")]
    pub kind: MessageKind,

    #[serde(default)]
    pub payload: String,

    /// Client supplied for inbound frames; overwritten with the buffering
    /// time when a publish is held for a later subscriber. Any JSON number
    /// is accepted and re-emitted as sent.
    #[serde(default = "zero_time")]
    pub time: Number,

    /// Envelope fields the relay does not interpret, forwarded untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn zero_time() -> Number {
    Number::from(0)
}

impl SocketMessage {
    pub fn publish(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            kind: MessageKind::Publish,
            payload: payload.into(),
            time: Number::from(Timestamp::now().0),
            extra: Map::new(),
        }
    }

    pub fn subscribe(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            kind: MessageKind::Subscribe,
            payload: String::new(),
            time: Number::from(Timestamp::now().0),
            extra: Map::new(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A parsed inbound text frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundFrame {
    /// The bare keepalive literal, handled before any JSON parsing.
    Keepalive,
    Message(SocketMessage),
}

impl InboundFrame {
    /// Parse a text frame. Unknown `type` values and invalid JSON are
    /// reported as [`RelayError::MalformedFrame`].
    pub fn parse(text: &str) -> Result<Self> {
        if text == KEEPALIVE_PROBE {
            return Ok(InboundFrame::Keepalive);
        }
        serde_json::from_str(text)
            .map(InboundFrame::Message)
            .map_err(|e| RelayError::MalformedFrame(e.to_string()))
    }
}

/// A webhook target registered against a topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookRegistration {
    pub topic: String,
    pub webhook: String,
}

/// Body POSTed to a webhook target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookNotice {
    pub topic: String,
}

/// Point-in-time counters for the relay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    /// Topics with at least one buffered message.
    pub pending_topics: usize,
    /// Total buffered messages across all topics.
    pub pending_messages: usize,
    /// Topics with at least one subscriber entry.
    pub subscribed_topics: usize,
    /// Connections tracked by the liveness monitor.
    pub connections: usize,
}
