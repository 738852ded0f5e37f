//! Pending message store for store-and-forward delivery.
//!
//! Publishes that find no subscriber are queued per topic, oldest first,
//! until a subscriber drains them or the retention window expires them.
//!
//! Eviction only inspects the front of each queue and stops at the first
//! entry still inside the window, so queues must be appended in
//! non-decreasing `enqueued_at` order. [`PendingStore::enqueue`] stamps with
//! the wall clock; a clock stepping backwards can leave older entries behind
//! a newer one until the newer one expires too.

mod store;

pub use store::{PendingMessage, PendingStore, DEFAULT_RETENTION};
