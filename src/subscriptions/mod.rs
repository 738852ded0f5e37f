//! Subscription registry: which connections want which topics.
//!
//! Pure bookkeeping. Entries are appended on every subscribe frame (repeated
//! subscribes from one connection are kept as separate entries) and removed
//! only in bulk when their connection goes away.

mod registry;

pub use registry::{Subscriber, SubscriptionRegistry};
