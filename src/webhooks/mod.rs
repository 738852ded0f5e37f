//! Webhook registry and best-effort dispatcher.
//!
//! Every publish to a topic notifies each webhook registered for it,
//! whether or not any subscriber received the message. Dispatch is
//! fire-and-forget: a [`WebhookSender`] launches a detached unit of work per
//! target and nothing about its outcome flows back to the publisher.

mod dispatcher;

pub use dispatcher::{WebhookDispatcher, WebhookRegistry, WebhookSender};
