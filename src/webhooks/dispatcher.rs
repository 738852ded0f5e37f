//! Topic to webhook registrations, and the notify path.

use crate::types::{WebhookNotice, WebhookRegistration};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Launches a single webhook POST.
///
/// Implementations must not block: spawn the request and return. Failures
/// are the implementation's to log; they are never reported back.
pub trait WebhookSender: Send + Sync {
    fn send(&self, url: &str, notice: WebhookNotice);
}

/// Registered webhooks by topic. Registrations live for the process lifetime.
pub struct WebhookRegistry {
    hooks: RwLock<HashMap<String, Vec<WebhookRegistration>>>,
}

impl WebhookRegistry {
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(HashMap::new()),
        }
    }

    /// Add a registration. The caller validates `webhook` beforehand.
    pub fn register(&self, topic: &str, webhook: &str) {
        self.hooks
            .write()
            .entry(topic.to_string())
            .or_default()
            .push(WebhookRegistration {
                topic: topic.to_string(),
                webhook: webhook.to_string(),
            });
    }

    pub fn registrations_for(&self, topic: &str) -> Vec<WebhookRegistration> {
        self.hooks.read().get(topic).cloned().unwrap_or_default()
    }

    pub fn topic_count(&self) -> usize {
        self.hooks.read().len()
    }
}

impl Default for WebhookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fans a publish event out to the webhooks registered for its topic.
pub struct WebhookDispatcher {
    registry: WebhookRegistry,
    sender: Arc<dyn WebhookSender>,
}

impl WebhookDispatcher {
    pub fn new(sender: Arc<dyn WebhookSender>) -> Self {
        Self {
            registry: WebhookRegistry::new(),
            sender,
        }
    }

    pub fn register(&self, topic: &str, webhook: &str) {
        debug!(topic, webhook, "Registered webhook");
        self.registry.register(topic, webhook);
    }

    pub fn registry(&self) -> &WebhookRegistry {
        &self.registry
    }

    /// Fire one notification per registration for `topic`. Returns how many
    /// were launched.
    pub fn notify(&self, topic: &str) -> usize {
        let registrations = self.registry.registrations_for(topic);
        for registration in &registrations {
            self.sender.send(
                &registration.webhook,
                WebhookNotice {
                    topic: topic.to_string(),
                },
            );
        }
        registrations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, WebhookNotice)>>,
    }

    impl WebhookSender for Recorder {
        fn send(&self, url: &str, notice: WebhookNotice) {
            self.sent.lock().push((url.to_string(), notice));
        }
    }

    #[test]
    fn test_notify_each_registration() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = WebhookDispatcher::new(recorder.clone());

        dispatcher.register("x", "https://a.example/hook");
        dispatcher.register("x", "https://b.example/hook");
        dispatcher.register("y", "https://c.example/hook");

        assert_eq!(dispatcher.notify("x"), 2);

        let sent = recorder.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "https://a.example/hook");
        assert_eq!(sent[1].0, "https://b.example/hook");
        assert!(sent.iter().all(|(_, n)| n.topic == "x"));
    }

    #[test]
    fn test_notify_without_registrations() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = WebhookDispatcher::new(recorder.clone());
        assert_eq!(dispatcher.notify("nobody"), 0);
        assert!(recorder.sent.lock().is_empty());
    }

    #[test]
    fn test_double_register_notifies_twice() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = WebhookDispatcher::new(recorder.clone());
        dispatcher.register("x", "https://a.example/hook");
        dispatcher.register("x", "https://a.example/hook");
        assert_eq!(dispatcher.notify("x"), 2);
        assert_eq!(dispatcher.registry().topic_count(), 1);
    }
}
