//! HTTP webhook sender.

use crate::types::WebhookNotice;
use crate::webhooks::WebhookSender;
use tokio::runtime::Handle;
use tracing::debug;

/// POSTs `{"topic": ...}` to webhook targets on the tokio runtime.
///
/// Each POST runs as its own detached task. No retries, and no timeout
/// beyond the client's defaults; failures are only logged.
pub struct HttpWebhookSender {
    client: reqwest::Client,
    runtime: Handle,
}

impl HttpWebhookSender {
    pub fn new(runtime: Handle) -> Self {
        Self {
            client: reqwest::Client::new(),
            runtime,
        }
    }
}

impl WebhookSender for HttpWebhookSender {
    fn send(&self, url: &str, notice: WebhookNotice) {
        let client = self.client.clone();
        let url = url.to_string();

        self.runtime.spawn(async move {
            match client.post(&url).json(&notice).send().await {
                Ok(response) if !response.status().is_success() => {
                    debug!(url = %url, status = %response.status(), "Webhook returned error status");
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(url = %url, error = %e, "Webhook request failed");
                }
            }
        });
    }
}
