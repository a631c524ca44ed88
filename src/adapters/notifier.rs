//! HTTP [`Notifier`]: posts a JSON payload to a chat webhook.
//!
//! Env-var-gated enablement plus an optional sink URL: disabled or
//! unconfigured means a silent no-op.

use crate::crd::CanaryId;
use crate::ports::Notifier;
use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

/// Configuration read once at startup from:
/// - `CANARYCTL_NOTIFICATIONS_ENABLED` ("true" to enable, default: false)
/// - `CANARYCTL_NOTIFICATIONS_URL` (webhook endpoint)
pub struct WebhookNotifier {
    enabled: bool,
    url: Option<String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn from_env() -> Self {
        let enabled = std::env::var("CANARYCTL_NOTIFICATIONS_ENABLED")
            .map(|v| v == "true")
            .unwrap_or(false);
        let url = std::env::var("CANARYCTL_NOTIFICATIONS_URL").ok();

        Self {
            enabled,
            url,
            client: reqwest::Client::new(),
        }
    }

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            enabled: true,
            url: Some(url.into()),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, canary: &CanaryId, message: &str, is_init: bool, is_warning: bool) {
        if !self.enabled {
            return;
        }
        let Some(url) = &self.url else {
            return;
        };

        let payload = json!({
            "canary": canary.name,
            "namespace": canary.namespace,
            "message": message,
            "init": is_init,
            "warning": is_warning,
        });

        if let Err(err) = self.client.post(url).json(&payload).send().await {
            warn!(canary = %canary, error = %err, "failed to deliver notification");
        }
    }
}
