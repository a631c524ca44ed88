//! [`WebhookCaller`]: invokes an analysis `WebhookSpec` over HTTP and maps
//! non-2xx responses and transport failures to [`WebhookError`].

use crate::crd::{CanaryId, WebhookSpec};
use crate::ports::{WebhookCaller, WebhookError};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HttpWebhookCaller {
    client: reqwest::Client,
}

impl HttpWebhookCaller {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpWebhookCaller {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookCaller for HttpWebhookCaller {
    async fn call_webhook(
        &self,
        canary: &CanaryId,
        webhook: &WebhookSpec,
    ) -> Result<(), WebhookError> {
        let timeout = webhook
            .timeout
            .as_deref()
            .and_then(|raw| crate::crd::canary::parse_duration(raw).ok())
            .unwrap_or(DEFAULT_TIMEOUT);

        let payload = json!({
            "name": canary.name,
            "namespace": canary.namespace,
            "metadata": webhook.metadata,
        });

        let response = self
            .client
            .post(&webhook.url)
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|err| WebhookError::Failed(webhook.name.clone(), err.to_string()))?;

        if !response.status().is_success() {
            return Err(WebhookError::Failed(
                webhook.name.clone(),
                format!("webhook returned status {}", response.status()),
            ));
        }

        Ok(())
    }
}
