//! Event sink, external notifier and webhook caller ports.

use crate::crd::{CanaryId, WebhookSpec};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Human-readable events tagged to a canary (mirrors a Kubernetes `Event`
/// object without committing the core to writing one).
pub trait EventSink: Send + Sync {
    fn record(&self, canary: &CanaryId, severity: Severity, message: &str);
}

/// External chat notifications (Slack/Discord/Teams-style).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, canary: &CanaryId, message: &str, is_init: bool, is_warning: bool);
}

#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("webhook {0} failed: {1}")]
    Failed(String, String),
}

#[async_trait]
pub trait WebhookCaller: Send + Sync {
    async fn call_webhook(
        &self,
        canary: &CanaryId,
        webhook: &WebhookSpec,
    ) -> Result<(), WebhookError>;
}
