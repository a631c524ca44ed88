//! The Analyser: evaluates a canary's configured metric checks and
//! webhooks and returns a single pass/fail verdict.

use crate::crd::{Canary, MetricCheck};
use crate::ports::{EventSink, Notifier, Observer, ObserverError, Severity, WebhookCaller};
use std::sync::Arc;
use std::time::Duration;

const ENVOY_SUCCESS_RATE: &str = "envoy_cluster_upstream_rq";
const ISTIO_REQUESTS_TOTAL: &str = "istio_requests_total";
const ISTIO_DURATION_BUCKET: &str = "istio_request_duration_seconds_bucket";

pub struct Analyser {
    observer: Arc<dyn Observer>,
    webhooks: Arc<dyn WebhookCaller>,
    events: Arc<dyn EventSink>,
}

impl Analyser {
    pub fn new(
        observer: Arc<dyn Observer>,
        webhooks: Arc<dyn WebhookCaller>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            observer,
            webhooks,
            events,
        }
    }

    /// Runs every webhook, then every metric, in declared order. Returns
    /// `true` only if all of them pass.
    pub async fn analyze(&self, canary: &Canary) -> bool {
        let id = canary.id();

        for webhook in &canary.spec.analysis.webhooks {
            if let Err(err) = self.webhooks.call_webhook(&id, webhook).await {
                self.events.record(
                    &id,
                    Severity::Warning,
                    &format!("webhook {} failed: {err}", webhook.name),
                );
                return false;
            }
        }

        let default_interval = canary.analysis_interval();
        for metric in &canary.spec.analysis.metrics {
            if !self.evaluate_metric(canary, metric, default_interval).await {
                return false;
            }
        }

        true
    }

    async fn evaluate_metric(
        &self,
        canary: &Canary,
        metric: &MetricCheck,
        default_interval: Duration,
    ) -> bool {
        let id = canary.id();
        let interval = metric
            .interval
            .as_deref()
            .and_then(|raw| crate::crd::canary::parse_duration(raw).ok())
            .unwrap_or(default_interval);

        let target = &canary.spec.target_ref.name;
        let result = if metric.query.is_some() {
            self.observer
                .get_scalar(metric.query.as_deref().unwrap_or_default())
                .await
                .map(|value| value <= metric.threshold)
        } else {
            match metric.name.as_str() {
                ENVOY_SUCCESS_RATE => self
                    .observer
                    .get_envoy_success_rate(target, &id.namespace, &id.name, interval)
                    .await
                    .map(|value| value >= metric.threshold),
                ISTIO_REQUESTS_TOTAL => self
                    .observer
                    .get_deployment_counter(target, &id.namespace, &id.name, interval)
                    .await
                    .map(|value| value >= metric.threshold),
                ISTIO_DURATION_BUCKET => self
                    .observer
                    .get_deployment_histogram(target, &id.namespace, &id.name, interval)
                    .await
                    .map(|value| value <= Duration::from_millis(metric.threshold as u64)),
                other => {
                    self.events.record(
                        &id,
                        Severity::Warning,
                        &format!("halt advancement: unrecognized metric identifier {other}"),
                    );
                    return false;
                }
            }
        };

        match result {
            Ok(true) => true,
            Ok(false) => {
                self.events.record(
                    &id,
                    Severity::Warning,
                    &format!("halt advancement: {} check failed", metric.name),
                );
                false
            }
            Err(ObserverError::NoData) => {
                self.events.record(
                    &id,
                    Severity::Warning,
                    &format!(
                        "halt advancement: {} probably not receiving traffic",
                        target
                    ),
                );
                false
            }
            Err(err) => {
                self.events.record(
                    &id,
                    Severity::Error,
                    &format!("metric query failed for {}: {err}", metric.name),
                );
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "analyser_test.rs"]
mod tests;
