//! Prometheus-backed [`Recorder`].
//!
//! A `prometheus::Registry` plus typed vec gauges/counters, labeled for
//! canary traffic weight and analysis outcomes.

use crate::crd::CanaryId;
use crate::ports::Recorder;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntGaugeVec, Opts, Registry, TextEncoder};
use std::time::Duration;

/// Thread-safe container for every metric this crate exposes. Clone is
/// cheap: every field wraps an `Arc` internally.
#[derive(Clone)]
pub struct PrometheusRecorder {
    registry: Registry,
    canaries_total: IntGaugeVec,
    canary_weight: IntGaugeVec,
    canary_status: IntGaugeVec,
    analysis_duration_seconds: HistogramVec,
}

impl PrometheusRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let canaries_total = IntGaugeVec::new(
            Opts::new("canaryctl_canaries_total", "Number of canaries tracked per namespace"),
            &["namespace"],
        )?;
        registry.register(Box::new(canaries_total.clone()))?;

        let canary_weight = IntGaugeVec::new(
            Opts::new("canaryctl_traffic_weight", "Current traffic weight percentage"),
            &["namespace", "name", "target"],
        )?;
        registry.register(Box::new(canary_weight.clone()))?;

        let canary_status = IntGaugeVec::new(
            Opts::new("canaryctl_status", "Canary phase, one gauge per phase set to 1"),
            &["namespace", "name", "phase"],
        )?;
        registry.register(Box::new(canary_status.clone()))?;

        let analysis_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "canaryctl_analysis_duration_seconds",
                "Time spent evaluating a canary's analysis on a single tick",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["namespace", "name"],
        )?;
        registry.register(Box::new(analysis_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            canaries_total,
            canary_weight,
            canary_status,
            analysis_duration_seconds,
        })
    }

    /// Encode all metrics to Prometheus text format for the `/metrics` endpoint.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|err| prometheus::Error::Msg(format!("metrics not valid utf8: {err}")))
    }
}

impl Recorder for PrometheusRecorder {
    fn set_total(&self, namespace: &str, count: i64) {
        self.canaries_total.with_label_values(&[namespace]).set(count);
    }

    fn set_weight(&self, canary: &CanaryId, primary_weight: i32, canary_weight: i32) {
        self.canary_weight
            .with_label_values(&[&canary.namespace, &canary.name, "primary"])
            .set(i64::from(primary_weight));
        self.canary_weight
            .with_label_values(&[&canary.namespace, &canary.name, "canary"])
            .set(i64::from(canary_weight));
    }

    fn set_status(&self, canary: &CanaryId, phase: &str) {
        for candidate in ["Initialized", "Progressing", "Succeeded", "Failed"] {
            let value = i64::from(candidate == phase);
            self.canary_status
                .with_label_values(&[&canary.namespace, &canary.name, candidate])
                .set(value);
        }
    }

    fn set_duration(&self, canary: &CanaryId, elapsed: Duration) {
        self.analysis_duration_seconds
            .with_label_values(&[&canary.namespace, &canary.name])
            .observe(elapsed.as_secs_f64());
    }
}

#[cfg(test)]
#[path = "recorder_test.rs"]
mod tests;
