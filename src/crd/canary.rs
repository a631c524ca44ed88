//! The `Canary` custom resource: declarative input and persisted status.
//!
//! Compatible in spirit with Flagger's `Canary` CRD, trimmed to the fields
//! the advancement engine actually reads.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// `(name, namespace)` — the identity used to key jobs, the conflict
/// detector, and every log/event field that tags a canary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanaryId {
    pub name: String,
    pub namespace: String,
}

impl CanaryId {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for CanaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.namespace)
    }
}

/// Canary is a Custom Resource describing how to progressively deliver a
/// workload behind a service mesh.
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[kube(
    group = "canary.sailshift.io",
    version = "v1alpha1",
    kind = "Canary",
    namespaced,
    status = "CanaryStatus",
    printcolumn = r#"{"name":"Phase", "type":"string", "jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Weight", "type":"integer", "jsonPath":".status.canaryWeight"}"#,
    printcolumn = r#"{"name":"Failed Checks", "type":"integer", "jsonPath":".status.failedChecks"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct CanarySpec {
    /// The workload this canary governs.
    #[serde(rename = "targetRef")]
    pub target_ref: TargetRef,

    /// Tick period, e.g. "30s", "1m". Falls back to [`DEFAULT_ANALYSIS_INTERVAL`] when absent.
    #[serde(rename = "analysisInterval", skip_serializing_if = "Option::is_none")]
    pub analysis_interval: Option<String>,

    /// Analysis configuration: thresholds, traffic-shift shape, metrics, webhooks.
    pub analysis: Analysis,

    /// Bypass analysis and promote on the first ready tick.
    #[serde(rename = "skipAnalysis", default)]
    pub skip_analysis: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
pub struct TargetRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
pub struct Analysis {
    /// Consecutive failed checks tolerated before rollback.
    pub threshold: i32,

    /// Upper bound of canary traffic share before promotion. Defaults to 100
    /// when unset or non-positive — see [`Analysis::effective_max_weight`].
    #[serde(rename = "maxWeight", skip_serializing_if = "Option::is_none")]
    pub max_weight: Option<i32>,

    /// Traffic-weight increment per successful tick (weighted mode).
    #[serde(rename = "stepWeight", default)]
    pub step_weight: i32,

    /// Number of iterations to hold full traffic on the canary (A/B mode).
    #[serde(default)]
    pub iterations: i32,

    /// Non-empty iff A/B mode. Opaque to the core — only its emptiness is inspected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub r#match: Vec<RequestMatch>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<MetricCheck>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub webhooks: Vec<WebhookSpec>,
}

impl Analysis {
    pub const DEFAULT_MAX_WEIGHT: i32 = 100;

    /// Resolve the effective max weight: default to 100 when unset or
    /// non-positive.
    pub fn effective_max_weight(&self) -> i32 {
        match self.max_weight {
            Some(w) if w > 0 => w,
            _ => Self::DEFAULT_MAX_WEIGHT,
        }
    }

    /// A/B mode is active iff `match` is non-empty.
    pub fn is_ab_mode(&self) -> bool {
        !self.r#match.is_empty()
    }
}

/// Mesh-specific request matcher. Opaque to the core: only used to detect
/// A/B mode (non-empty `match`) and forwarded to the router factory.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
pub struct RequestMatch {
    #[serde(flatten)]
    pub fields: std::collections::BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
pub struct MetricCheck {
    pub name: String,

    /// Explicit query; when set, takes precedence over the well-known
    /// metric-name templates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    pub threshold: f64,

    /// Overrides the canary's default analysis interval for this metric.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
pub struct WebhookSpec {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<std::collections::BTreeMap<String, String>>,
}

/// Persisted feedback, read and written every tick.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct CanaryStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,

    #[serde(rename = "canaryWeight", default)]
    pub canary_weight: i32,

    #[serde(rename = "failedChecks", default)]
    pub failed_checks: i32,

    #[serde(default)]
    pub iterations: i32,

    #[serde(rename = "lastAppliedSpec", skip_serializing_if = "Option::is_none")]
    pub last_applied_spec: Option<String>,

    #[serde(rename = "trackedConfigHash", skip_serializing_if = "Option::is_none")]
    pub tracked_config_hash: Option<String>,
}

impl CanaryStatus {
    pub fn reset_for_new_revision(&mut self) {
        self.phase = Some(Phase::Progressing);
        self.canary_weight = 0;
        self.failed_checks = 0;
        self.iterations = 0;
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum Phase {
    Initialized,
    Progressing,
    Succeeded,
    Failed,
}

/// Applied when a `Canary`'s `analysisInterval` is absent.
pub const DEFAULT_ANALYSIS_INTERVAL: Duration = Duration::from_secs(60);

/// Parse a Kubernetes-style duration string (`"30s"`, `"5m"`, `"1h"`).
///
/// Only the single-unit suffixes Flagger-style specs use are accepted;
/// anything else is a configuration error, not a panic.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty duration".to_string());
    }
    let (num, unit) = raw.split_at(raw.len() - 1);
    let value: u64 = num
        .parse()
        .map_err(|_| format!("invalid duration {raw:?}"))?;
    match unit {
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 3600)),
        _ => Err(format!("unsupported duration unit in {raw:?}")),
    }
}

impl Canary {
    pub fn id(&self) -> CanaryId {
        CanaryId::new(
            self.metadata.name.clone().unwrap_or_default(),
            self.metadata.namespace.clone().unwrap_or_default(),
        )
    }

    /// The tick interval this canary's Job should run at.
    pub fn analysis_interval(&self) -> Duration {
        self.spec
            .analysis_interval
            .as_deref()
            .and_then(|raw| parse_duration(raw).ok())
            .unwrap_or(DEFAULT_ANALYSIS_INTERVAL)
    }
}

#[cfg(test)]
#[path = "canary_test.rs"]
mod tests;
