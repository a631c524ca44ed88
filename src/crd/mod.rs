//! The `Canary` custom resource definition: declarative spec and persisted status.

pub mod canary;

pub use canary::{
    Analysis, Canary, CanaryId, CanarySpec, CanaryStatus, MetricCheck, Phase, RequestMatch,
    TargetRef, WebhookSpec, DEFAULT_ANALYSIS_INTERVAL,
};
