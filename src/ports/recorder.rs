//! The Recorder port: metric emission for the controller's own operation.

use crate::crd::CanaryId;
use std::time::Duration;

/// Emits operational metrics about the controller itself (as opposed to
/// the Observer, which reads metrics about the workloads it governs).
pub trait Recorder: Send + Sync {
    fn set_total(&self, namespace: &str, count: i64);
    fn set_weight(&self, canary: &CanaryId, primary_weight: i32, canary_weight: i32);
    fn set_status(&self, canary: &CanaryId, phase: &str);
    fn set_duration(&self, canary: &CanaryId, elapsed: Duration);
}
