//! Reconciles the registry's set of canaries against the set of running
//! [`Job`]s: starts new ones, replaces ones whose interval changed, stops
//! ones no longer declared, and publishes per-namespace totals and
//! conflict warnings.

use crate::crd::CanaryId;
use crate::engine::{detect_conflicts, Engine};
use crate::ports::{EventSink, Recorder, Severity};
use crate::registry::Registry;
use crate::scheduler::Job;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Owns the jobs map; `sync` is the only mutator and is meant to be called
/// from a single driver task on a fixed cadence.
pub struct JobSet {
    registry: Arc<dyn Registry>,
    engine: Arc<Engine>,
    recorder: Arc<dyn Recorder>,
    events: Arc<dyn EventSink>,
    jobs: HashMap<CanaryId, Job>,
}

impl JobSet {
    pub fn new(
        registry: Arc<dyn Registry>,
        engine: Arc<Engine>,
        recorder: Arc<dyn Recorder>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            registry,
            engine,
            recorder,
            events,
            jobs: HashMap::new(),
        }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Runs one reconciliation pass. Serialized with itself by the
    /// caller holding `&mut self`.
    pub async fn sync(&mut self) {
        let snapshot = self.registry.snapshot();

        for (id, canary) in &snapshot {
            let interval = canary.analysis_interval();
            let needs_replace = matches!(self.jobs.get(id), Some(job) if job.interval() != interval);

            if needs_replace {
                if let Some(old) = self.jobs.remove(id) {
                    old.stop().await;
                }
            }

            if !self.jobs.contains_key(id) {
                info!(canary = %id, interval = ?interval, "starting job");
                self.jobs
                    .insert(id.clone(), Job::start(id.clone(), interval, self.engine.clone()));
            }
        }

        let stale: Vec<CanaryId> = self
            .jobs
            .keys()
            .filter(|id| !snapshot.contains_key(id))
            .cloned()
            .collect();
        for id in stale {
            info!(canary = %id, "stopping job for removed canary");
            if let Some(job) = self.jobs.remove(&id) {
                job.stop().await;
            }
        }

        let mut totals: HashMap<String, i64> = HashMap::new();
        for id in snapshot.keys() {
            *totals.entry(id.namespace.clone()).or_insert(0) += 1;
        }
        for (namespace, count) in totals {
            self.recorder.set_total(&namespace, count);
        }

        for conflict in detect_conflicts(&snapshot) {
            self.events.record(
                &conflict.canary,
                Severity::Warning,
                &format!(
                    "target {:?} is also governed by canary {}",
                    conflict.target, conflict.other
                ),
            );
        }
    }
}

#[cfg(test)]
#[path = "jobset_test.rs"]
mod tests;
