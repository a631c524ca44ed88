//! The Advancement Engine: drives a single canary through
//! initialization, revision detection, health gating, analysis, traffic
//! shifting, promotion and rollback — once per tick, re-entered with only
//! persisted status as memory.

use crate::crd::{Canary, CanaryId, CanaryStatus, Phase};
use crate::engine::analyser::Analyser;
use crate::ports::{
    CanaryReadyError, Deployer, DeployerError, EventSink, KubernetesRouter, MeshRouter, Notifier,
    Recorder, RouterError, Severity, WebhookCaller,
};
use crate::registry::Registry;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::warn;

/// Errors surfaced by a collaborator mid-tick. Always recorded as a
/// warning event and returned from — never propagated.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("deployer error: {0}")]
    Deployer(#[from] DeployerError),

    #[error("router error: {0}")]
    Router(#[from] RouterError),
}

/// Terminal result of one `advance` call, useful for assertions in tests
/// and for the scheduler's own logging. Not part of any external contract.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    NotFound,
    NotAdvancing,
    PrimaryNotReady,
    Initialized,
    ProgressingStarted,
    RevisionReset,
    CanaryNotReadyRetry,
    RolledBack,
    AnalysisFailed,
    Advanced(i32),
    Promoted,
    Succeeded,
    AbIteration(i32),
    AbPromoted,
    AbSucceeded,
    Error(EngineError),
}

enum StatusCheck {
    Proceed,
    Initialized,
    ProgressingStarted,
    NotProceed,
}

/// Records a warning event and short-circuits `advance` with
/// `AdvanceOutcome::Error`, converting the collaborator error via `From`.
// `self` cannot be captured by a `$x:ident` matcher, so this macro assumes
// it is only ever invoked from within an `impl Engine` method.
macro_rules! guard {
    ($id:expr, $context:literal, $result:expr) => {
        match $result {
            Ok(value) => value,
            Err(err) => {
                let err: EngineError = err.into();
                self.warn($id, format!("{}: {err}", $context));
                return AdvanceOutcome::Error(err);
            }
        }
    };
}

pub struct Engine {
    registry: Arc<dyn Registry>,
    deployer: Arc<dyn Deployer>,
    mesh_router: Arc<dyn MeshRouter>,
    kubernetes_router: Arc<dyn KubernetesRouter>,
    analyser: Analyser,
    recorder: Arc<dyn Recorder>,
    events: Arc<dyn EventSink>,
    notifier: Arc<dyn Notifier>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<dyn Registry>,
        deployer: Arc<dyn Deployer>,
        mesh_router: Arc<dyn MeshRouter>,
        kubernetes_router: Arc<dyn KubernetesRouter>,
        observer: Arc<dyn crate::ports::Observer>,
        webhooks: Arc<dyn WebhookCaller>,
        recorder: Arc<dyn Recorder>,
        events: Arc<dyn EventSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            deployer,
            mesh_router,
            kubernetes_router,
            analyser: Analyser::new(observer, webhooks, events.clone()),
            recorder,
            events,
            notifier,
        }
    }

    fn warn(&self, id: &CanaryId, message: impl AsRef<str>) {
        let message = message.as_ref();
        self.events.record(id, Severity::Warning, message);
        warn!(canary = %id, "{message}");
    }

    /// Entry point: `advanceCanary(name, namespace, skipLivenessChecks)`.
    pub async fn advance(&self, id: &CanaryId, skip_liveness_checks: bool) -> AdvanceOutcome {
        let started_at = Instant::now();
        let outcome = self.advance_inner(id, skip_liveness_checks).await;
        self.recorder.set_duration(id, started_at.elapsed());
        outcome
    }

    async fn advance_inner(&self, id: &CanaryId, skip_liveness_checks: bool) -> AdvanceOutcome {
        // Phase A — Resolve & prepare.
        let Some(canary) = self.registry.get(id) else {
            warn!(canary = %id, "canary not found in registry");
            return AdvanceOutcome::NotFound;
        };

        guard!(id, "deployer sync failed", self.deployer.sync(&canary).await);
        guard!(id,
            "kubernetes router sync failed",
            self.kubernetes_router.sync(&canary).await
        );
        guard!(id, "mesh router sync failed", self.mesh_router.sync(&canary).await);

        // Phase B — Gate on Deployer readiness.
        let should_advance = guard!(id,
            "should_advance check failed",
            self.deployer.should_advance(&canary).await
        );
        if !should_advance {
            return AdvanceOutcome::NotAdvancing;
        }

        let max_weight = canary.spec.analysis.effective_max_weight();

        if !skip_liveness_checks {
            if let Err(err) = self.deployer.is_primary_ready(&canary).await {
                self.warn(id, format!("primary not ready: {err}"));
                return AdvanceOutcome::PrimaryNotReady;
            }
        }

        // Phase C — Read mesh state & status bootstrap.
        let (primary_weight, canary_weight) = guard!(id,
            "get_routes failed",
            self.mesh_router.get_routes(&canary).await
        );
        self.recorder.set_weight(id, primary_weight, canary_weight);

        let mut status = canary.status.clone().unwrap_or_default();

        match self.check_canary_status(&canary, &mut status, should_advance).await {
            StatusCheck::Proceed => {}
            StatusCheck::Initialized => return AdvanceOutcome::Initialized,
            StatusCheck::ProgressingStarted => return AdvanceOutcome::ProgressingStarted,
            StatusCheck::NotProceed => return AdvanceOutcome::NotAdvancing,
        }

        // Phase D — Revision-change short-circuit.
        if status.phase == Some(Phase::Progressing) {
            let is_new_spec = guard!(id,
                "is_new_spec check failed",
                self.deployer.is_new_spec(&canary).await
            );
            let config_changed = guard!(id,
                "has_config_changed check failed",
                self.deployer.has_config_changed(&canary).await
            );
            if is_new_spec || config_changed {
                guard!(id,
                    "set_routes failed during revision reset",
                    self.mesh_router.set_routes(&canary, 100, 0).await
                );
                self.recorder.set_weight(id, 100, 0);
                status.reset_for_new_revision();
                guard!(id,
                    "sync_status failed during revision reset",
                    self.deployer.sync_status(&canary, &status).await
                );
                return AdvanceOutcome::RevisionReset;
            }
        }

        // Phase E — Canary readiness.
        let mut rollback_not_retriable = false;
        if !skip_liveness_checks {
            if let Err(err) = self.deployer.is_canary_ready(&canary).await {
                match err {
                    CanaryReadyError::Retriable(msg) => {
                        self.warn(id, format!("canary not yet ready: {msg}"));
                        return AdvanceOutcome::CanaryNotReadyRetry;
                    }
                    CanaryReadyError::NotRetriable(_) => {
                        rollback_not_retriable = true;
                    }
                }
            }
        }

        // Phase F — Skip-analysis fast path.
        if canary.spec.skip_analysis {
            return self.promote_and_succeed(id, &canary, &mut status).await;
        }

        // Phase G — Rollback gate.
        if status.phase == Some(Phase::Progressing)
            && (status.failed_checks >= canary.spec.analysis.threshold || rollback_not_retriable)
        {
            return self.rollback(id, &canary, &mut status, rollback_not_retriable).await;
        }

        // Phase H — Analysis. The very first analysis tick (mesh canary
        // weight still 0) records that analysis is starting but does not
        // run the Analyser yet; it falls straight through to Phase I so the
        // first traffic shift happens on the same tick. Mesh weight, not
        // the persisted status field, is the source of truth here: in A/B
        // mode `status.canary_weight` never moves off 0 (A/B advances by
        // iteration count, not weight), so gating on it would permanently
        // skip analysis across every A/B iteration.
        if canary_weight == 0 {
            self.events.record(id, Severity::Info, "analysis starting");
        } else if !self.analyser.analyze(&canary).await {
            status.failed_checks += 1;
            guard!(id,
                "sync_status failed after analysis failure",
                self.deployer.sync_status(&canary, &status).await
            );
            return AdvanceOutcome::AnalysisFailed;
        }

        // Phase I — Advance or promote.
        if canary.spec.analysis.is_ab_mode() {
            self.advance_ab(id, &canary, &mut status).await
        } else {
            self.advance_weighted(id, &canary, &mut status, primary_weight, canary_weight, max_weight)
                .await
        }
    }

    async fn check_canary_status(
        &self,
        canary: &Canary,
        status: &mut CanaryStatus,
        should_advance: bool,
    ) -> StatusCheck {
        let id = canary.id();
        match status.phase {
            Some(Phase::Progressing) => StatusCheck::Proceed,
            None => {
                status.phase = Some(Phase::Initialized);
                if self.deployer.sync_status(canary, status).await.is_err() {
                    self.warn(&id, "sync_status failed during initialization");
                    return StatusCheck::NotProceed;
                }
                self.events.record(&id, Severity::Info, "initialization done");
                self.notifier.notify(&id, "initialization done", true, false).await;
                StatusCheck::Initialized
            }
            Some(_) if should_advance => {
                self.events.record(&id, Severity::Info, "new revision detected");
                self.notifier.notify(&id, "new revision detected", false, false).await;
                if self.deployer.scale(canary, 1).await.is_err() {
                    self.warn(&id, "scale to 1 failed on new revision");
                    return StatusCheck::NotProceed;
                }
                status.phase = Some(Phase::Progressing);
                if self.deployer.sync_status(canary, status).await.is_err() {
                    self.warn(&id, "sync_status failed on new revision");
                    return StatusCheck::NotProceed;
                }
                StatusCheck::ProgressingStarted
            }
            _ => StatusCheck::NotProceed,
        }
    }

    async fn rollback(
        &self,
        id: &CanaryId,
        canary: &Canary,
        status: &mut CanaryStatus,
        not_retriable: bool,
    ) -> AdvanceOutcome {
        let reason = if not_retriable {
            "canary deployment will not become ready"
        } else {
            "failed checks threshold exceeded"
        };
        self.events.record(id, Severity::Warning, &format!("rolling back: {reason}"));
        self.notifier.notify(id, &format!("rolling back: {reason}"), false, true).await;

        guard!(id,
            "set_routes failed during rollback",
            self.mesh_router.set_routes(canary, 100, 0).await
        );
        self.recorder.set_weight(id, 100, 0);
        guard!(id, "scale to 0 failed during rollback", self.deployer.scale(canary, 0).await);

        status.phase = Some(Phase::Failed);
        status.canary_weight = 0;
        guard!(id,
            "sync_status failed during rollback",
            self.deployer.sync_status(canary, status).await
        );
        AdvanceOutcome::RolledBack
    }

    async fn promote_and_succeed(
        &self,
        id: &CanaryId,
        canary: &Canary,
        status: &mut CanaryStatus,
    ) -> AdvanceOutcome {
        guard!(id,
            "set_routes failed during promotion",
            self.mesh_router.set_routes(canary, 100, 0).await
        );
        self.recorder.set_weight(id, 100, 0);
        guard!(id, "promote failed", self.deployer.promote(canary).await);
        guard!(id, "scale to 0 failed after promotion", self.deployer.scale(canary, 0).await);

        status.phase = Some(Phase::Succeeded);
        status.canary_weight = 0;
        guard!(id,
            "sync_status failed after promotion",
            self.deployer.sync_status(canary, status).await
        );
        self.notifier.notify(id, "promotion complete", false, false).await;
        AdvanceOutcome::Succeeded
    }

    async fn advance_ab(
        &self,
        id: &CanaryId,
        canary: &Canary,
        status: &mut CanaryStatus,
    ) -> AdvanceOutcome {
        let target_iterations = canary.spec.analysis.iterations;

        if status.iterations < target_iterations {
            guard!(id,
                "set_routes failed during A/B iteration",
                self.mesh_router.set_routes(canary, 0, 100).await
            );
            self.recorder.set_weight(id, 0, 100);
            status.iterations += 1;
            guard!(id,
                "sync_status failed during A/B iteration",
                self.deployer.sync_status(canary, status).await
            );
            self.events.record(
                id,
                Severity::Info,
                &format!("iteration {}/{target_iterations}", status.iterations),
            );
            AdvanceOutcome::AbIteration(status.iterations)
        } else if status.iterations == target_iterations {
            guard!(id, "promote failed in A/B mode", self.deployer.promote(canary).await);
            status.iterations += 1;
            guard!(id,
                "sync_status failed after A/B promotion",
                self.deployer.sync_status(canary, status).await
            );
            AdvanceOutcome::AbPromoted
        } else {
            guard!(id,
                "set_routes failed finishing A/B mode",
                self.mesh_router.set_routes(canary, 100, 0).await
            );
            self.recorder.set_weight(id, 100, 0);
            guard!(id, "scale to 0 failed finishing A/B mode", self.deployer.scale(canary, 0).await);

            status.phase = Some(Phase::Succeeded);
            status.canary_weight = 0;
            guard!(id,
                "sync_status failed finishing A/B mode",
                self.deployer.sync_status(canary, status).await
            );
            self.notifier.notify(id, "promotion complete", false, false).await;
            AdvanceOutcome::AbSucceeded
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn advance_weighted(
        &self,
        id: &CanaryId,
        canary: &Canary,
        status: &mut CanaryStatus,
        primary_weight: i32,
        canary_weight: i32,
        max_weight: i32,
    ) -> AdvanceOutcome {
        if status.canary_weight < max_weight {
            let step = canary.spec.analysis.step_weight;
            let new_primary = (primary_weight - step).clamp(0, 100);
            let new_canary = canary_weight + step;

            guard!(id,
                "set_routes failed advancing weight",
                self.mesh_router.set_routes(canary, new_primary, new_canary).await
            );
            self.recorder.set_weight(id, new_primary, new_canary);
            status.canary_weight = new_canary;
            guard!(id,
                "sync_status failed advancing weight",
                self.deployer.sync_status(canary, status).await
            );
            self.events
                .record(id, Severity::Info, &format!("advance weight to {new_canary}"));

            if new_canary >= max_weight {
                guard!(id, "promote failed at max weight", self.deployer.promote(canary).await);
                return AdvanceOutcome::Promoted;
            }
            AdvanceOutcome::Advanced(new_canary)
        } else {
            guard!(id,
                "set_routes failed finishing weighted rollout",
                self.mesh_router.set_routes(canary, 100, 0).await
            );
            self.recorder.set_weight(id, 100, 0);
            guard!(id,
                "scale to 0 failed finishing weighted rollout",
                self.deployer.scale(canary, 0).await
            );

            status.phase = Some(Phase::Succeeded);
            status.canary_weight = 0;
            guard!(id,
                "sync_status failed finishing weighted rollout",
                self.deployer.sync_status(canary, status).await
            );
            self.notifier.notify(id, "promotion complete", false, false).await;
            AdvanceOutcome::Succeeded
        }
    }
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
