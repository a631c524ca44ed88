//! The Deployer port: workload mutation, readiness probing and status
//! persistence. No production implementation lives in this crate — this
//! module only defines the contract the Advancement Engine calls through.

use crate::crd::{Canary, CanaryStatus, Phase};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DeployerError {
    #[error("transient infrastructure error: {0}")]
    Transient(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Applies workload mutations (scale, promote) and answers readiness and
/// revision-change questions. A production implementation talks to the
/// Kubernetes API; this crate ships only test doubles (see
/// [`crate::adapters::fakes`]).
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Ensure the primary workload and any autoscaler exist.
    async fn sync(&self, canary: &Canary) -> Result<(), DeployerError>;

    /// Gating predicate: primary healthy, canary workload stabilized since
    /// the last change, etc.
    async fn should_advance(&self, canary: &Canary) -> Result<bool, DeployerError>;

    async fn is_primary_ready(&self, canary: &Canary) -> Result<(), DeployerError>;

    /// Returns whether the canary is ready, and whether a failure is
    /// retriable (transient) or not (e.g. progress deadline exceeded).
    async fn is_canary_ready(&self, canary: &Canary) -> Result<(), CanaryReadyError>;

    /// Copies the canary's template/config onto the primary-named workload.
    async fn promote(&self, canary: &Canary) -> Result<(), DeployerError>;

    async fn scale(&self, canary: &Canary, replicas: i32) -> Result<(), DeployerError>;

    /// True if the canary's spec has changed since the last applied
    /// revision (a brand-new rollout trigger).
    async fn is_new_spec(&self, canary: &Canary) -> Result<bool, DeployerError>;

    /// True if tracked ConfigMap/Secret references have changed
    /// (`configTracker.HasConfigChanged`).
    async fn has_config_changed(&self, canary: &Canary) -> Result<bool, DeployerError>;

    async fn sync_status(
        &self,
        canary: &Canary,
        status: &CanaryStatus,
    ) -> Result<(), DeployerError>;

    async fn set_status_phase(&self, canary: &Canary, phase: Phase) -> Result<(), DeployerError>;
}

/// Outcome of [`Deployer::is_canary_ready`]'s failure path: whether the
/// next tick should simply retry, or whether rollback logic should run in
/// this same tick.
#[derive(Debug, Clone, Error)]
pub enum CanaryReadyError {
    #[error("canary not yet ready (retriable): {0}")]
    Retriable(String),

    #[error("canary will not become ready: {0}")]
    NotRetriable(String),
}
