//! MeshRouter and KubernetesRouter ports: traffic-weight read/write and
//! mesh-side service provisioning.

use crate::crd::Canary;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RouterError {
    #[error("transient routing error: {0}")]
    Transient(String),

    #[error("routing configuration error: {0}")]
    Configuration(String),
}

/// Weighted traffic-split read/write against the service mesh.
#[async_trait]
pub trait MeshRouter: Send + Sync {
    /// Ensure the mesh-side virtual service / route objects exist.
    async fn sync(&self, canary: &Canary) -> Result<(), RouterError>;

    /// Current `(primary_weight, canary_weight)` as reported by the mesh.
    async fn get_routes(&self, canary: &Canary) -> Result<(i32, i32), RouterError>;

    /// Every call the engine makes uses weights that sum to 100; the mesh
    /// is expected to treat this as idempotent.
    async fn set_routes(
        &self,
        canary: &Canary,
        primary_weight: i32,
        canary_weight: i32,
    ) -> Result<(), RouterError>;
}

/// Provisions the plain Kubernetes `Service` objects the mesh route points
/// at (distinct from the mesh-specific virtual service).
#[async_trait]
pub trait KubernetesRouter: Send + Sync {
    async fn sync(&self, canary: &Canary) -> Result<(), RouterError>;
}
