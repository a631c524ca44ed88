//! Behavioral contracts for the core's external collaborators.
//!
//! The core depends only on these interfaces. [`crate::adapters`] supplies
//! the concrete implementations (test doubles for the workload-mutation ports,
//! thin real adapters for the observability ports).

pub mod deployer;
pub mod events;
pub mod observer;
pub mod recorder;
pub mod router;

pub use deployer::{CanaryReadyError, Deployer, DeployerError};
pub use events::{EventSink, Notifier, Severity, WebhookCaller, WebhookError};
pub use observer::{Observer, ObserverError};
pub use recorder::Recorder;
pub use router::{KubernetesRouter, MeshRouter, RouterError};
