//! HTTP server for health and metrics endpoints
//!
//! Provides Kubernetes health probes:
//! - `/healthz` - Liveness probe (process is running)
//! - `/readyz` - Readiness probe (controller is ready to serve)
//! - `/metrics` - Prometheus metrics endpoint
//!
//! Also provides:
//! - Graceful shutdown handling for SIGTERM/SIGINT
//! - Leader election for multi-replica safety

mod health;
pub mod leader;
pub mod shutdown;

pub use health::{run_health_server, ReadinessState};
pub use leader::{run_leader_election, LeaderConfig, LeaderState};
pub use shutdown::{shutdown_channel, wait_for_signal, ShutdownController, ShutdownSignal};
