//! A single canary's periodic ticker.
//!
//! A `tokio::time::interval` raced against a `tokio::sync::watch` stop
//! signal inside one `tokio::select!`, in one task. Because the tick arm
//! and the advancement call live in the same `select!`, a tick cannot be
//! consumed again until the in-flight `advance` future has resolved —
//! overlap for a single canary is ruled out structurally, not by a lock.

use crate::crd::CanaryId;
use crate::engine::Engine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// A running per-canary ticker, owned exclusively by the [`JobSet`](crate::scheduler::JobSet)
/// that started it.
pub struct Job {
    id: CanaryId,
    interval: Duration,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Job {
    /// Starts ticking immediately; non-blocking to the caller.
    pub fn start(id: CanaryId, interval: Duration, engine: Arc<Engine>) -> Self {
        let (stop, mut stop_rx) = watch::channel(false);
        let task_id = id.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let outcome = engine.advance(&task_id, false).await;
                        debug!(canary = %task_id, ?outcome, "tick complete");
                    }
                    _ = stop_rx.changed() => {
                        debug!(canary = %task_id, "job stopping");
                        break;
                    }
                }
            }
        });

        Self {
            id,
            interval,
            stop,
            handle,
        }
    }

    pub fn id(&self) -> &CanaryId {
        &self.id
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Stops tick consumption and waits for any in-flight tick to finish.
    /// Idempotent: dropping an already-stopped `Job` is harmless since the
    /// watch send is a no-op once the task has exited.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
#[path = "job_test.rs"]
mod tests;
