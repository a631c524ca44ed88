//! Graceful shutdown signaling, shared by the health server, leader
//! election loop, and every scheduler [`Job`](crate::scheduler::Job).
//!
//! A single [`ShutdownController`] is created in `main`; each long-running
//! task gets a cloned [`ShutdownSignal`] and selects on `wait()` alongside
//! its own work, per the `tokio::select!` shape used throughout this crate.

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::info;

/// The writing half, held by `main` and dropped (or triggered) once at
/// process exit.
#[derive(Clone)]
pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

/// The reading half, cloned into every task that needs to stop cleanly.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Create a new shutdown channel, initially "not shutting down".
pub fn shutdown_channel() -> (ShutdownController, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownController { tx }, ShutdownSignal { rx })
}

impl ShutdownController {
    /// Tell every holder of a [`ShutdownSignal`] to stop.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

impl ShutdownSignal {
    /// Resolves once shutdown has been triggered. Safe to call from a
    /// `tokio::select!` branch repeatedly (the watch channel replays its
    /// current value).
    pub async fn wait(&mut self) {
        if *self.rx.borrow() {
            return;
        }
        // A closed sender (controller dropped without triggering) should
        // still unblock waiters rather than hang forever.
        let _ = self.rx.changed().await;
    }

    /// Non-blocking check, for loops that want to bail out without
    /// awaiting a select branch.
    pub fn is_shutting_down(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Waits for SIGTERM or SIGINT and triggers shutdown on the controller.
///
/// Meant to be spawned once in `main` alongside the rest of the server
/// tasks; returns after the first signal is received.
pub async fn wait_for_signal(controller: ShutdownController) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(error = %err, "failed to install SIGTERM handler");
            return;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(stream) => stream,
        Err(err) => {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }

    controller.trigger();
}

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod tests;
