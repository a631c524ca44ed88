//! The Registry: a read-only view of `canary-id -> Canary`, kept live by a
//! `kube` reflector watch. The core only needs the read interface below,
//! but a watch+store is cheap enough to implement for real rather than
//! leave as a bare trait.

use crate::crd::{Canary, CanaryId};
use futures::TryStreamExt;
use kube::runtime::reflector::{self, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Read-only snapshot access to the set of declared canaries. Both
/// [`JobSet::sync`](crate::scheduler::JobSet::sync) and each tick's
/// `advance_canary` call read through this.
pub trait Registry: Send + Sync {
    /// A point-in-time copy of every canary currently known to the registry.
    fn snapshot(&self) -> HashMap<CanaryId, Arc<Canary>>;

    /// Look up a single canary by id.
    fn get(&self, id: &CanaryId) -> Option<Arc<Canary>> {
        self.snapshot().get(id).cloned()
    }
}

/// A `kube::runtime::reflector` store, watching `Canary` resources
/// cluster-wide and exposing them as a [`Registry`].
#[derive(Clone)]
pub struct ReflectorRegistry {
    store: Store<Canary>,
}

impl ReflectorRegistry {
    /// Spawn the background watch and return a handle immediately; the
    /// store starts empty and fills in as the initial list/watch completes.
    pub fn spawn(client: Client) -> Self {
        let api: Api<Canary> = Api::all(client);
        let (store, writer) = reflector::store();
        let stream = reflector::reflector(writer, watcher(api, watcher::Config::default()))
            .default_backoff()
            .touched_objects();

        tokio::spawn(async move {
            futures::pin_mut!(stream);
            loop {
                match stream.try_next().await {
                    Ok(Some(_)) => {}
                    Ok(None) => break,
                    Err(err) => warn!(error = %err, "canary registry watch error"),
                }
            }
        });

        Self { store }
    }
}

impl Registry for ReflectorRegistry {
    fn snapshot(&self) -> HashMap<CanaryId, Arc<Canary>> {
        self.store
            .state()
            .into_iter()
            .map(|canary| (canary.id(), canary))
            .collect()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
