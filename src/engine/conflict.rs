//! Conflict Detector: warns when two canaries declare the same target
//! workload.

use crate::crd::{Canary, CanaryId};
use std::collections::HashMap;

/// A pair of canary ids that declare the same `targetRef.name` within the
/// same namespace. Both sides are reported; the core does not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub canary: CanaryId,
    pub other: CanaryId,
    pub target: String,
}

/// Scans a registry snapshot for canaries sharing a target workload.
///
/// Conflicts are scoped to `(namespace, target name)` — two canaries with
/// the same `targetRef.name` in different namespaces govern distinct
/// workloads and are not in conflict. Returns one [`Conflict`] entry per
/// ordered pair so every affected canary is individually reportable.
pub fn detect_conflicts(canaries: &HashMap<CanaryId, std::sync::Arc<Canary>>) -> Vec<Conflict> {
    let mut by_target: HashMap<(String, String), Vec<CanaryId>> = HashMap::new();
    for (id, canary) in canaries {
        by_target
            .entry((id.namespace.clone(), canary.spec.target_ref.name.clone()))
            .or_default()
            .push(id.clone());
    }

    let mut conflicts = Vec::new();
    for ((_, target), mut ids) in by_target {
        if ids.len() < 2 {
            continue;
        }
        ids.sort();
        for id in &ids {
            for other in &ids {
                if id != other {
                    conflicts.push(Conflict {
                        canary: id.clone(),
                        other: other.clone(),
                        target: target.clone(),
                    });
                }
            }
        }
    }
    conflicts
}

#[cfg(test)]
#[path = "conflict_test.rs"]
mod tests;
