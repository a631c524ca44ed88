//! The Advancement Engine and its two collaborators: the Analyser (metric
//! and webhook evaluation) and the Conflict Detector (shared-target
//! warnings, invoked by the scheduler's `Sync`).

pub mod analyser;
pub mod conflict;
#[allow(clippy::module_inception)]
mod engine;

pub use analyser::Analyser;
pub use conflict::{detect_conflicts, Conflict};
pub use engine::{AdvanceOutcome, Engine, EngineError};
