//! Harvest engine: drives a listing page until its product grid stops
//! growing, snapshots it, parses the records and reports the outcome.
//!
//! The browser sits behind the `shelfscan-browser` traits, so every stage can
//! run against a scripted page in tests.

pub mod artifacts;
pub mod convergence;
pub mod detect;
pub mod error;
pub mod harvest;
pub mod report;
pub mod snapshot;
pub mod state;

#[cfg(test)]
mod mock;

pub use {
    artifacts::{ArtifactFile, ArtifactKind, ArtifactStore, SavedArtifacts},
    convergence::{ConvergenceEngine, ConvergenceOutcome, Terminal},
    error::{HarvestError, Result},
    harvest::Harvester,
    report::{HarvestReport, HarvestStatus, ReasonCode, Reporter, Trail},
    state::{LoadMode, LoadState},
};
