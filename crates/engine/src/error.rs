//! Harvest error types.

use std::path::PathBuf;

use {shelfscan_browser::BrowserError, shelfscan_parser::ParseError, thiserror::Error};

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Browser(#[from] BrowserError),

    #[error(transparent)]
    Rules(#[from] ParseError),

    #[error("invalid count pattern '{pattern}': {source}")]
    CountPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The serialized document is suspiciously small. The HTML is kept so the
    /// caller can still parse and store it.
    #[error("snapshot is only {bytes} bytes (expected at least {min})")]
    EmptySnapshot {
        bytes: usize,
        min: usize,
        html: String,
    },

    /// Convergence stopped on a non-transient page error. Whatever was on
    /// screen was still extracted.
    #[error("convergence interrupted: {0}")]
    Interrupted(String),

    #[error("task exceeded its {0}ms budget")]
    Timeout(u64),

    #[error("failed to write {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = HarvestError> = std::result::Result<T, E>;
