//! Error taxonomy shared by the completion-detection core.
//!
//! The scenario layer and CLI wrap these in `anyhow` with context; the core
//! itself returns typed errors so callers can tell a timeout from a log that
//! ended early.
use crate::extract::ExtractionResult;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// Root path for walking or watching does not exist.
    #[error("path not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A deadline race elapsed before the wrapped operation completed.
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The line source ended before every log rule applied.
    #[error("log ended before {} rule(s) matched: {}", .unapplied.len(), .unapplied.join(", "))]
    IncompleteExtraction {
        unapplied: Vec<String>,
        partial: ExtractionResult,
    },

    /// The artifact tracker was torn down before its expected set emptied.
    #[error("artifact tracker closed with {0} artifact(s) still missing")]
    TrackerClosed(usize),

    #[error("filesystem watch failed: {0}")]
    Watch(#[source] std::io::Error),

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, HarnessError::Timeout(_))
    }
}
