//! Error types for the backup pipeline.

use thiserror::Error;

/// Errors raised while processing a single attachment (or, for
/// `Configuration`, while preparing a run).
///
/// Everything except `Configuration` is scoped to one attachment: the worker
/// logs it, reports a failed/skipped outcome, and sibling workers carry on.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: String },

    #[error("transfer failed during {stage}: {cause:#}")]
    Transfer {
        stage: &'static str,
        cause: anyhow::Error,
    },

    #[error("sync state store error: {0:#}")]
    StateStore(anyhow::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl BackupError {
    pub fn transfer(stage: &'static str, cause: anyhow::Error) -> Self {
        BackupError::Transfer { stage, cause }
    }
}
