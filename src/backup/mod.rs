//! The attachment backup pipeline.
//!
//! A run lists every attachment on the Kitsu server, decides per attachment
//! whether the stored copy is still current, and for stale ones performs
//! download → key resolution → upload, recording progress in the sync state
//! store so the next run only touches what changed.

mod coordinator;
mod error;
mod path_resolver;
mod sanitize;
mod worker;

#[cfg(test)]
pub(crate) mod fakes;

pub use coordinator::{Coordinator, RunSummary};
pub use error::BackupError;
pub use path_resolver::resolve;
pub use sanitize::sanitize;
pub use worker::{TransferOutcome, TransferWorker};

use std::path::PathBuf;

/// Pipeline settings, resolved from the configuration surface.
#[derive(Clone, Debug)]
pub struct BackupSettings {
    /// Top-level folder name inside the destination bucket.
    pub root_folder: String,
    /// Local directory holding per-attachment staging subdirectories.
    pub staging_root: PathBuf,
    /// File extensions that are never backed up.
    pub ignore_extensions: Vec<String>,
    /// Concurrency policy: negative = unbounded, zero = serial,
    /// positive = at most that many transfers in flight.
    pub threads: i64,
}
