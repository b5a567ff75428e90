//! Kitsu Attachment Backup
//!
//! Mirrors file attachments from a Kitsu production-tracking server into
//! S3-compatible object storage, rebuilding a human-readable key from each
//! attachment's project/entity/task lineage and skipping anything already
//! backed up and unchanged.

pub mod backup;
pub mod config;
pub mod kitsu;
pub mod object_store;
pub mod sync_store;

// Re-export commonly used types for convenience
pub use backup::{BackupSettings, Coordinator, RunSummary, TransferOutcome};
pub use config::{AppConfig, CliConfig, FileConfig};
pub use kitsu::{KitsuClient, MetadataClient};
pub use object_store::{ObjectStore, S3ObjectStore, S3Settings};
pub use sync_store::{SqliteSyncStateStore, SyncStateStore, SyncStatus};
