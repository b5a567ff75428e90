//! Per-attachment transfer execution.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::error::BackupError;
use super::path_resolver::resolve;
use super::sanitize::sanitize;
use super::BackupSettings;
use crate::kitsu::{Attachment, MetadataClient};
use crate::object_store::ObjectStore;
use crate::sync_store::{SyncStateStore, SyncStatus};

/// Result of processing one attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Nothing to do: ignored, unresolvable, or already backed up.
    Skipped,
    /// Downloaded and uploaded, state recorded as done.
    Succeeded,
    /// Transfer failed; state stays `new` so the next run retries.
    Failed,
}

/// Executes the decide → download → upload → record sequence for one
/// attachment. Cheap to clone per spawned task.
#[derive(Clone)]
pub struct TransferWorker {
    client: Arc<dyn MetadataClient>,
    sync_store: Arc<dyn SyncStateStore>,
    object_store: Arc<dyn ObjectStore>,
    settings: Arc<BackupSettings>,
}

impl TransferWorker {
    pub fn new(
        client: Arc<dyn MetadataClient>,
        sync_store: Arc<dyn SyncStateStore>,
        object_store: Arc<dyn ObjectStore>,
        settings: Arc<BackupSettings>,
    ) -> Self {
        Self {
            client,
            sync_store,
            object_store,
            settings,
        }
    }

    /// Process one attachment. Never propagates an error: every failure is
    /// logged with its stage and folded into the returned outcome, so one bad
    /// attachment cannot abort its siblings.
    pub async fn transfer(&self, attachment: &Attachment) -> TransferOutcome {
        if attachment.id.is_empty() {
            warn!("Skipping attachment with missing id (name: {:?})", attachment.name);
            return TransferOutcome::Skipped;
        }
        if attachment.name.is_empty() {
            warn!("Skipping attachment {} with missing name", attachment.id);
            return TransferOutcome::Skipped;
        }
        if self
            .settings
            .ignore_extensions
            .iter()
            .any(|ext| ext == &attachment.extension)
        {
            debug!(
                "Skipping attachment {} with ignored extension {}",
                attachment.id, attachment.extension
            );
            return TransferOutcome::Skipped;
        }

        match self
            .sync_store
            .should_skip(&attachment.id, &attachment.updated_at)
        {
            Ok(true) => {
                debug!("Skipping unchanged attachment {} ({})", attachment.id, attachment.name);
                return TransferOutcome::Skipped;
            }
            Ok(false) => {}
            Err(e) => {
                error!(
                    "State lookup failed for attachment {} ({}): {:#}",
                    attachment.id, attachment.name, e
                );
                return TransferOutcome::Failed;
            }
        }

        // Crash-safety marker: an interrupted run leaves `new` behind, which
        // forces a retry next time.
        if let Err(e) = self.record_status(attachment, SyncStatus::New) {
            error!(
                "Failed to mark attachment {} as new: {:#}",
                attachment.id, e
            );
            return TransferOutcome::Failed;
        }

        let staging_dir = self.settings.staging_root.join(&attachment.id);
        let result = self.perform_transfer(attachment, &staging_dir).await;

        // The staging subdirectory is released on every exit path, success or
        // not; a failed upload must not leave local bytes behind.
        if let Err(e) = tokio::fs::remove_dir_all(&staging_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove staging dir {:?}: {}", staging_dir, e);
            }
        }

        match result {
            Ok(()) => TransferOutcome::Succeeded,
            Err(BackupError::NotFound { what, id }) => {
                warn!(
                    "Skipping attachment {} ({}): {} {} not found in metadata graph",
                    attachment.id, attachment.name, what, id
                );
                TransferOutcome::Skipped
            }
            Err(e) => {
                error!(
                    "Backup failed for attachment {} ({}): {}",
                    attachment.id, attachment.name, e
                );
                TransferOutcome::Failed
            }
        }
    }

    /// Steps 4-7: download into staging, resolve the destination key, upload,
    /// mark done.
    async fn perform_transfer(
        &self,
        attachment: &Attachment,
        staging_dir: &Path,
    ) -> Result<(), BackupError> {
        let file_name = sanitize(&attachment.name);
        let local_path = staging_dir.join(&file_name);

        let size = self
            .client
            .download_attachment(&attachment.id, &file_name, &local_path)
            .await
            .map_err(|e| BackupError::transfer("download", e))?;
        debug!("Downloaded {} bytes for attachment {}", size, attachment.id);

        let key = resolve(
            self.client.as_ref(),
            attachment,
            &self.settings.root_folder,
        )
        .await?;

        let bytes = tokio::fs::read(&local_path)
            .await
            .map_err(|e| BackupError::transfer("staging read", e.into()))?;

        self.object_store
            .put(&key, bytes)
            .await
            .map_err(|e| BackupError::transfer("upload", e))?;

        self.record_status(attachment, SyncStatus::Done)?;

        info!("Backed up attachment {} to {}", attachment.id, key);
        Ok(())
    }

    fn record_status(
        &self,
        attachment: &Attachment,
        status: SyncStatus,
    ) -> Result<(), BackupError> {
        let exists = self
            .sync_store
            .get(&attachment.id)
            .map_err(BackupError::StateStore)?
            .is_some();
        let result = if exists {
            self.sync_store
                .update(&attachment.id, &attachment.updated_at, status)
        } else {
            self.sync_store
                .create(&attachment.id, &attachment.updated_at, status)
        };
        result.map_err(BackupError::StateStore)
    }
}
