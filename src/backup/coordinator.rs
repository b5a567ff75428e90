//! Run orchestration: attachment listing, concurrency policy, outcome
//! aggregation.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use super::error::BackupError;
use super::worker::{TransferOutcome, TransferWorker};
use super::BackupSettings;
use crate::kitsu::{Attachment, MetadataClient};
use crate::object_store::ObjectStore;
use crate::sync_store::SyncStateStore;

/// Aggregate outcome of one backup run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn add(&mut self, outcome: TransferOutcome) {
        match outcome {
            TransferOutcome::Succeeded => self.succeeded += 1,
            TransferOutcome::Failed => self.failed += 1,
            TransferOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

/// Drives one full backup pass: resets the staging root, lists attachments,
/// dispatches a transfer worker per attachment under the configured
/// concurrency policy, and merges per-worker outcomes.
pub struct Coordinator {
    client: Arc<dyn MetadataClient>,
    worker: TransferWorker,
    settings: Arc<BackupSettings>,
}

impl Coordinator {
    pub fn new(
        client: Arc<dyn MetadataClient>,
        sync_store: Arc<dyn SyncStateStore>,
        object_store: Arc<dyn ObjectStore>,
        settings: Arc<BackupSettings>,
    ) -> Self {
        let worker = TransferWorker::new(
            client.clone(),
            sync_store,
            object_store,
            settings.clone(),
        );
        Self {
            client,
            worker,
            settings,
        }
    }

    /// Run one full backup pass.
    ///
    /// Configuration problems (unusable staging root, empty destination root)
    /// abort before dispatch; per-attachment failures only show up in the
    /// summary counts.
    pub async fn run(&self) -> Result<RunSummary, BackupError> {
        self.reset_staging_root().await?;

        let attachments = self
            .client
            .list_attachments()
            .await
            .map_err(|e| BackupError::transfer("list attachments", e))?;

        if attachments.is_empty() {
            info!("No attachments listed, nothing to do");
            return Ok(RunSummary::default());
        }

        info!(
            "Processing {} attachments (threads = {})",
            attachments.len(),
            self.settings.threads
        );

        let summary = match self.settings.threads {
            t if t < 0 => self.run_unbounded(attachments).await,
            0 => self.run_serial(attachments).await,
            t => self.run_bounded(attachments, t as usize).await,
        };

        info!(
            "Backup run finished: {} succeeded, {} failed, {} skipped",
            summary.succeeded, summary.failed, summary.skipped
        );
        Ok(summary)
    }

    /// Each run starts from a clean local footprint.
    async fn reset_staging_root(&self) -> Result<(), BackupError> {
        if self.settings.root_folder.is_empty() {
            return Err(BackupError::Configuration(
                "destination root folder is empty".to_string(),
            ));
        }

        let root = &self.settings.staging_root;
        if let Err(e) = tokio::fs::remove_dir_all(root).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(BackupError::Configuration(format!(
                    "cannot clear staging root {:?}: {}",
                    root, e
                )));
            }
        }
        tokio::fs::create_dir_all(root).await.map_err(|e| {
            BackupError::Configuration(format!("cannot create staging root {:?}: {}", root, e))
        })
    }

    async fn run_serial(&self, attachments: Vec<Attachment>) -> RunSummary {
        let mut summary = RunSummary::default();
        for attachment in &attachments {
            summary.add(self.worker.transfer(attachment).await);
        }
        summary
    }

    async fn run_unbounded(&self, attachments: Vec<Attachment>) -> RunSummary {
        let mut tasks = JoinSet::new();
        for attachment in attachments {
            let worker = self.worker.clone();
            tasks.spawn(async move { worker.transfer(&attachment).await });
        }
        Self::join_all(tasks).await
    }

    async fn run_bounded(&self, attachments: Vec<Attachment>, limit: usize) -> RunSummary {
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();
        for attachment in attachments {
            let worker = self.worker.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    // The semaphore is never closed; a closed gate means the
                    // transfer never ran.
                    Err(_) => return TransferOutcome::Failed,
                };
                worker.transfer(&attachment).await
            });
        }
        Self::join_all(tasks).await
    }

    /// Merge outcomes from every spawned worker. The summary is only complete
    /// once all workers have been joined; a panicking worker counts as failed.
    async fn join_all(mut tasks: JoinSet<TransferOutcome>) -> RunSummary {
        let mut summary = RunSummary::default();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(outcome) => summary.add(outcome),
                Err(e) => {
                    error!("Transfer worker panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}
