//! In-memory fakes for the pipeline's collaborator traits, used across the
//! backup tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::kitsu::{Attachment, Entity, EntityType, MetadataClient, Project, Task, TaskType};
use crate::object_store::ObjectStore;

/// Metadata client backed by hash maps. Missing ids resolve to default
/// records, mirroring the real client's 404 handling.
#[derive(Default)]
pub struct FakeMetadataClient {
    pub attachments: Mutex<Vec<Attachment>>,
    pub tasks: Mutex<HashMap<String, Task>>,
    pub entities: Mutex<HashMap<String, Entity>>,
    pub entity_types: Mutex<HashMap<String, EntityType>>,
    pub task_types: Mutex<HashMap<String, TaskType>>,
    pub projects: Mutex<HashMap<String, Project>>,

    /// Bytes served for every download.
    pub payload: Vec<u8>,
    /// Attachment ids whose download fails.
    pub fail_download_ids: Mutex<HashSet<String>>,
    /// Ids downloaded so far, in completion order.
    pub downloads: Mutex<Vec<String>>,
    /// Artificial per-download delay, to widen concurrency windows in tests.
    pub download_delay: Option<Duration>,

    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeMetadataClient {
    pub fn insert_task(&self, task: Task) {
        self.tasks.lock().unwrap().insert(task.id.clone(), task);
    }

    pub fn insert_entity(&self, entity: Entity) {
        self.entities.lock().unwrap().insert(entity.id.clone(), entity);
    }

    pub fn remove_entity(&self, id: &str) {
        self.entities.lock().unwrap().remove(id);
    }

    pub fn insert_entity_type(&self, entity_type: EntityType) {
        self.entity_types
            .lock()
            .unwrap()
            .insert(entity_type.id.clone(), entity_type);
    }

    pub fn remove_entity_type(&self, id: &str) {
        self.entity_types.lock().unwrap().remove(id);
    }

    pub fn insert_task_type(&self, task_type: TaskType) {
        self.task_types
            .lock()
            .unwrap()
            .insert(task_type.id.clone(), task_type);
    }

    pub fn remove_task_type(&self, id: &str) {
        self.task_types.lock().unwrap().remove(id);
    }

    pub fn insert_project(&self, project: Project) {
        self.projects.lock().unwrap().insert(project.id.clone(), project);
    }

    pub fn remove_project(&self, id: &str) {
        self.projects.lock().unwrap().remove(id);
    }

    pub fn fail_download_for(&self, id: &str) {
        self.fail_download_ids.lock().unwrap().insert(id.to_string());
    }

    pub fn downloaded_ids(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    /// Highest number of downloads observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataClient for FakeMetadataClient {
    async fn list_attachments(&self) -> Result<Vec<Attachment>> {
        Ok(self.attachments.lock().unwrap().clone())
    }

    async fn get_task(&self, id: &str) -> Result<Task> {
        Ok(self.tasks.lock().unwrap().get(id).cloned().unwrap_or_default())
    }

    async fn get_entity(&self, id: &str) -> Result<Entity> {
        Ok(self.entities.lock().unwrap().get(id).cloned().unwrap_or_default())
    }

    async fn get_entity_type(&self, id: &str) -> Result<EntityType> {
        Ok(self
            .entity_types
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_task_type(&self, id: &str) -> Result<TaskType> {
        Ok(self
            .task_types
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_project(&self, id: &str) -> Result<Project> {
        Ok(self.projects.lock().unwrap().get(id).cloned().unwrap_or_default())
    }

    async fn download_attachment(&self, id: &str, _file_name: &str, dest: &Path) -> Result<u64> {
        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if let Some(delay) = self.download_delay {
            tokio::time::sleep(delay).await;
        }

        let result = async {
            if self.fail_download_ids.lock().unwrap().contains(id) {
                bail!("simulated download failure for {}", id);
            }
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(dest, &self.payload).await?;
            self.downloads.lock().unwrap().push(id.to_string());
            Ok(self.payload.len() as u64)
        }
        .await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Object store that records uploads in memory.
#[derive(Default)]
pub struct FakeObjectStore {
    puts: Mutex<Vec<(String, Vec<u8>)>>,
    fail_all: Mutex<bool>,
}

impl FakeObjectStore {
    pub fn fail_uploads(&self) {
        *self.fail_all.lock().unwrap() = true;
    }

    pub fn keys(&self) -> Vec<String> {
        self.puts.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn put_count(&self) -> usize {
        self.puts.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        if *self.fail_all.lock().unwrap() {
            bail!("simulated upload failure for {}", key);
        }
        self.puts.lock().unwrap().push((key.to_string(), bytes));
        Ok(())
    }
}
