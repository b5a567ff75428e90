//! HTTP client for the Kitsu metadata API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use super::models::{Attachment, Entity, EntityType, Project, Task, TaskType};

/// Read access to the Kitsu metadata graph.
///
/// Lookups return a default (empty-id) record when the server reports the id
/// as unknown; callers treat empty names/ids as a not-found indication.
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// List every attachment file known to the server.
    async fn list_attachments(&self) -> Result<Vec<Attachment>>;

    async fn get_task(&self, id: &str) -> Result<Task>;

    async fn get_entity(&self, id: &str) -> Result<Entity>;

    async fn get_entity_type(&self, id: &str) -> Result<EntityType>;

    async fn get_task_type(&self, id: &str) -> Result<TaskType>;

    async fn get_project(&self, id: &str) -> Result<Project>;

    /// Download the attachment's bytes to `dest`, creating parent directories.
    ///
    /// Returns the number of bytes written.
    async fn download_attachment(&self, id: &str, file_name: &str, dest: &Path) -> Result<u64>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// Authenticated HTTP client for a Kitsu server.
///
/// The JWT is acquired once at construction and held by the instance; nothing
/// here reads or writes process-global state.
pub struct KitsuClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl KitsuClient {
    /// Log in to the Kitsu server and return a client holding the session JWT.
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the Kitsu server (e.g., "https://kitsu.studio.lan")
    /// * `email` / `password` - Kitsu account credentials
    /// * `timeout_sec` - Request timeout in seconds
    pub async fn authenticate(
        base_url: &str,
        email: &str,
        password: &str,
        timeout_sec: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .expect("Failed to create HTTP client");

        // Ensure base_url doesn't have trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let url = format!("{}/api/auth/login", base_url);
        let response = client
            .post(&url)
            .json(&LoginRequest { email, password })
            .send()
            .await
            .context("Failed to connect to Kitsu for login")?;

        if !response.status().is_success() {
            anyhow::bail!("Kitsu login failed with status: {}", response.status());
        }

        let login: LoginResponse = response
            .json()
            .await
            .context("Failed to parse login response")?;

        Ok(Self {
            client,
            base_url,
            token: login.access_token,
        })
    }

    /// Internal helper for authenticated JSON GETs.
    ///
    /// A 404 is mapped to the type's default value so callers can treat an
    /// unknown id as an empty record rather than a hard failure.
    async fn get_json<T: DeserializeOwned + Default>(&self, path: &str) -> Result<T> {
        let url = format!("{}/api/{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", path))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(T::default());
        }

        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch {}: status {}", path, response.status());
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse response for {}", path))
    }

    /// Get the base URL of the Kitsu server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl MetadataClient for KitsuClient {
    async fn list_attachments(&self) -> Result<Vec<Attachment>> {
        self.get_json("data/attachment-files").await
    }

    async fn get_task(&self, id: &str) -> Result<Task> {
        self.get_json(&format!("data/tasks/{}", id)).await
    }

    async fn get_entity(&self, id: &str) -> Result<Entity> {
        self.get_json(&format!("data/entities/{}", id)).await
    }

    async fn get_entity_type(&self, id: &str) -> Result<EntityType> {
        self.get_json(&format!("data/entity-types/{}", id)).await
    }

    async fn get_task_type(&self, id: &str) -> Result<TaskType> {
        self.get_json(&format!("data/task-types/{}", id)).await
    }

    async fn get_project(&self, id: &str) -> Result<Project> {
        self.get_json(&format!("data/projects/{}", id)).await
    }

    async fn download_attachment(&self, id: &str, file_name: &str, dest: &Path) -> Result<u64> {
        let url = format!(
            "{}/api/data/attachment-files/{}/file/{}",
            self.base_url, id, file_name
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to connect for download")?;

        if !response.status().is_success() {
            anyhow::bail!("Download failed with status: {}", response.status());
        }

        // Create parent directories if needed
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create parent directories")?;
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read response body")?;

        let mut file = File::create(dest)
            .await
            .context("Failed to create destination file")?;

        file.write_all(&bytes)
            .await
            .context("Failed to write to file")?;

        file.flush().await.context("Failed to flush file")?;

        Ok(bytes.len() as u64)
    }
}
