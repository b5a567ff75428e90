//! Destination object storage.

mod s3;

use anyhow::Result;
use async_trait::async_trait;

pub use s3::{S3ObjectStore, S3Settings};

/// Write access to the long-term object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `bytes` under `key`, overwriting any existing object.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
}
