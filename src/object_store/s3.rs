//! S3 implementation of the object store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use super::ObjectStore;

/// Connection settings for an S3-compatible endpoint.
///
/// Endpoint and path-style addressing are exposed so self-hosted stores
/// (MinIO and friends) work alongside AWS proper.
#[derive(Clone, Debug)]
pub struct S3Settings {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub force_path_style: bool,
}

/// Object store backed by an S3 bucket.
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from static credentials.
    pub async fn new(settings: S3Settings) -> Result<Self> {
        let credentials = Credentials::new(
            &settings.access_key,
            &settings.secret_key,
            None,
            None,
            "kitsu-backup",
        );

        let mut config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials);

        if let Some(ref endpoint) = settings.endpoint {
            config_loader = config_loader.endpoint_url(endpoint);
        }

        let sdk_config = config_loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.force_path_style)
            .build();

        Ok(Self {
            client: S3Client::from_conf(s3_config),
            bucket: settings.bucket,
        })
    }

    /// Create a store from an existing S3 client (for testing).
    #[allow(dead_code)]
    pub fn from_client(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .with_context(|| format!("Failed to upload object {}", key))?;

        Ok(())
    }
}
