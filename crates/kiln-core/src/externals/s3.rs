//! S3 file store collaborator
//!
//! Works against AWS S3 or any S3-compatible endpoint such as MinIO. The
//! bucket is wiped before every test, so its name must end with `test`.

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::{Delete, ObjectIdentifier, ServerSideEncryption},
    Client,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

use super::{FileStore, FileStoreError};

/// Maximum keys per DeleteObjects request
const DELETE_BATCH: usize = 1000;

const SAFE_BUCKET_SUFFIX: &str = "test";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileStoreConfig {
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub path_style: bool,
    /// Server-side encryption for uploads, e.g. `AES256`
    pub encryption: Option<String>,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            bucket: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            path_style: false,
            encryption: None,
        }
    }
}

impl FileStoreConfig {
    /// Override values from `S3_ENDPOINT`, `S3_REGION`, `S3_BUCKET`,
    /// `S3_ACCESS_KEY`/`AWS_ACCESS_KEY_ID`, `S3_SECRET_KEY`/`AWS_SECRET_ACCESS_KEY`
    /// and `S3_PATH_STYLE`
    pub fn apply_env(&mut self) {
        if let Ok(endpoint) = std::env::var("S3_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        if let Ok(region) = std::env::var("S3_REGION") {
            self.region = region;
        }
        if let Ok(bucket) = std::env::var("S3_BUCKET") {
            self.bucket = bucket;
        }
        if let Ok(key) = std::env::var("S3_ACCESS_KEY").or_else(|_| std::env::var("AWS_ACCESS_KEY_ID"))
        {
            self.access_key = key;
        }
        if let Ok(secret) =
            std::env::var("S3_SECRET_KEY").or_else(|_| std::env::var("AWS_SECRET_ACCESS_KEY"))
        {
            self.secret_key = secret;
        }
        if let Some(path_style) = std::env::var("S3_PATH_STYLE")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.path_style = path_style;
        }
    }

    pub fn for_minio(endpoint: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            bucket: bucket.into(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            path_style: true,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), FileStoreError> {
        if self.bucket.trim().is_empty() {
            return Err(FileStoreError::Config("bucket is not set".to_string()));
        }
        if !self.bucket.ends_with(SAFE_BUCKET_SUFFIX) {
            return Err(FileStoreError::UnsafeBucket(self.bucket.clone()));
        }
        if self.access_key.is_empty() || self.secret_key.is_empty() {
            return Err(FileStoreError::Config(
                "access_key and secret_key are required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct S3FileStore {
    client: Client,
    bucket: String,
    encryption: Option<ServerSideEncryption>,
}

impl S3FileStore {
    pub fn new(config: &FileStoreConfig) -> Result<Self, FileStoreError> {
        config.validate()?;

        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "kiln-file-store",
        );

        let mut builder = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .force_path_style(config.path_style);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(bucket = %config.bucket, "File store client initialized");

        Ok(Self::from_client(
            Client::from_conf(builder.build()),
            config.bucket.clone(),
            config.encryption.as_deref(),
        ))
    }

    pub fn from_client(client: Client, bucket: impl Into<String>, encryption: Option<&str>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            encryption: encryption.map(ServerSideEncryption::from),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn delete_batch(&self, keys: &[String]) -> Result<(), FileStoreError> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FileStoreError::request("DeleteObjects", e.to_string()))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| FileStoreError::request("DeleteObjects", e.to_string()))?;

        let response = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| {
                FileStoreError::request("DeleteObjects", DisplayErrorContext(&e).to_string())
            })?;

        if let Some(error) = response.errors().first() {
            return Err(FileStoreError::request(
                "DeleteObjects",
                format!(
                    "{} of {} object(s) not deleted, first: {} ({})",
                    response.errors().len(),
                    keys.len(),
                    error.key().unwrap_or_default(),
                    error.message().unwrap_or_default()
                ),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl FileStore for S3FileStore {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn clean(&self) -> Result<usize, FileStoreError> {
        let keys = self.list().await?;

        for batch in keys.chunks(DELETE_BATCH) {
            self.delete_batch(batch).await?;
        }

        debug!(objects = keys.len(), "Deleted objects");
        Ok(keys.len())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn put(&self, key: &str, local_path: &Path) -> Result<(), FileStoreError> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| FileStoreError::LocalFile {
                path: local_path.to_path_buf(),
                message: e.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .set_server_side_encryption(self.encryption.clone())
            .send()
            .await
            .map_err(|e| FileStoreError::request("PutObject", DisplayErrorContext(&e).to_string()))?;

        debug!(key, "Uploaded file");
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list(&self) -> Result<Vec<String>, FileStoreError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| {
                    FileStoreError::request("ListObjectsV2", DisplayErrorContext(&e).to_string())
                })?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );

            match response.next_continuation_token() {
                Some(token) if response.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                },
                _ => break,
            }
        }

        Ok(keys)
    }
}
