//! Object storage collaborator backed by S3

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{
    Client,
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
};
use bytes::Bytes;
use common::error::{CollaboratorError, CollaboratorResult};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SERVICE: &str = "storage";

/// Object storage operations used by the platform
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Whether enough configuration is present to attempt calls
    fn is_configured(&self) -> bool;

    /// Store a payload under a fresh id, returning `(id, location)`
    async fn store(
        &self,
        data: Bytes,
        name: &str,
        content_type: &str,
    ) -> CollaboratorResult<(String, String)>;

    /// Location of a stored payload
    async fn fetch_url(&self, id: &str, name: &str) -> CollaboratorResult<String>;

    /// Delete a payload, returning `false` if it did not exist
    async fn delete(&self, id: &str, name: &str) -> CollaboratorResult<bool>;

    /// Every stored object key
    async fn list(&self) -> CollaboratorResult<Vec<String>>;
}

/// S3 connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, Spaces, ...)
    #[serde(default)]
    pub endpoint_url: Option<String>,
}

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
}

impl S3Storage {
    pub async fn new(config: &StorageConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let client = match config.endpoint_url.as_deref() {
            Some(endpoint) => {
                let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                Client::from_conf(s3_config)
            }
            None => Client::new(&sdk_config),
        };

        info!(bucket = %config.bucket, region = %config.region, "S3 storage client initialised");

        Self {
            client,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint_url: config.endpoint_url.clone(),
        }
    }

    /// Create the bucket if it does not exist yet
    pub async fn ensure_bucket(&self) -> CollaboratorResult<()> {
        self.require_bucket()?;

        let mut request = self.client.create_bucket().bucket(&self.bucket);
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => info!(bucket = %self.bucket, "Created storage bucket"),
            Err(SdkError::ServiceError(err))
                if err.err().is_bucket_already_owned_by_you()
                    || err.err().is_bucket_already_exists() =>
            {
                debug!(bucket = %self.bucket, "Storage bucket already exists");
            }
            Err(e) => return Err(unavailable(e)),
        }

        Ok(())
    }

    fn require_bucket(&self) -> CollaboratorResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(CollaboratorError::unavailable(SERVICE, "bucket not configured"));
        }
        Ok(())
    }

    fn object_key(id: &str, name: &str) -> String {
        format!("{}/{}", id, name)
    }

    /// Path-style URL for custom endpoints, virtual-hosted style for AWS
    pub(crate) fn object_url(endpoint_url: Option<&str>, bucket: &str, region: &str, key: &str) -> String {
        match endpoint_url {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key),
            None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
        }
    }

    fn url_for(&self, key: &str) -> String {
        Self::object_url(self.endpoint_url.as_deref(), &self.bucket, &self.region, key)
    }
}

fn unavailable<E, R>(err: SdkError<E, R>) -> CollaboratorError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    CollaboratorError::unavailable(SERVICE, DisplayErrorContext(&err).to_string())
}

#[async_trait]
impl ObjectStorage for S3Storage {
    fn is_configured(&self) -> bool {
        !self.bucket.trim().is_empty()
    }

    async fn store(
        &self,
        data: Bytes,
        name: &str,
        content_type: &str,
    ) -> CollaboratorResult<(String, String)> {
        self.require_bucket()?;

        let id = Uuid::new_v4().to_string();
        let key = Self::object_key(&id, name);
        let size = data.len();
        let start = std::time::Instant::now();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                warn!(bucket = %self.bucket, key = %key, size_bytes = size, "S3 upload failed");
                unavailable(e)
            })?;

        info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_millis() as u64,
            "S3 upload successful"
        );

        Ok((id, self.url_for(&key)))
    }

    async fn fetch_url(&self, id: &str, name: &str) -> CollaboratorResult<String> {
        self.require_bucket()?;
        Ok(self.url_for(&Self::object_key(id, name)))
    }

    async fn delete(&self, id: &str, name: &str) -> CollaboratorResult<bool> {
        self.require_bucket()?;
        let key = Self::object_key(id, name);

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(_) => {}
            Err(SdkError::ServiceError(err)) if err.err().is_not_found() => {
                debug!(key = %key, "Object already absent");
                return Ok(false);
            }
            Err(e) => return Err(unavailable(e)),
        }

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(unavailable)?;

        info!(bucket = %self.bucket, key = %key, "S3 object deleted");
        Ok(true)
    }

    async fn list(&self) -> CollaboratorResult<Vec<String>> {
        self.require_bucket()?;

        let mut keys = Vec::new();
        let mut continuation_token = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket);

            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(unavailable)?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_string)),
            );

            if response.is_truncated().unwrap_or(false) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        debug!(bucket = %self.bucket, count = keys.len(), "Listed storage objects");
        Ok(keys)
    }
}
