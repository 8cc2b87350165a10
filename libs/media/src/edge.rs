//! CDN edge collaborator: rewrites storage locations to public edge URLs

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EdgeError {
    #[error("Edge endpoint not configured")]
    NotConfigured,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdgeConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeConfiguration {
    pub endpoint: Option<String>,
    pub cdn_enabled: bool,
    pub features: EdgeFeatures,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeFeatures {
    pub global_load_balancing: bool,
    pub ssl_offloading: bool,
    pub url_routing: bool,
    pub caching: bool,
    pub compression: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachePolicy {
    pub query_string_caching_behavior: &'static str,
    pub caching_behavior: &'static str,
    pub cache_duration_seconds: u64,
    pub compression_enabled: bool,
    pub content_types_to_compress: Vec<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct EdgeService {
    endpoint: Option<String>,
}

impl EdgeService {
    pub fn new(config: &EdgeConfig) -> Self {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty());
        Self { endpoint }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Public URL for a stored payload
    ///
    /// The bucket-qualified object path of the storage location is served
    /// from the edge endpoint.
    /// Without an endpoint, or for a location that is not an absolute URL,
    /// the location is returned unchanged.
    pub fn rewrite(&self, location: &str) -> String {
        let Some(endpoint) = &self.endpoint else {
            debug!("Edge not configured, returning storage location");
            return location.to_string();
        };

        match object_path(location) {
            Some(path) => format!("{}/{}", endpoint, path),
            None => {
                warn!(location = %location, "Could not parse storage location");
                location.to_string()
            }
        }
    }

    pub fn build_streaming_url(&self, video_id: &str, name: &str) -> Result<String, EdgeError> {
        let endpoint = self.endpoint.as_ref().ok_or(EdgeError::NotConfigured)?;
        Ok(format!("{}/videos/{}/{}", endpoint, video_id, name))
    }

    pub fn configuration(&self) -> EdgeConfiguration {
        EdgeConfiguration {
            endpoint: self.endpoint.clone(),
            cdn_enabled: self.is_configured(),
            features: EdgeFeatures {
                global_load_balancing: true,
                ssl_offloading: true,
                url_routing: true,
                caching: true,
                compression: true,
            },
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            query_string_caching_behavior: "IgnoreQueryString",
            caching_behavior: "Override",
            cache_duration_seconds: 7 * 24 * 60 * 60,
            compression_enabled: true,
            content_types_to_compress: vec![
                "video/mp4",
                "video/webm",
                "video/ogg",
                "application/dash+xml",
                "application/vnd.apple.mpegurl",
            ],
        }
    }
}

/// Object path of an absolute http(s) storage URL, without the leading slash
///
/// Virtual-hosted S3 URLs carry the bucket in the host; it is moved back in
/// front of the key so every storage flavour yields `{bucket}/{key}`.
fn object_path(location: &str) -> Option<String> {
    let rest = location
        .strip_prefix("https://")
        .or_else(|| location.strip_prefix("http://"))?;
    let (host, path) = rest.split_once('/')?;
    if path.is_empty() {
        return None;
    }

    match virtual_hosted_bucket(host) {
        Some(bucket) => Some(format!("{}/{}", bucket, path)),
        None => Some(path.to_string()),
    }
}

/// Bucket of a `{bucket}.s3[.-]{region}.amazonaws.com` host
fn virtual_hosted_bucket(host: &str) -> Option<&str> {
    let host = host.split(':').next()?;
    if !host.ends_with(".amazonaws.com") {
        return None;
    }
    let (bucket, _) = host
        .split_once(".s3.")
        .or_else(|| host.split_once(".s3-"))?;
    (!bucket.is_empty()).then_some(bucket)
}
