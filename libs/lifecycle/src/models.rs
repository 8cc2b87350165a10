//! Video status and record models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing stage of a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    /// Payload stored, analysis not yet submitted
    Uploaded,
    /// Submitted to the analysis collaborator
    Indexing,
    /// Insights retrieved
    Indexed,
    /// Submission failed
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Uploaded => "uploaded",
            VideoStatus::Indexing => "indexing",
            VideoStatus::Indexed => "indexed",
            VideoStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of an analysis job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobRef(String);

impl JobRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobRef {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored video and its processing state
///
/// Identity, name, location and upload time are fixed at construction.
/// `status`, `indexed_at` and `duration_seconds` only change through
/// [`crate::VideoStore`] operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoRecord {
    id: String,
    name: String,
    location: String,
    status: VideoStatus,
    uploaded_at: DateTime<Utc>,
    indexed_at: Option<DateTime<Utc>>,
    duration_seconds: Option<f64>,
    size_bytes: Option<u64>,
    content_type: Option<String>,
}

impl VideoRecord {
    /// Create a record in the `Uploaded` state
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: location.into(),
            status: VideoStatus::Uploaded,
            uploaded_at,
            indexed_at: None,
            duration_seconds: None,
            size_bytes: None,
            content_type: None,
        }
    }

    /// Record for a freshly stored payload
    pub fn uploaded(
        id: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
        payload_len: usize,
        content_type: impl Into<String>,
    ) -> Self {
        Self::new(id, name, location, Utc::now())
            .with_size_bytes(payload_len as u64)
            .with_content_type(content_type)
    }

    pub fn with_size_bytes(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn status(&self) -> VideoStatus {
        self.status
    }

    pub fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }

    pub fn indexed_at(&self) -> Option<DateTime<Utc>> {
        self.indexed_at
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_seconds
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.size_bytes
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Overwrite the status. `indexed_at` is only taken when moving to
    /// `Indexed` and never replaces an earlier value.
    pub(crate) fn apply_status(&mut self, status: VideoStatus, indexed_at: Option<DateTime<Utc>>) {
        self.status = status;
        if status == VideoStatus::Indexed && self.indexed_at.is_none() {
            self.indexed_at = indexed_at;
        }
    }

    pub(crate) fn apply_duration(&mut self, seconds: f64) {
        self.duration_seconds = Some(seconds);
    }
}
