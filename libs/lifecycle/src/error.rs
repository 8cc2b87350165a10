//! Tracker error types

use thiserror::Error;

/// Errors returned by [`crate::VideoStore`] operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// No record exists for the video id
    #[error("Video not found: {0}")]
    NotFound(String),

    /// A record with the same id already exists
    #[error("Video already exists: {0}")]
    DuplicateId(String),

    /// Indexing was never submitted for the video
    #[error("Video {0} has not been submitted for indexing")]
    JobNotLinked(String),
}

/// Type alias for tracker results
pub type LifecycleResult<T> = Result<T, LifecycleError>;
