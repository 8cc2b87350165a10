//! Workflow error type

use common::error::CollaboratorError;
use lifecycle::LifecycleError;
use thiserror::Error;

/// Errors surfaced by video workflows
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VideoError {
    /// Unknown id, duplicate id or indexing never triggered
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// An external collaborator failed
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Type alias for workflow results
pub type VideoResult<T> = Result<T, VideoError>;
