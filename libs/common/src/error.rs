//! Custom error types for the common library
//!
//! This module defines the error types shared by every crate that talks to
//! an external collaborator (object storage, video analysis, warehouse, edge).

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Failure talking to an external collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Credentials missing, network failure, timeout or a rejected request
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    /// The collaborator answered with something we could not interpret
    #[error("unexpected {service} response: {message}")]
    Parse {
        service: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            message: message.into(),
        }
    }

    pub fn parse(service: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            service,
            message: message.into(),
        }
    }

    /// Name of the collaborator that failed
    pub fn service(&self) -> &'static str {
        match self {
            Self::Unavailable { service, .. } | Self::Parse { service, .. } => service,
        }
    }
}

/// Type alias for Result with CollaboratorError
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_display() {
        let err = CollaboratorError::unavailable("storage", "bucket not configured");
        assert_eq!(err.to_string(), "storage unavailable: bucket not configured");
        assert_eq!(err.service(), "storage");

        let err = CollaboratorError::parse("analysis", "missing id");
        assert_eq!(err.to_string(), "unexpected analysis response: missing id");
    }
}
