//! Custom error types for the API service

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lifecycle::LifecycleError;
use media::VideoError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad request with message
    #[error("{0}")]
    BadRequest(String),

    /// Malformed or oversized multipart body
    #[error(transparent)]
    Multipart(#[from] MultipartError),

    /// Failure from a video workflow
    #[error(transparent)]
    Video(#[from] VideoError),
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        ApiError::Video(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::Video(VideoError::Lifecycle(e)) => match e {
                LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
                LifecycleError::JobNotLinked(_) => StatusCode::BAD_REQUEST,
                LifecycleError::DuplicateId(_) => StatusCode::CONFLICT,
            },
            ApiError::Video(VideoError::Collaborator(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            ApiError::Multipart(e) => e.body_text(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            error!(error = %error_message, "Request failed");
        }

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use common::error::CollaboratorError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(LifecycleError::NotFound("v".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(LifecycleError::JobNotLinked("v".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LifecycleError::DuplicateId("v".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(VideoError::from(CollaboratorError::unavailable("analysis", "down"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::BadRequest("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_message_is_error_display() {
        let err = ApiError::from(LifecycleError::NotFound("abc".into()));
        assert_eq!(err.to_string(), "Video not found: abc");
    }
}
