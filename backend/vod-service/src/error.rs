/// Error types for the VOD service
///
/// This module defines all error types that can occur in the pipeline.
/// Errors are converted to appropriate HTTP responses for API clients.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::fmt;

/// Result type for vod-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Encoder process failure classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The child process could not be launched
    Spawn(String),

    /// The wall-clock timeout elapsed and the process was killed
    Timeout,

    /// The process exited with a non-zero status
    Exit(i32),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::Spawn(msg) => write!(f, "encoder failed to start: {}", msg),
            EncodeError::Timeout => write!(f, "encoder timed out and was killed"),
            EncodeError::Exit(code) => write!(f, "encoder exited with code {}", code),
        }
    }
}

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Bad input, user-correctable
    Validation(String),

    /// Object storage unreachable or denied
    Storage(String),

    /// Encoder process failure
    Encode(EncodeError),

    /// Durable-write failure after retry exhaustion
    Persistence(String),

    /// Unknown id at a query surface
    NotFound(String),

    /// Database operation failed
    Database(String),

    /// Internal server error
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Encode(err) => write!(f, "Encode error: {}", err),
            AppError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::BAD_GATEWAY,
            AppError::Encode(_)
            | AppError::Persistence(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_type = match self {
            AppError::Validation(_) => "validation_error",
            AppError::Storage(_) => "storage_error",
            AppError::Encode(_) => "encode_error",
            AppError::Persistence(_) => "persistence_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::Database(_) | AppError::Internal(_) => "server_error",
        };

        HttpResponse::build(status).json(serde_json::json!({
            "error": error_type,
            "message": self.to_string(),
            "status": status.as_u16(),
        }))
    }
}

impl From<EncodeError> for AppError {
    fn from(err: EncodeError) -> Self {
        AppError::Encode(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("missing".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Encode(EncodeError::Timeout).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_encode_error_display() {
        assert_eq!(
            EncodeError::Exit(1).to_string(),
            "encoder exited with code 1"
        );
        assert_eq!(
            EncodeError::Timeout.to_string(),
            "encoder timed out and was killed"
        );
    }
}
