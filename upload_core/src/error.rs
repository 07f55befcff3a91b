//! Application error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::files::{StorageError, UploadError, ValidationError};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Validation(e) => AppError::Validation(e),
            UploadError::Gateway { source, .. } | UploadError::Batch { source, .. } => {
                AppError::Storage(source)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Validation(err) => {
                let status = match err {
                    ValidationError::SizeExceeded { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    ValidationError::UnsupportedType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                };
                (status, err.to_string())
            }
            AppError::Storage(StorageError::NotFound(what)) => {
                (StatusCode::NOT_FOUND, format!("File not found: {}", what))
            }
            AppError::Storage(err @ StorageError::InvalidPath(_))
            | AppError::Storage(err @ StorageError::InvalidCursor(_)) => {
                (StatusCode::BAD_REQUEST, err.to_string())
            }
            AppError::Storage(err) => {
                tracing::error!("Storage error: {}", err);
                (StatusCode::BAD_GATEWAY, "Storage error".to_string())
            }
            AppError::IoError(err) => {
                tracing::error!("IO error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::Other(err) => {
                tracing::error!("Unexpected error: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                AppError::Validation(ValidationError::SizeExceeded { size: 2, max_size: 1 }),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                AppError::Validation(ValidationError::UnsupportedType {
                    mime_type: "text/html".to_string(),
                    allowed: vec![],
                }),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                AppError::Storage(StorageError::NotFound("x".to_string())),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Storage(StorageError::InvalidPath("../x".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Storage(StorageError::Unavailable("down".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
            (AppError::BadRequest("no file".to_string()), StatusCode::BAD_REQUEST),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_upload_error_conversion() {
        let err: AppError = UploadError::Batch {
            files: 3,
            source: StorageError::Unavailable("timeout".to_string()),
        }
        .into();
        assert!(matches!(err, AppError::Storage(StorageError::Unavailable(_))));
    }
}
