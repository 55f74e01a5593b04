//! Error types and handling
//!
//! Component errors are aggregated into [`AppError`]; [`ErrorResponse`] is what
//! a user interface shows. Details go to the log, not to the user.

use crate::api::ApiError;
use crate::recorder::{RecordingError, UploadError};
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Analysis API error: {0}")]
    Api(#[from] ApiError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Config(format!("{error:#}"))
    }
}

/// Error response for the user interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        match error {
            AppError::Io(_) => Self::new("IO_ERROR", "A local file could not be read or written."),
            AppError::Serialization(_) => {
                Self::new("SERIALIZATION_ERROR", "Received data in an unexpected format.")
            }
            AppError::Recording(err) if err.is_permission_denied() => {
                Self::new("PERMISSION_DENIED", err.user_message())
            }
            AppError::Recording(err) => Self::new("RECORDING_ERROR", err.user_message()),
            AppError::Store(StoreError::NotFound { .. }) => {
                Self::new("NOT_FOUND", "The requested item could not be found.")
            }
            AppError::Store(StoreError::Validation(message)) => {
                Self::new("VALIDATION_ERROR", message.clone())
            }
            AppError::Store(StoreError::Ambiguous { .. }) => Self::new(
                "CONFLICT",
                "More than one matching item was found. Please resolve the duplicates first.",
            ),
            AppError::Store(_) => {
                Self::new("STORE_ERROR", "Could not reach the database. Please try again.")
            }
            AppError::Api(ApiError::Validation(message)) => {
                Self::new("VALIDATION_ERROR", message.clone())
            }
            AppError::Api(ApiError::Remote(message)) => Self::new("API_ERROR", message.clone()),
            AppError::Api(_) => {
                Self::new("API_ERROR", "The analysis service is unavailable. Please try again.")
            }
            AppError::Upload(_) => {
                Self::new("UPLOAD_ERROR", "The recording could not be uploaded.")
            }
            AppError::Config(_) => {
                Self::new("CONFIG_ERROR", "The application is not configured correctly.")
            }
        }
    }
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        tracing::error!("{}", error);
        Self::from(&error)
    }
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Table;

    #[test]
    fn test_validation_message_is_shown() {
        let error = AppError::from(StoreError::Validation(
            "Interview percentages must sum to 100, got 90".into(),
        ));
        let response = ErrorResponse::from(error);
        assert_eq!(response.code, "VALIDATION_ERROR");
        assert_eq!(response.message, "Interview percentages must sum to 100, got 90");
    }

    #[test]
    fn test_not_found_hides_details() {
        let error = AppError::from(StoreError::NotFound {
            table: Table::JobPosts,
            key: "id=42".into(),
        });
        let response = ErrorResponse::from(&error);
        assert_eq!(response.code, "NOT_FOUND");
        assert!(!response.message.contains("job_posts"));
    }

    #[test]
    fn test_recording_permission_code() {
        let error = AppError::from(RecordingError::PermissionDenied("screen".into()));
        assert_eq!(ErrorResponse::from(error).code, "PERMISSION_DENIED");
    }

    #[test]
    fn test_config_error_from_anyhow() {
        let error = AppError::from(anyhow::anyhow!("store url is not set"));
        assert!(matches!(error, AppError::Config(ref m) if m == "store url is not set"));
    }
}
