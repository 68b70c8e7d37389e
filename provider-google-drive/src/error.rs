//! Error types for Google Drive provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

use crate::types::ApiErrorResponse;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// The access token was rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The upload session could not be opened or completed
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl GoogleDriveError {
    /// Classify a non-success response.
    pub(crate) fn from_status(status: u16, body: &[u8], file_id: Option<&str>) -> Self {
        let message = error_message(body);
        match status {
            401 => GoogleDriveError::AuthenticationFailed(message),
            404 => match file_id {
                Some(id) => GoogleDriveError::FileNotFound {
                    file_id: id.to_string(),
                },
                None => GoogleDriveError::ApiError {
                    status_code: status,
                    message,
                },
            },
            _ => GoogleDriveError::ApiError {
                status_code: status,
                message,
            },
        }
    }
}

/// Message of the API error envelope, with its first reason when present;
/// the raw body otherwise.
fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ApiErrorResponse>(body) {
        Ok(ApiErrorResponse { error }) => match error.errors.first() {
            Some(first) if !first.reason.is_empty() => {
                format!("{} ({})", error.message, first.reason)
            }
            _ => error.message,
        },
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    }
}

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::FileNotFound { file_id } => BridgeError::NotFound(file_id),
            GoogleDriveError::ApiError {
                status_code: 404,
                message,
            } => BridgeError::NotFound(message),
            GoogleDriveError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
