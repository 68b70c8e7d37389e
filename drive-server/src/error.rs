use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use core_drive::{DriveError, TransferFailure};
use core_service::ServiceError;
use serde_json::json;
use std::fmt;
use tracing::{error, warn};

/// Request-level failure.
#[derive(Debug)]
pub enum AppError {
    /// No usable session; the browser is sent to sign-in.
    LoginRequired,
    /// Malformed request (missing form field, unreadable multipart body)
    BadRequest(String),
    Service(ServiceError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoginRequired => write!(f, "Sign-in required"),
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::Service(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for AppError {}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        if err.requires_login() {
            warn!(error = %err, "Session invalidated");
            Self::LoginRequired
        } else {
            Self::Service(err)
        }
    }
}

impl From<DriveError> for AppError {
    fn from(err: DriveError) -> Self {
        Self::Service(ServiceError::Drive(err))
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            Self::LoginRequired => return Redirect::to("/login").into_response(),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Service(err) => service_status(err),
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": kind,
            }
        }));
        (status, body).into_response()
    }
}

fn service_status(err: &ServiceError) -> (StatusCode, &'static str) {
    match err {
        ServiceError::Drive(DriveError::Transfer { kind, .. }) => match kind {
            TransferFailure::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            TransferFailure::IsFolder => (StatusCode::BAD_REQUEST, "is_folder"),
            TransferFailure::TooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "too_large"),
            TransferFailure::InvalidName => (StatusCode::BAD_REQUEST, "invalid_name"),
            TransferFailure::Rejected => (StatusCode::BAD_GATEWAY, "transfer_rejected"),
            TransferFailure::Interrupted => (StatusCode::BAD_GATEWAY, "transfer_interrupted"),
        },
        ServiceError::Drive(_) => (StatusCode::BAD_GATEWAY, "drive_error"),
        ServiceError::Auth(_) => (StatusCode::INTERNAL_SERVER_ERROR, "auth_error"),
        ServiceError::InitializationFailed(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use core_auth::AuthError;

    #[test]
    fn test_auth_failure_redirects_to_login() {
        let err = AppError::from(ServiceError::from(AuthError::ReauthRequired));
        let response = err.into_response();

        assert!(response.status().is_redirection());
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }

    #[test]
    fn test_storage_failure_is_server_error() {
        let err = AppError::from(ServiceError::from(AuthError::Storage("disk".into())));

        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_transfer_failures_map_to_status() {
        let cases = [
            (TransferFailure::NotFound, StatusCode::NOT_FOUND),
            (TransferFailure::IsFolder, StatusCode::BAD_REQUEST),
            (TransferFailure::TooLarge, StatusCode::PAYLOAD_TOO_LARGE),
            (TransferFailure::Rejected, StatusCode::BAD_GATEWAY),
        ];
        for (kind, status) in cases {
            let err = AppError::from(DriveError::transfer(kind, "x"));
            assert_eq!(err.into_response().status(), status);
        }
    }
}
