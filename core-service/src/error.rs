use core_auth::AuthError;
use core_drive::DriveError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Service initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Drive error: {0}")]
    Drive(#[from] DriveError),
}

impl ServiceError {
    /// Whether the caller must send the user through sign-in again.
    pub fn requires_login(&self) -> bool {
        matches!(self, ServiceError::Auth(e) if e.invalidates_session())
    }

    /// Whether the failure concerns an entity that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::Drive(e) if e.is_not_found())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
