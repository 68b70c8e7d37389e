use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The callback state was absent or did not match the pending attempt.
    #[error("Authorization state mismatch: {0}")]
    AuthState(String),

    #[error("Authorization code exchange failed: {0}")]
    Exchange(String),

    /// The persisted credential is missing fields or cannot be parsed.
    #[error("Stored credential is invalid: {0}")]
    InvalidToken(String),

    #[error("Credential expired and cannot be refreshed; sign in again")]
    ReauthRequired,

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session storage unavailable: {0}")]
    Storage(String),

    #[error("Authentication error: {0}")]
    Other(String),
}

impl AuthError {
    /// Whether the session's credentials must be discarded.
    ///
    /// Storage and internal failures leave the session untouched; every
    /// other kind means the stored credential can no longer be trusted.
    pub fn invalidates_session(&self) -> bool {
        !matches!(self, AuthError::Storage(_) | AuthError::Other(_))
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
