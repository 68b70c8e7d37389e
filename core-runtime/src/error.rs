use std::path::PathBuf;
use thiserror::Error;

/// Startup failures. All of them are fatal: the server refuses to start
/// rather than run half-configured.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credentials file '{}': {message}", path.display())]
    Credentials { path: PathBuf, message: String },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
