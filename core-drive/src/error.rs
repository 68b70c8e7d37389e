use bridge_traits::error::BridgeError;
use std::fmt;
use thiserror::Error;

/// Why a transfer failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFailure {
    /// The entity does not exist (or no longer exists)
    NotFound,
    /// A folder was given where a file is required
    IsFolder,
    /// The content exceeds the configured ceiling
    TooLarge,
    /// The file name is empty or reduces to nothing after sanitizing
    InvalidName,
    /// The provider refused the operation
    Rejected,
    /// The transfer broke off or local staging failed
    Interrupted,
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TransferFailure::NotFound => "not found",
            TransferFailure::IsFolder => "is a folder",
            TransferFailure::TooLarge => "too large",
            TransferFailure::InvalidName => "invalid name",
            TransferFailure::Rejected => "rejected",
            TransferFailure::Interrupted => "interrupted",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug)]
pub enum DriveError {
    /// Listing a folder failed
    #[error("Failed to list folder {folder_id}: {message}")]
    Listing { folder_id: String, message: String },

    #[error("Folder operation failed for {folder_id}: {message}")]
    FolderOperation { folder_id: String, message: String },

    #[error("Failed to read metadata of {entity_id}: {message}")]
    FileMetadata { entity_id: String, message: String },

    #[error("Transfer failed ({kind}): {message}")]
    Transfer {
        kind: TransferFailure,
        message: String,
    },
}

impl DriveError {
    pub fn transfer(kind: TransferFailure, message: impl Into<String>) -> Self {
        DriveError::Transfer {
            kind,
            message: message.into(),
        }
    }

    /// Map a provider error raised during a transfer.
    pub(crate) fn from_transfer(entity_id: &str, error: BridgeError) -> Self {
        match error {
            BridgeError::NotFound(_) => {
                DriveError::transfer(TransferFailure::NotFound, format!("{} not found", entity_id))
            }
            BridgeError::Io(e) => DriveError::transfer(TransferFailure::Interrupted, e.to_string()),
            other => DriveError::transfer(TransferFailure::Rejected, other.to_string()),
        }
    }

    pub fn transfer_failure(&self) -> Option<TransferFailure> {
        match self {
            DriveError::Transfer { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.transfer_failure() == Some(TransferFailure::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, DriveError>;
