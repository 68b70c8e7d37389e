//! # Drive Module
//!
//! Navigation and file transfer over a user's remote hierarchy.
//!
//! ## Overview
//!
//! - [`RemoteHierarchy`] lists folders, resolves folder names and rebuilds
//!   breadcrumb paths from parent links.
//! - [`FileTransfer`] uploads, downloads and deletes single entities.
//! - [`StagedUpload`] holds uploaded content on local disk until it is sent.
//!
//! Both services sit on a [`StorageProvider`](bridge_traits::storage::StorageProvider)
//! that already carries the user's credentials.

pub mod error;
pub mod hierarchy;
pub mod models;
pub mod staging;
pub mod transfer;

pub use error::{DriveError, Result, TransferFailure};
pub use hierarchy::{RemoteHierarchy, MAX_PATH_DEPTH};
pub use models::{
    is_root, EntityKind, FolderPathSegment, FolderView, ListingPage, RemoteEntity,
    ROOT_DISPLAY_NAME, ROOT_FOLDER_ID, UNKNOWN_FILE_NAME, UNKNOWN_FOLDER_NAME,
};
pub use staging::{sanitize_file_name, StagedUpload};
pub use transfer::FileTransfer;
