//! # Google Drive Provider
//!
//! Implements `StorageProvider` trait for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Child listing of a folder, folders first then by name
//! - Metadata lookups for names and parent links
//! - Resumable uploads and whole-file downloads
//! - Permanent deletion
//! - Rate limiting and exponential backoff on reads

pub mod connector;
pub mod error;
pub mod types;

pub use connector::GoogleDriveConnector;
pub use error::{GoogleDriveError, Result};
pub use types::FOLDER_MIME_TYPE;
