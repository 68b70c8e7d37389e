//! Storage Abstractions
//!
//! Provides platform-agnostic traits for per-session document persistence
//! and for the remote file hierarchy backend.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http::ByteStream;

/// Session document storage trait
///
/// Persists small structured documents (serialized credentials, pending
/// authorization state) keyed by an opaque string. Each browser session owns
/// its own keys; implementations never share values across keys.
///
/// # Security Requirements
///
/// Implementations MUST:
/// - Never log or expose stored values
/// - Make `remove` idempotent (removing an absent key is not an error)
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SessionStore;
///
/// async fn store_token(store: &dyn SessionStore, doc: &[u8]) -> Result<()> {
///     store.put("session:1234:tokens", doc).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a value, replacing any previous value for the key
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a value
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a value
    async fn remove(&self, key: &str) -> Result<()>;

    /// Check if a key exists without retrieving it
    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// List all stored keys (without values)
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all values
    ///
    /// Use with caution! This drops every session.
    async fn clear_all(&self) -> Result<()>;
}

/// Remote file or folder as reported by a storage provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Provider-assigned identifier, opaque and globally unique
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    /// Last modification as a Unix timestamp in seconds
    pub modified_at: Option<i64>,
    pub is_folder: bool,
    /// Parent folder ids; only the first is meaningful to callers
    pub parent_ids: Vec<String>,
    /// Soft-deleted entries may still be reported by some queries
    pub trashed: bool,
}

/// Remote storage backend trait
///
/// A single hierarchical namespace addressed by opaque ids, where each entry
/// points at its parents. The literal id `"root"` addresses the top-level
/// container in every call that takes a parent id.
///
/// Implementations must report a missing entity as
/// [`BridgeError::NotFound`](crate::error::BridgeError::NotFound) so callers
/// can tell "gone" apart from "failed".
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::StorageProvider;
///
/// async fn count_children(provider: &dyn StorageProvider) -> Result<usize> {
///     let (files, _next) = provider.list_children("root", 50, None).await?;
///     Ok(files.len())
/// }
/// ```
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// List one page of direct children of `parent_id`
    ///
    /// Returns the entries of the page and a continuation token when more
    /// pages exist. Implementations should exclude trashed entries and order
    /// folders before files, then by name.
    async fn list_children(
        &self,
        parent_id: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> Result<(Vec<RemoteFile>, Option<String>)>;

    /// Fetch metadata for a single entity
    async fn get_metadata(&self, file_id: &str) -> Result<RemoteFile>;

    /// Create a new file under `parent_id` and return its id
    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        mime_type: Option<&str>,
        content: Bytes,
    ) -> Result<String>;

    /// Stream the content of a file
    ///
    /// The caller decides how much of the stream to read.
    async fn download(&self, file_id: &str) -> Result<ByteStream>;

    /// Permanently delete an entity
    async fn delete(&self, file_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_file_round_trips_through_json() {
        let file = RemoteFile {
            id: "file123".to_string(),
            name: "report.pdf".to_string(),
            mime_type: Some("application/pdf".to_string()),
            size: Some(2048),
            modified_at: Some(1_700_000_000),
            is_folder: false,
            parent_ids: vec!["root".to_string()],
            trashed: false,
        };

        let json = serde_json::to_string(&file).unwrap();
        let back: RemoteFile = serde_json::from_str(&json).unwrap();

        assert_eq!(back, file);
    }
}
