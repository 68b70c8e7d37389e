//! Session document storage for desktop and server hosts

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SessionStore,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const ENTRY_EXTENSION: &str = "session";

/// Filesystem-backed session store
///
/// Every key is written to its own file inside a private directory. File
/// names are the URL-safe base64 encoding of the key, so arbitrary keys map
/// to valid names and can be listed back without an index.
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    /// Create a store rooted at `root`; the directory is created lazily
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let encoded = URL_SAFE_NO_PAD.encode(key.as_bytes());
        self.root.join(format!("{}.{}", encoded, ENTRY_EXTENSION))
    }

    fn decode_entry_name(path: &Path) -> Option<String> {
        if path.extension()?.to_str()? != ENTRY_EXTENSION {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let bytes = URL_SAFE_NO_PAD.decode(stem).ok()?;
        String::from_utf8(bytes).ok()
    }

    async fn ensure_root(&self) -> Result<()> {
        if !fs::try_exists(&self.root).await? {
            fs::create_dir_all(&self.root).await?;
            debug!(path = ?self.root, "Created session directory");
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.ensure_root().await?;
        let path = self.entry_path(key);
        let staging = path.with_extension("tmp");

        // Write then rename so readers never observe a torn document
        fs::write(&staging, value).await?;
        fs::rename(&staging, &path).await?;

        debug!(key = key, "Stored session entry");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.entry_path(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => {
                debug!(key = key, "Removed session entry");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        if !fs::try_exists(&self.root).await? {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            match Self::decode_entry_name(&entry.path()) {
                Some(key) => keys.push(key),
                None => warn!(path = ?entry.path(), "Ignoring unrecognized file in session directory"),
            }
        }
        Ok(keys)
    }

    async fn clear_all(&self) -> Result<()> {
        for key in self.list_keys().await? {
            self.remove(&key).await?;
        }
        Ok(())
    }
}

/// In-memory session store
///
/// Sessions vanish with the process. Used by tests and by hosts that do not
/// need sessions to survive a restart.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn clear_all(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}
