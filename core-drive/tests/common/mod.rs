//! In-memory storage provider used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::http::ByteStream;
use bridge_traits::storage::{RemoteFile, StorageProvider};
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Downloads are served in chunks of this many bytes.
pub const CHUNK_SIZE: usize = 4;

#[derive(Default)]
pub struct InMemoryDrive {
    entries: Mutex<Vec<(RemoteFile, Bytes)>>,
    failing_lookups: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    pub metadata_calls: AtomicUsize,
    /// Download chunks handed to readers so far
    pub chunks_served: Arc<AtomicUsize>,
}

impl InMemoryDrive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_folder(&self, id: &str, name: &str, parents: &[&str]) {
        self.insert(id, name, parents, true, Bytes::new());
    }

    pub fn add_file(&self, id: &str, name: &str, parents: &[&str], content: &[u8]) {
        self.insert(id, name, parents, false, Bytes::copy_from_slice(content));
    }

    /// A file whose metadata carries no size.
    pub fn add_unsized_file(&self, id: &str, name: &str, parents: &[&str], content: &[u8]) {
        self.add_file(id, name, parents, content);
        let mut entries = self.entries.lock().unwrap();
        if let Some((file, _)) = entries.iter_mut().find(|(f, _)| f.id == id) {
            file.size = None;
        }
    }

    pub fn add_trashed_file(&self, id: &str, name: &str, parents: &[&str]) {
        self.insert(id, name, parents, false, Bytes::new());
        let mut entries = self.entries.lock().unwrap();
        if let Some((file, _)) = entries.iter_mut().find(|(f, _)| f.id == id) {
            file.trashed = true;
        }
    }

    /// Make metadata lookups for `id` fail with a transport error.
    pub fn fail_lookups_for(&self, id: &str) {
        self.failing_lookups.lock().unwrap().push(id.to_string());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().unwrap().iter().any(|(f, _)| f.id == id)
    }

    fn insert(&self, id: &str, name: &str, parents: &[&str], is_folder: bool, content: Bytes) {
        let file = RemoteFile {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: None,
            size: Some(content.len() as u64),
            modified_at: Some(1_709_285_400),
            is_folder,
            parent_ids: parents.iter().map(|p| p.to_string()).collect(),
            trashed: false,
        };
        self.entries.lock().unwrap().push((file, content));
    }
}

#[async_trait]
impl StorageProvider for InMemoryDrive {
    async fn list_children(
        &self,
        parent_id: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> Result<(Vec<RemoteFile>, Option<String>)> {
        let entries = self.entries.lock().unwrap();
        let children: Vec<RemoteFile> = entries
            .iter()
            .filter(|(f, _)| f.parent_ids.first().map(String::as_str) == Some(parent_id))
            .map(|(f, _)| f.clone())
            .collect();

        let offset: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (offset + page_size as usize).min(children.len());
        let next = (end < children.len()).then(|| end.to_string());

        Ok((children[offset.min(end)..end].to_vec(), next))
    }

    async fn get_metadata(&self, file_id: &str) -> Result<RemoteFile> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_lookups
            .lock()
            .unwrap()
            .iter()
            .any(|id| id == file_id)
        {
            return Err(BridgeError::OperationFailed("backend error".to_string()));
        }
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|(f, _)| f.id == file_id)
            .map(|(f, _)| f.clone())
            .ok_or_else(|| BridgeError::NotFound(file_id.to_string()))
    }

    async fn create_file(
        &self,
        parent_id: &str,
        name: &str,
        _mime_type: Option<&str>,
        content: Bytes,
    ) -> Result<String> {
        let id = format!("created-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.insert(&id, name, &[parent_id], false, content);
        Ok(id)
    }

    async fn download(&self, file_id: &str) -> Result<ByteStream> {
        let content = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .find(|(f, _)| f.id == file_id)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| BridgeError::NotFound(file_id.to_string()))?;

        let chunks: Vec<Bytes> = content
            .chunks(CHUNK_SIZE)
            .map(Bytes::copy_from_slice)
            .collect();
        let served = self.chunks_served.clone();
        Ok(stream::iter(chunks)
            .map(move |chunk| {
                served.fetch_add(1, Ordering::SeqCst);
                Ok(chunk)
            })
            .boxed())
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|(f, _)| f.id != file_id);
        if entries.len() == before {
            return Err(BridgeError::NotFound(file_id.to_string()));
        }
        Ok(())
    }
}

pub fn names(entities: &[core_drive::RemoteEntity]) -> Vec<&str> {
    entities.iter().map(|e| e.name.as_str()).collect()
}
