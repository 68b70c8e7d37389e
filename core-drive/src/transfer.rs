//! File transfer operations
//!
//! Upload, download and delete of single entities. Failures are reported as
//! [`DriveError::Transfer`] and never retried here.

use crate::error::{DriveError, Result, TransferFailure};
use crate::models::{ROOT_FOLDER_ID, UNKNOWN_FILE_NAME};
use crate::staging::{guess_mime_type, sanitize_file_name, StagedUpload};
use bridge_traits::storage::StorageProvider;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct FileTransfer {
    provider: Arc<dyn StorageProvider>,
    /// Ceiling applied to uploads and downloads alike
    max_content_length: u64,
}

impl FileTransfer {
    pub fn new(provider: Arc<dyn StorageProvider>, max_content_length: u64) -> Self {
        Self {
            provider,
            max_content_length,
        }
    }

    pub fn max_content_length(&self) -> u64 {
        self.max_content_length
    }

    /// Create a file named `name` under `target_folder_id` and return its id.
    #[instrument(skip(self, content), fields(folder_id = %target_folder_id, bytes = content.len()))]
    pub async fn upload(&self, content: Bytes, target_folder_id: &str, name: &str) -> Result<String> {
        let name = sanitize_file_name(name).ok_or_else(|| {
            DriveError::transfer(TransferFailure::InvalidName, "no usable file name")
        })?;
        if content.len() as u64 > self.max_content_length {
            return Err(DriveError::transfer(
                TransferFailure::TooLarge,
                format!("upload exceeds {} bytes", self.max_content_length),
            ));
        }

        let id = self
            .provider
            .create_file(target_folder_id, &name, guess_mime_type(&name), content)
            .await
            .map_err(|e| DriveError::from_transfer(target_folder_id, e))?;

        info!(file_id = %id, "File uploaded");
        Ok(id)
    }

    /// Upload a staged file. The staging file is removed on return, whether
    /// the upload succeeded or not.
    pub async fn upload_staged(&self, mut staged: StagedUpload, target_folder_id: &str) -> Result<String> {
        let content = staged.read_contents().await?;
        let name = staged.name().to_string();
        self.upload(content, target_folder_id, &name).await
    }

    /// Full content of a file, held in memory.
    ///
    /// # Errors
    ///
    /// [`DriveError::Transfer`] when the entity is missing, is a folder,
    /// exceeds the size ceiling or the read fails.
    #[instrument(skip(self), fields(file_id = %entity_id))]
    pub async fn download(&self, entity_id: &str) -> Result<Bytes> {
        let file = self
            .provider
            .get_metadata(entity_id)
            .await
            .map_err(|e| DriveError::from_transfer(entity_id, e))?;

        if file.is_folder {
            return Err(DriveError::transfer(
                TransferFailure::IsFolder,
                format!("{} is a folder", entity_id),
            ));
        }
        if file.size.is_some_and(|size| size > self.max_content_length) {
            return Err(self.too_large());
        }

        let mut stream = self
            .provider
            .download(entity_id)
            .await
            .map_err(|e| DriveError::from_transfer(entity_id, e))?;

        // Reported size can be absent or stale; stop reading at the ceiling.
        let mut content = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                DriveError::transfer(TransferFailure::Interrupted, e.to_string())
            })?;
            if (content.len() + chunk.len()) as u64 > self.max_content_length {
                warn!(read = content.len(), "Download exceeded the size ceiling");
                return Err(self.too_large());
            }
            content.extend_from_slice(&chunk);
        }

        info!(bytes = content.len(), "File downloaded");
        Ok(content.freeze())
    }

    /// Filename to present for a download; degrades to "Unknown File".
    pub async fn resolve_entity_name(&self, entity_id: &str) -> String {
        match self.provider.get_metadata(entity_id).await {
            Ok(file) if !file.name.is_empty() => file.name,
            Ok(_) => UNKNOWN_FILE_NAME.to_string(),
            Err(e) => {
                warn!(file_id = %entity_id, error = %e, "File name lookup failed");
                UNKNOWN_FILE_NAME.to_string()
            }
        }
    }

    /// Permanently delete an entity. Deleting a missing id fails with
    /// [`TransferFailure::NotFound`].
    #[instrument(skip(self), fields(file_id = %entity_id))]
    pub async fn delete(&self, entity_id: &str) -> Result<()> {
        self.provider
            .delete(entity_id)
            .await
            .map_err(|e| DriveError::from_transfer(entity_id, e))?;

        info!("Entity deleted");
        Ok(())
    }

    /// First parent of an entity, or the root when it has none.
    pub async fn resolve_parent(&self, entity_id: &str) -> Result<String> {
        let file = self
            .provider
            .get_metadata(entity_id)
            .await
            .map_err(|e| DriveError::FileMetadata {
                entity_id: entity_id.to_string(),
                message: e.to_string(),
            })?;

        Ok(file
            .parent_ids
            .into_iter()
            .next()
            .unwrap_or_else(|| ROOT_FOLDER_ID.to_string()))
    }

    fn too_large(&self) -> DriveError {
        DriveError::transfer(
            TransferFailure::TooLarge,
            format!("file exceeds {} bytes", self.max_content_length),
        )
    }
}
