//! Local staging of uploaded content
//!
//! A [`StagedUpload`] owns a temporary file in the upload directory. The file
//! is deleted when the value is dropped, whichever way the upload ends.

use crate::error::{DriveError, Result, TransferFailure};
use bytes::Bytes;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Temporary on-disk copy of an uploaded file.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
    name: String,
    size: u64,
    limit: u64,
}

impl StagedUpload {
    /// Create an empty staging file in `dir` for a file called `original_name`.
    ///
    /// The directory is created when missing. Fails with
    /// [`TransferFailure::InvalidName`] when the name sanitizes to nothing.
    pub fn create_in(dir: &Path, original_name: &str, limit: u64) -> Result<Self> {
        let name = sanitize_file_name(original_name).ok_or_else(|| {
            DriveError::transfer(TransferFailure::InvalidName, "no usable file name")
        })?;

        std::fs::create_dir_all(dir).map_err(staging_error)?;
        let file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(staging_error)?;

        debug!(path = %file.path().display(), "Staging upload");
        Ok(Self {
            file,
            name,
            size: 0,
            limit,
        })
    }

    /// Append a chunk of content.
    ///
    /// Fails with [`TransferFailure::TooLarge`] once the total would exceed
    /// the limit; nothing past the limit is written.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let size = self.size + chunk.len() as u64;
        if size > self.limit {
            return Err(DriveError::transfer(
                TransferFailure::TooLarge,
                format!("upload exceeds {} bytes", self.limit),
            ));
        }
        self.file.write_all(chunk).map_err(staging_error)?;
        self.size = size;
        Ok(())
    }

    /// Sanitized name the file will be created under
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn read_contents(&mut self) -> Result<Bytes> {
        self.file.flush().map_err(staging_error)?;
        let contents = tokio::fs::read(self.file.path())
            .await
            .map_err(staging_error)?;
        Ok(Bytes::from(contents))
    }
}

fn staging_error(e: std::io::Error) -> DriveError {
    DriveError::transfer(
        TransferFailure::Interrupted,
        format!("local staging failed: {}", e),
    )
}

/// Reduce a client-supplied file name to a safe base name.
///
/// Directory components and control characters are dropped. Returns `None`
/// for names that end up empty, `.` or `..`.
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(raw);
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    match cleaned {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// Content type inferred from a file extension.
pub fn guess_mime_type(name: &str) -> Option<&'static str> {
    mime_guess::from_path(name).first_raw()
}
