//! Remote hierarchy data model
//!
//! Read-only projections of provider entities. Nothing here is cached across
//! requests; every value is fetched fresh and dropped with the request.

use bridge_traits::storage::RemoteFile;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

/// Identifier of the provider's top-level container.
///
/// The root has no backing entity: it is never looked up, has an empty path
/// and always displays as [`ROOT_DISPLAY_NAME`].
pub const ROOT_FOLDER_ID: &str = "root";

pub const ROOT_DISPLAY_NAME: &str = "Root";

/// Placeholder shown when a folder name cannot be resolved
pub const UNKNOWN_FOLDER_NAME: &str = "Unknown Folder";

/// Placeholder used as a download filename when the name cannot be resolved
pub const UNKNOWN_FILE_NAME: &str = "Unknown File";

/// Format of [`RemoteEntity::modified_display`]
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn is_root(folder_id: &str) -> bool {
    folder_id == ROOT_FOLDER_ID
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Folder,
    File,
}

/// A file or folder in the remote hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntity {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub modified_at: Option<DateTime<Utc>>,
    /// Parent ids as reported; only the first is used
    pub parent_ids: Vec<String>,
}

impl RemoteEntity {
    pub fn is_folder(&self) -> bool {
        self.kind == EntityKind::Folder
    }

    pub fn first_parent(&self) -> Option<&str> {
        self.parent_ids.first().map(String::as_str)
    }

    /// Modification time rendered for listings, e.g. `2024-03-01 09:30:00`.
    pub fn modified_display(&self) -> Option<String> {
        self.modified_at
            .map(|at| at.format(DISPLAY_TIME_FORMAT).to_string())
    }
}

impl From<RemoteFile> for RemoteEntity {
    fn from(file: RemoteFile) -> Self {
        let kind = if file.is_folder {
            EntityKind::Folder
        } else {
            EntityKind::File
        };
        Self {
            id: file.id,
            name: file.name,
            kind,
            mime_type: file.mime_type,
            size: file.size,
            modified_at: file
                .modified_at
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            parent_ids: file.parent_ids,
        }
    }
}

/// One breadcrumb step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderPathSegment {
    pub id: String,
    pub name: String,
}

/// One page of a folder listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListingPage {
    pub entries: Vec<RemoteEntity>,
    /// Present when the provider has more children to return
    pub next_page_token: Option<String>,
}

/// Everything needed to render a folder: its name, breadcrumb and children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderView {
    pub folder_id: String,
    pub folder_name: String,
    pub path: Vec<FolderPathSegment>,
    pub children: Vec<RemoteEntity>,
    pub next_page_token: Option<String>,
}
