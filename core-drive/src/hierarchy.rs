//! Remote hierarchy navigation
//!
//! Listing, name lookup and breadcrumb reconstruction over a flat graph of
//! entities that only know their parents.

use crate::error::{DriveError, Result};
use crate::models::{
    is_root, FolderPathSegment, FolderView, ListingPage, RemoteEntity, ROOT_DISPLAY_NAME,
    UNKNOWN_FOLDER_NAME,
};
use bridge_traits::storage::StorageProvider;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Upper bound on breadcrumb depth; deeper chains are truncated.
pub const MAX_PATH_DEPTH: usize = 64;

/// Read-only navigation over one user's remote hierarchy.
#[derive(Clone)]
pub struct RemoteHierarchy {
    provider: Arc<dyn StorageProvider>,
}

impl RemoteHierarchy {
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    /// Direct children of `folder_id`, first page only.
    pub async fn list_children(&self, folder_id: &str, page_size: u32) -> Result<Vec<RemoteEntity>> {
        Ok(self
            .list_children_page(folder_id, page_size, None)
            .await?
            .entries)
    }

    /// One page of direct children.
    ///
    /// Trashed entries are dropped and the page is ordered folders first, then
    /// by name, regardless of the order the provider returned.
    #[instrument(skip(self, page_token), fields(folder_id = %folder_id))]
    pub async fn list_children_page(
        &self,
        folder_id: &str,
        page_size: u32,
        page_token: Option<String>,
    ) -> Result<ListingPage> {
        let (files, next_page_token) = self
            .provider
            .list_children(folder_id, page_size, page_token)
            .await
            .map_err(|e| DriveError::Listing {
                folder_id: folder_id.to_string(),
                message: e.to_string(),
            })?;

        let mut entries: Vec<RemoteEntity> = files
            .into_iter()
            .filter(|file| !file.trashed)
            .map(RemoteEntity::from)
            .collect();
        entries.sort_by(listing_order);

        debug!(count = entries.len(), "Listed folder");
        Ok(ListingPage {
            entries,
            next_page_token,
        })
    }

    /// Display name of a folder.
    ///
    /// Never fails: the root is always "Root" and a failed lookup degrades to
    /// "Unknown Folder".
    pub async fn resolve_name(&self, folder_id: &str) -> String {
        if is_root(folder_id) {
            return ROOT_DISPLAY_NAME.to_string();
        }
        match self.try_resolve_name(folder_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!(folder_id = %folder_id, error = %e, "Folder name lookup failed");
                UNKNOWN_FOLDER_NAME.to_string()
            }
        }
    }

    /// Strict variant of [`resolve_name`](Self::resolve_name).
    pub async fn try_resolve_name(&self, folder_id: &str) -> Result<String> {
        if is_root(folder_id) {
            return Ok(ROOT_DISPLAY_NAME.to_string());
        }
        let file = self
            .provider
            .get_metadata(folder_id)
            .await
            .map_err(|e| DriveError::FolderOperation {
                folder_id: folder_id.to_string(),
                message: e.to_string(),
            })?;
        if file.name.is_empty() {
            return Ok(UNKNOWN_FOLDER_NAME.to_string());
        }
        Ok(file.name)
    }

    /// Breadcrumb from below the root down to `folder_id` inclusive.
    ///
    /// Follows the first parent of each entity. The walk stops without error
    /// when it reaches the root, an entity without parents, a failed lookup,
    /// an id already visited, or [`MAX_PATH_DEPTH`] steps; whatever was
    /// gathered so far is returned in root-to-leaf order.
    #[instrument(skip(self), fields(folder_id = %folder_id))]
    pub async fn resolve_path(&self, folder_id: &str) -> Vec<FolderPathSegment> {
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut current = folder_id.to_string();

        while !is_root(&current) {
            if path.len() >= MAX_PATH_DEPTH {
                warn!(depth = path.len(), "Folder path truncated at depth limit");
                break;
            }
            if !visited.insert(current.clone()) {
                warn!(entity_id = %current, "Cycle in parent chain");
                break;
            }

            let file = match self.provider.get_metadata(&current).await {
                Ok(file) => file,
                Err(e) => {
                    warn!(entity_id = %current, error = %e, "Parent lookup failed");
                    break;
                }
            };

            let next = file.parent_ids.first().cloned();
            path.push(FolderPathSegment {
                id: file.id,
                name: file.name,
            });

            match next {
                Some(parent) => current = parent,
                None => {
                    debug!("Parent chain ends before root");
                    break;
                }
            }
        }

        path.reverse();
        path
    }

    /// Name, breadcrumb and first page of children of a folder.
    ///
    /// The name comes from the last breadcrumb segment when it describes the
    /// folder itself, so both are read from the same lookup.
    pub async fn folder_view(&self, folder_id: &str, page_size: u32) -> Result<FolderView> {
        let path = self.resolve_path(folder_id).await;
        let folder_name = match path.last() {
            Some(segment) if segment.id == folder_id => segment.name.clone(),
            _ => self.resolve_name(folder_id).await,
        };
        let page = self.list_children_page(folder_id, page_size, None).await?;

        Ok(FolderView {
            folder_id: folder_id.to_string(),
            folder_name,
            path,
            children: page.entries,
            next_page_token: page.next_page_token,
        })
    }
}

/// Folders before files, then by name ignoring case, as Drive's
/// `orderBy=folder,name` sorts. Names equal under case folding keep the
/// provider's relative order.
fn listing_order(a: &RemoteEntity, b: &RemoteEntity) -> Ordering {
    b.is_folder().cmp(&a.is_folder()).then_with(|| {
        a.name
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(b.name.chars().flat_map(char::to_lowercase))
    })
}
