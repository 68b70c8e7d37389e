//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP transport,
//! session storage, clock) into the credential and drive cores, and exposes
//! one session-scoped API to the HTTP layer. Desktop builds enable the
//! `desktop-shims` feature, which depends on `bridge-desktop` and the Google
//! Drive provider.

pub mod error;

pub use error::{Result, ServiceError};

use bridge_traits::{
    http::HttpClient,
    storage::{SessionStore, StorageProvider},
    time::Clock,
};
use bytes::Bytes;
use core_auth::{AuthState, AuthenticatedHandle, Authenticator, CredentialManager, SessionId, TokenStore};
use core_drive::{
    FileTransfer, FolderView, ListingPage, RemoteHierarchy, StagedUpload, ROOT_FOLDER_ID,
};
use core_runtime::config::AppConfig;
use core_runtime::events::{CoreEvent, DriveEvent, EventBus};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub session_store: Arc<dyn SessionStore>,
    pub clock: Arc<dyn Clock>,
    pub event_bus: EventBus,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        session_store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            http_client,
            session_store,
            clock,
            event_bus,
        }
    }

    /// Desktop bridges: reqwest transport plus file-backed sessions when
    /// `config.session_dir` is set, in-memory sessions otherwise.
    #[cfg(feature = "desktop-shims")]
    pub fn desktop(config: &AppConfig) -> Result<Self> {
        use bridge_desktop::{FileSessionStore, MemorySessionStore, ReqwestHttpClient};
        use bridge_traits::time::SystemClock;

        let http_client = ReqwestHttpClient::new()
            .map_err(|e| ServiceError::InitializationFailed(e.to_string()))?;
        let session_store: Arc<dyn SessionStore> = match &config.session_dir {
            Some(dir) => Arc::new(FileSessionStore::new(dir.clone())),
            None => Arc::new(MemorySessionStore::new()),
        };

        Ok(Self::new(
            Arc::new(http_client),
            session_store,
            Arc::new(SystemClock),
            EventBus::default(),
        ))
    }
}

/// Builds a storage provider bound to one user's credential.
pub trait ProviderFactory: Send + Sync {
    fn connect(&self, handle: &AuthenticatedHandle) -> Arc<dyn StorageProvider>;
}

/// Google Drive v3 over the shared HTTP client.
#[cfg(feature = "desktop-shims")]
pub struct GoogleDriveProviderFactory {
    http_client: Arc<dyn HttpClient>,
}

#[cfg(feature = "desktop-shims")]
impl GoogleDriveProviderFactory {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }
}

#[cfg(feature = "desktop-shims")]
impl ProviderFactory for GoogleDriveProviderFactory {
    fn connect(&self, handle: &AuthenticatedHandle) -> Arc<dyn StorageProvider> {
        Arc::new(provider_google_drive::GoogleDriveConnector::new(
            Arc::clone(&self.http_client),
            handle.access_token().to_string(),
        ))
    }
}

/// A downloaded file with the name it should be saved under.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub name: String,
    pub content: Bytes,
}

/// Primary façade exposed to the HTTP layer.
///
/// Every drive operation first obtains a valid credential for the session;
/// an authentication failure clears the session and surfaces as an error for
/// which [`ServiceError::requires_login`] is true.
#[derive(Clone)]
pub struct DriveService {
    config: Arc<AppConfig>,
    credentials: Arc<CredentialManager>,
    providers: Arc<dyn ProviderFactory>,
    event_bus: EventBus,
}

impl DriveService {
    pub fn new(
        config: AppConfig,
        deps: CoreDependencies,
        providers: Arc<dyn ProviderFactory>,
    ) -> Self {
        let authenticator = Authenticator::new(
            config.oauth.clone(),
            Arc::clone(&deps.http_client),
            deps.clock,
            config.token_expiry_skew,
        );
        let credentials = CredentialManager::new(
            authenticator,
            TokenStore::new(deps.session_store),
            deps.event_bus.clone(),
        );

        Self {
            config: Arc::new(config),
            credentials: Arc::new(credentials),
            providers,
            event_bus: deps.event_bus,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub async fn begin_login(&self, session_id: SessionId) -> Result<String> {
        Ok(self.credentials.begin_login(session_id).await?)
    }

    pub async fn complete_login(&self, session_id: SessionId, callback_url: &str) -> Result<()> {
        Ok(self
            .credentials
            .complete_login(session_id, callback_url)
            .await?)
    }

    pub async fn logout(&self, session_id: SessionId) -> Result<()> {
        Ok(self.credentials.logout(session_id).await?)
    }

    pub async fn auth_state(&self, session_id: SessionId) -> Result<AuthState> {
        Ok(self.credentials.state(session_id).await?)
    }

    /// Name, breadcrumb and first page of children of a folder.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn folder_view(&self, session_id: SessionId, folder_id: &str) -> Result<FolderView> {
        let hierarchy = self.hierarchy(session_id).await?;
        Ok(hierarchy
            .folder_view(folder_id, self.config.page_size)
            .await?)
    }

    /// A further page of children, continuing from `page_token`.
    pub async fn list_children_page(
        &self,
        session_id: SessionId,
        folder_id: &str,
        page_token: Option<String>,
    ) -> Result<ListingPage> {
        let hierarchy = self.hierarchy(session_id).await?;
        Ok(hierarchy
            .list_children_page(folder_id, self.config.page_size, page_token)
            .await?)
    }

    /// Open a staging file for an incoming upload.
    pub fn stage_upload(&self, original_name: &str) -> Result<StagedUpload> {
        Ok(StagedUpload::create_in(
            &self.config.upload_dir,
            original_name,
            self.config.max_content_length,
        )?)
    }

    /// Send a staged upload. The staging file is removed on every path,
    /// including when the session is not authenticated.
    #[instrument(skip(self, staged), fields(session_id = %session_id, folder_id = %folder_id))]
    pub async fn upload_staged(
        &self,
        session_id: SessionId,
        staged: StagedUpload,
        folder_id: &str,
    ) -> Result<String> {
        let name = staged.name().to_string();
        let bytes = staged.size();
        let transfer = self.transfer(session_id).await?;
        let file_id = transfer.upload_staged(staged, folder_id).await?;

        self.emit(DriveEvent::Uploaded {
            file_id: file_id.clone(),
            folder_id: folder_id.to_string(),
            name,
            bytes,
        });
        Ok(file_id)
    }

    pub async fn upload(
        &self,
        session_id: SessionId,
        content: Bytes,
        folder_id: &str,
        name: &str,
    ) -> Result<String> {
        let bytes = content.len() as u64;
        let transfer = self.transfer(session_id).await?;
        let file_id = transfer.upload(content, folder_id, name).await?;

        self.emit(DriveEvent::Uploaded {
            file_id: file_id.clone(),
            folder_id: folder_id.to_string(),
            name: name.to_string(),
            bytes,
        });
        Ok(file_id)
    }

    /// Content of a file together with its display name.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn download(&self, session_id: SessionId, file_id: &str) -> Result<DownloadedFile> {
        let transfer = self.transfer(session_id).await?;
        let content = transfer.download(file_id).await?;
        let name = transfer.resolve_entity_name(file_id).await;

        self.emit(DriveEvent::Downloaded {
            file_id: file_id.to_string(),
            bytes: content.len() as u64,
        });
        Ok(DownloadedFile { name, content })
    }

    /// Delete an entity and return the folder it was in.
    ///
    /// When the parent cannot be read the root is returned, so the caller
    /// always has somewhere to go back to.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn delete(&self, session_id: SessionId, file_id: &str) -> Result<String> {
        let transfer = self.transfer(session_id).await?;
        let parent_id = match transfer.resolve_parent(file_id).await {
            Ok(parent_id) => parent_id,
            Err(e) => {
                warn!(error = %e, "Parent lookup failed before delete");
                ROOT_FOLDER_ID.to_string()
            }
        };
        transfer.delete(file_id).await?;

        self.emit(DriveEvent::Deleted {
            file_id: file_id.to_string(),
            parent_id: parent_id.clone(),
        });
        Ok(parent_id)
    }

    async fn provider(&self, session_id: SessionId) -> Result<Arc<dyn StorageProvider>> {
        let handle = self.credentials.authenticated_handle(session_id).await?;
        Ok(self.providers.connect(&handle))
    }

    async fn hierarchy(&self, session_id: SessionId) -> Result<RemoteHierarchy> {
        Ok(RemoteHierarchy::new(self.provider(session_id).await?))
    }

    async fn transfer(&self, session_id: SessionId) -> Result<FileTransfer> {
        Ok(FileTransfer::new(
            self.provider(session_id).await?,
            self.config.max_content_length,
        ))
    }

    fn emit(&self, event: DriveEvent) {
        let _ = self.event_bus.emit(CoreEvent::Drive(event));
    }
}

/// Build a [`DriveService`] on the desktop bridges and Google Drive.
///
/// ```no_run
/// # fn example(config: core_runtime::config::AppConfig) -> core_service::Result<()> {
/// let service = core_service::bootstrap_desktop(config)?;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(config: AppConfig) -> Result<DriveService> {
    let deps = CoreDependencies::desktop(&config)?;
    let providers = Arc::new(GoogleDriveProviderFactory::new(Arc::clone(&deps.http_client)));
    Ok(DriveService::new(config, deps, providers))
}
