//! # Application Configuration
//!
//! Provides the startup configuration for the drive manager.
//!
//! ## Overview
//!
//! Configuration is assembled with [`AppConfigBuilder`] and validated once,
//! when [`AppConfigBuilder::build`] runs. Any problem is startup-fatal: the
//! builder returns [`Error::Config`] with an actionable message and no
//! authenticator is ever constructed from a partial configuration.
//!
//! OAuth client settings usually come from the `credentials.json` file that
//! the Google Cloud console issues for a web application. Its `web` section
//! supplies the client id, client secret and first redirect URI. Each of
//! those can be overridden through the environment:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `GOOGLE_CLIENT_ID` | `web.client_id` |
//! | `GOOGLE_CLIENT_SECRET` | `web.client_secret` |
//! | `GOOGLE_REDIRECT_URI` | `web.redirect_uris[0]` |
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::AppConfig;
//!
//! let config = AppConfig::builder()
//!     .load_credentials_file("credentials.json")?
//!     .apply_env_overrides()
//!     .upload_dir("temp")
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Google consent endpoint
pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";

/// Google token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scopes requested when none are configured
pub const DEFAULT_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/drive.metadata.readonly",
    "https://www.googleapis.com/auth/drive.file",
];

/// Ceiling on a single upload or download, in bytes (16 MiB)
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 16 * 1024 * 1024;

/// Children fetched per listing request
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Tokens expiring within this window are treated as expired
pub const DEFAULT_TOKEN_EXPIRY_SKEW: Duration = Duration::from_secs(60);

const MAX_CONTENT_LENGTH_LIMIT: u64 = 1024 * 1024 * 1024;
const MAX_PAGE_SIZE: u32 = 1000;
const CLIENT_ID_SUFFIX: &str = ".apps.googleusercontent.com";
const MIN_CLIENT_SECRET_LEN: usize = 8;

/// OAuth2 client registration used by the authenticator.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

impl OAuthClientConfig {
    /// Validates the client registration.
    ///
    /// This checks:
    /// - Client id is present and issued by Google
    /// - Client secret is present and plausibly sized
    /// - Redirect URI is an absolute http(s) URL
    /// - At least one scope is requested
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config(
                "OAuth client id is required. Set web.client_id in credentials.json \
                 or the GOOGLE_CLIENT_ID environment variable."
                    .to_string(),
            ));
        }

        if !self.client_id.ends_with(CLIENT_ID_SUFFIX) {
            return Err(Error::Config(format!(
                "OAuth client id must end with '{}'",
                CLIENT_ID_SUFFIX
            )));
        }

        if self.client_secret.trim().is_empty() {
            return Err(Error::Config(
                "OAuth client secret is required. Set web.client_secret in credentials.json \
                 or the GOOGLE_CLIENT_SECRET environment variable."
                    .to_string(),
            ));
        }

        if self.client_secret.len() < MIN_CLIENT_SECRET_LEN {
            return Err(Error::Config(format!(
                "OAuth client secret must be at least {} characters",
                MIN_CLIENT_SECRET_LEN
            )));
        }

        if !is_http_url(&self.redirect_uri) {
            return Err(Error::Config(
                "Redirect URI is required and must start with http:// or https://".to_string(),
            ));
        }

        if self.scopes.iter().all(|scope| scope.trim().is_empty()) {
            return Err(Error::Config(
                "At least one OAuth scope must be requested".to_string(),
            ));
        }

        if !is_http_url(&self.auth_url) || !is_http_url(&self.token_url) {
            return Err(Error::Config(
                "Authorization and token endpoints must be http(s) URLs".to_string(),
            ));
        }

        Ok(())
    }
}

/// Complete application configuration.
///
/// Use [`AppConfig::builder`] to construct instances.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub oauth: OAuthClientConfig,

    /// Directory where incoming uploads are staged before transfer
    pub upload_dir: PathBuf,

    /// Directory for persisted sessions; `None` keeps sessions in memory
    pub session_dir: Option<PathBuf>,

    /// Size ceiling shared by uploads and downloads, in bytes
    pub max_content_length: u64,

    /// Children fetched per listing request
    pub page_size: u32,

    /// Safety margin applied to token expiry checks
    pub token_expiry_skew: Duration,

    /// Address the HTTP layer listens on
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    /// Creates a new builder for constructing an `AppConfig`.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.oauth.validate()?;

        if self.upload_dir.as_os_str().is_empty() {
            return Err(Error::Config("Upload directory cannot be empty".to_string()));
        }

        if self.max_content_length == 0 {
            return Err(Error::Config(
                "Maximum content length must be greater than 0 bytes".to_string(),
            ));
        }

        if self.max_content_length > MAX_CONTENT_LENGTH_LIMIT {
            return Err(Error::Config(
                "Maximum content length exceeds the 1 GiB limit".to_string(),
            ));
        }

        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Page size must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(())
    }
}

/// Shape of the `credentials.json` file issued for a web OAuth client.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    web: WebCredentials,
}

#[derive(Debug, Deserialize)]
struct WebCredentials {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
    #[serde(default)]
    auth_uri: Option<String>,
    #[serde(default)]
    token_uri: Option<String>,
}

/// Builder for [`AppConfig`].
#[derive(Debug, Default, Clone)]
pub struct AppConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    scopes: Option<Vec<String>>,
    auth_url: Option<String>,
    token_url: Option<String>,
    upload_dir: Option<PathBuf>,
    session_dir: Option<PathBuf>,
    max_content_length: Option<u64>,
    page_size: Option<u32>,
    token_expiry_skew: Option<Duration>,
    bind_addr: Option<SocketAddr>,
}

impl AppConfigBuilder {
    /// Reads OAuth client settings from a `credentials.json` file.
    ///
    /// Values already set on the builder are replaced.
    pub fn load_credentials_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Credentials {
            path: path.to_path_buf(),
            message: format!(
                "{}. Download it from the Google Cloud console (OAuth client of type \
                 'Web application').",
                e
            ),
        })?;
        self.credentials_json(&raw)
    }

    /// Reads OAuth client settings from the contents of a `credentials.json` file.
    pub fn credentials_json(mut self, raw: &str) -> Result<Self> {
        let file: CredentialsFile = serde_json::from_str(raw).map_err(|e| {
            Error::Config(format!(
                "Invalid credentials file: {}. Expected a 'web' section with \
                 client_id, client_secret and redirect_uris.",
                e
            ))
        })?;

        let web = file.web;
        self.client_id = Some(web.client_id);
        self.client_secret = Some(web.client_secret);
        if let Some(first) = web.redirect_uris.into_iter().next() {
            self.redirect_uri = Some(first);
        }
        if let Some(auth_uri) = web.auth_uri {
            self.auth_url = Some(auth_uri);
        }
        if let Some(token_uri) = web.token_uri {
            self.token_url = Some(token_uri);
        }
        Ok(self)
    }

    /// Applies `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET` and
    /// `GOOGLE_REDIRECT_URI` from the process environment.
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary variable source.
    pub fn apply_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = non_empty("GOOGLE_CLIENT_ID") {
            self.client_id = Some(value);
        }
        if let Some(value) = non_empty("GOOGLE_CLIENT_SECRET") {
            self.client_secret = Some(value);
        }
        if let Some(value) = non_empty("GOOGLE_REDIRECT_URI") {
            self.redirect_uri = Some(value);
        }
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = Some(scopes.into_iter().map(Into::into).collect());
        self
    }

    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = Some(url.into());
        self
    }

    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Sets the staging directory for uploads (default: `temp`).
    pub fn upload_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.upload_dir = Some(path.into());
        self
    }

    /// Persists sessions as files under `path` instead of in memory.
    pub fn session_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.session_dir = Some(path.into());
        self
    }

    /// Sets the shared upload/download ceiling in bytes (default: 16 MiB).
    pub fn max_content_length(mut self, bytes: u64) -> Self {
        self.max_content_length = Some(bytes);
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn token_expiry_skew(mut self, skew: Duration) -> Self {
        self.token_expiry_skew = Some(skew);
        self
    }

    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = Some(addr);
        self
    }

    /// Builds the final `AppConfig` instance.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any OAuth client value is missing or
    /// any setting fails validation.
    pub fn build(self) -> Result<AppConfig> {
        let client_id = self.client_id.ok_or_else(|| {
            Error::Config(
                "OAuth client id is required. Provide credentials.json or set GOOGLE_CLIENT_ID."
                    .to_string(),
            )
        })?;

        let client_secret = self.client_secret.ok_or_else(|| {
            Error::Config(
                "OAuth client secret is required. Provide credentials.json or set \
                 GOOGLE_CLIENT_SECRET."
                    .to_string(),
            )
        })?;

        let redirect_uri = self.redirect_uri.ok_or_else(|| {
            Error::Config(
                "Redirect URI is required. Add one to web.redirect_uris or set \
                 GOOGLE_REDIRECT_URI."
                    .to_string(),
            )
        })?;

        let config = AppConfig {
            oauth: OAuthClientConfig {
                client_id,
                client_secret,
                redirect_uri,
                scopes: self
                    .scopes
                    .unwrap_or_else(|| DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()),
                auth_url: self.auth_url.unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
                token_url: self.token_url.unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            },
            upload_dir: self.upload_dir.unwrap_or_else(|| PathBuf::from("temp")),
            session_dir: self.session_dir,
            max_content_length: self
                .max_content_length
                .unwrap_or(DEFAULT_MAX_CONTENT_LENGTH),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            token_expiry_skew: self.token_expiry_skew.unwrap_or(DEFAULT_TOKEN_EXPIRY_SKEW),
            bind_addr: self
                .bind_addr
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 5000))),
        };

        config.validate()?;

        Ok(config)
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
