//! # Host Bridge Traits
//!
//! Capability traits that separate the drive manager core from its host.
//!
//! ## Overview
//!
//! This crate defines the contract between the core crates and the
//! environment they run in. Each trait represents a capability the core
//! requires but never implements itself: transport, session persistence,
//! the remote storage backend, and the time source.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Single-attempt HTTPS transport
//! - [`RetryPolicy`](http::RetryPolicy) - Backoff schedule for callers that retry
//!
//! ### Storage
//! - [`SessionStore`](storage::SessionStore) - Per-session document persistence
//! - [`StorageProvider`](storage::StorageProvider) - Remote file hierarchy backend
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Host
//! implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Report missing remote resources as [`BridgeError::NotFound`]
//! - Provide actionable error messages
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so they can be shared
//! across request handlers behind an `Arc`.
//!
//! ## Examples
//!
//! ### Implementing HttpClient
//!
//! ```ignore
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         // One attempt; non-2xx statuses are returned, not raised
//!         send_once(&self.client, request).await
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{
    ByteStream, HttpClient, HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse, RetryPolicy,
};
pub use storage::{RemoteFile, SessionStore, StorageProvider};
pub use time::{Clock, SystemClock};
