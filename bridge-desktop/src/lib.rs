//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and server hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the bridge traits
//! using desktop-appropriate libraries:
//! - `HttpClient` using `reqwest`
//! - `SessionStore` backed by one file per key using `tokio::fs`
//! - `SessionStore` held in process memory, for tests and ephemeral hosts
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileSessionStore, ReqwestHttpClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let sessions = FileSessionStore::new("/var/lib/drive-manager/sessions");
//!
//!     // Hand both to the service layer
//!     Ok(())
//! }
//! ```

mod http;
mod session_store;

pub use http::ReqwestHttpClient;
pub use session_store::{FileSessionStore, MemorySessionStore};
