//! # Authentication Module
//!
//! OAuth 2.0 credential lifecycle for browser sessions.
//!
//! ## Overview
//!
//! Each browser session signs in against Google's authorization server on
//! its own. This crate builds the consent URL, exchanges the returned code,
//! persists the credential per session and refreshes it on use.
//!
//! ## Features
//!
//! - Authorization code flow with PKCE and offline access
//! - Single-use state checked on the callback
//! - Refresh-on-use with write-back, serialized per session
//! - Fail-closed sessions: a broken credential is discarded
//! - Auth state event emission

pub mod authenticator;
pub mod error;
pub mod manager;
pub mod oauth;
pub mod token_store;
pub mod types;

pub use authenticator::Authenticator;
pub use error::{AuthError, Result};
pub use manager::CredentialManager;
pub use oauth::{CallbackParams, OAuthFlowManager, PendingAuthorization, TokenResponse};
pub use token_store::TokenStore;
pub use types::{AuthState, AuthenticatedHandle, RefreshOutcome, SessionId, TokenRecord};
