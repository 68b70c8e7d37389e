//! Per-session Credential Storage
//!
//! Persists the credential document and the pending authorization of each
//! browser session through a [`SessionStore`].
//!
//! ## Security Features
//!
//! - Token values are never logged or included in error messages
//! - Corrupted documents are erased instead of being retried forever
//! - A pending authorization is consumed on read so a state can be used once
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{SessionId, TokenStore};
//! use std::sync::Arc;
//! # use bridge_traits::storage::SessionStore;
//! # async fn example(store: Arc<dyn SessionStore>, record: core_auth::TokenRecord) -> core_auth::Result<()> {
//! let token_store = TokenStore::new(store);
//! let session_id = SessionId::new();
//!
//! token_store.store_tokens(session_id, &record).await?;
//! let loaded = token_store.load_tokens(session_id).await?;
//! token_store.clear_session(session_id).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::oauth::PendingAuthorization;
use crate::types::{SessionId, TokenRecord};
use bridge_traits::storage::SessionStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Session-scoped storage for credentials and pending authorizations.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn SessionStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        debug!("Initializing TokenStore");
        Self { store }
    }

    /// Persist the credential document, replacing any previous one.
    pub async fn store_tokens(&self, session_id: SessionId, record: &TokenRecord) -> Result<()> {
        let document = record.to_document()?;

        self.store
            .put(&Self::tokens_key(session_id), &document)
            .await
            .map_err(|e| {
                warn!(session_id = %session_id, error = %e, "Failed to persist tokens");
                AuthError::Storage(e.to_string())
            })?;

        info!(
            session_id = %session_id,
            has_refresh_token = record.can_refresh(),
            "Tokens stored"
        );
        Ok(())
    }

    /// Load the session's credential.
    ///
    /// Returns `Ok(None)` when the session never signed in. A document that
    /// cannot be parsed is deleted and reported as
    /// [`AuthError::InvalidToken`].
    pub async fn load_tokens(&self, session_id: SessionId) -> Result<Option<TokenRecord>> {
        let key = Self::tokens_key(session_id);

        let document = match self.store.get(&key).await {
            Ok(Some(document)) => document,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to read tokens");
                return Err(AuthError::Storage(e.to_string()));
            }
        };

        match TokenRecord::from_document(&document) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(session_id = %session_id, "Stored credential is corrupted, deleting it");
                if let Err(remove_err) = self.store.remove(&key).await {
                    warn!(
                        session_id = %session_id,
                        error = %remove_err,
                        "Failed to delete corrupted credential"
                    );
                }
                Err(e)
            }
        }
    }

    pub async fn has_tokens(&self, session_id: SessionId) -> Result<bool> {
        self.store
            .contains(&Self::tokens_key(session_id))
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    pub async fn delete_tokens(&self, session_id: SessionId) -> Result<()> {
        self.store
            .remove(&Self::tokens_key(session_id))
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    /// Remember the in-flight authorization, replacing an older attempt.
    pub async fn store_pending(
        &self,
        session_id: SessionId,
        pending: &PendingAuthorization,
    ) -> Result<()> {
        let document = serde_json::to_vec(pending)
            .map_err(|e| AuthError::Other(format!("Failed to serialize state: {}", e)))?;

        self.store
            .put(&Self::pending_key(session_id), &document)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    pub async fn has_pending(&self, session_id: SessionId) -> Result<bool> {
        self.store
            .contains(&Self::pending_key(session_id))
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }

    /// Consume the in-flight authorization.
    ///
    /// The entry is removed whether or not it parses, so a state value can
    /// only be presented once.
    pub async fn take_pending(&self, session_id: SessionId) -> Result<Option<PendingAuthorization>> {
        let key = Self::pending_key(session_id);

        let document = self
            .store
            .get(&key)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        let Some(document) = document else {
            return Ok(None);
        };

        self.store
            .remove(&key)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        match serde_json::from_slice(&document) {
            Ok(pending) => Ok(Some(pending)),
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Discarding unreadable pending state");
                Ok(None)
            }
        }
    }

    /// Remove everything stored for the session.
    pub async fn clear_session(&self, session_id: SessionId) -> Result<()> {
        self.delete_tokens(session_id).await?;
        self.store
            .remove(&Self::pending_key(session_id))
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        info!(session_id = %session_id, "Session cleared");
        Ok(())
    }

    fn tokens_key(session_id: SessionId) -> String {
        format!("session:{}:tokens", session_id)
    }

    fn pending_key(session_id: SessionId) -> String {
        format!("session:{}:pending", session_id)
    }
}
