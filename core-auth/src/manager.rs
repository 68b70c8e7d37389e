//! # Credential Manager
//!
//! Session-scoped orchestration of the OAuth 2.0 lifecycle.
//!
//! ## Overview
//!
//! The `CredentialManager` ties the [`Authenticator`] to per-session storage
//! and the application's event bus. Each browser session signs in on its own;
//! nothing is shared between sessions.
//!
//! ## Features
//!
//! - Sign-in with a single-use pending state per session
//! - Refresh-on-use with write-back of the renewed credential
//! - Concurrent refreshes for one session are serialized
//! - Fail-closed: any credential failure clears the session
//! - Auth state events on the [`EventBus`]
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{CredentialManager, SessionId};
//! # async fn example(manager: CredentialManager) -> core_auth::Result<()> {
//! let session_id = SessionId::new();
//! let consent_url = manager.begin_login(session_id).await?;
//! // Redirect the browser to consent_url; later, on the callback:
//! # let callback_url = "/oauth2callback?code=c&state=s";
//! manager.complete_login(session_id, callback_url).await?;
//! let handle = manager.authenticated_handle(session_id).await?;
//! println!("bearer {}", handle.access_token());
//! # Ok(())
//! # }
//! ```

use crate::authenticator::Authenticator;
use crate::error::{AuthError, Result};
use crate::token_store::TokenStore;
use crate::types::{AuthState, AuthenticatedHandle, SessionId};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, instrument, warn};

/// Upper bound on a code exchange or a refresh, retries included.
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(120);

/// Session-scoped credential lifecycle manager.
pub struct CredentialManager {
    authenticator: Authenticator,
    token_store: TokenStore,
    event_bus: EventBus,
    /// Serializes credential mutations per session
    session_locks: Arc<Mutex<HashMap<SessionId, Arc<Mutex<()>>>>>,
    auth_timeout: Duration,
}

impl CredentialManager {
    pub fn new(authenticator: Authenticator, token_store: TokenStore, event_bus: EventBus) -> Self {
        Self {
            authenticator,
            token_store,
            event_bus,
            session_locks: Arc::new(Mutex::new(HashMap::new())),
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    pub fn with_auth_timeout(mut self, auth_timeout: Duration) -> Self {
        self.auth_timeout = auth_timeout;
        self
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    /// Start a sign-in and return the consent URL.
    ///
    /// A new call replaces any attempt still pending for the session.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn begin_login(&self, session_id: SessionId) -> Result<String> {
        let (url, pending) = self.authenticator.build_authorization_url()?;
        self.token_store.store_pending(session_id, &pending).await?;

        self.emit(AuthEvent::SigningIn {
            session_id: session_id.to_string(),
        });
        info!("Authorization started");

        Ok(url)
    }

    /// Finish a sign-in from the provider's redirect URL.
    ///
    /// The pending state is consumed even when the exchange fails.
    #[instrument(skip(self, callback_url), fields(session_id = %session_id))]
    pub async fn complete_login(&self, session_id: SessionId, callback_url: &str) -> Result<()> {
        let lock = self.session_lock(session_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.exchange_and_store(session_id, callback_url).await
        };
        self.release_session_lock(session_id, lock).await;
        result
    }

    async fn exchange_and_store(&self, session_id: SessionId, callback_url: &str) -> Result<()> {
        let pending = self.token_store.take_pending(session_id).await?;

        let exchanged = match timeout(
            self.auth_timeout,
            self.authenticator
                .exchange_code(callback_url, pending.as_ref()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AuthError::Exchange("code exchange timed out".to_string())),
        };

        let record = match exchanged {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Authorization failed");
                self.fail_closed(session_id, &e).await;
                return Err(e);
            }
        };

        self.token_store.store_tokens(session_id, &record).await?;

        self.emit(AuthEvent::SignedIn {
            session_id: session_id.to_string(),
        });
        info!("Session signed in");
        Ok(())
    }

    /// Return a handle whose access token is valid for immediate use.
    ///
    /// Refreshes and persists the credential when it is expired. Concurrent
    /// callers for the same session wait for one another, so at most one
    /// refresh request is issued per expiry. Any credential failure clears the
    /// session before the error is returned.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn authenticated_handle(&self, session_id: SessionId) -> Result<AuthenticatedHandle> {
        let lock = self.session_lock(session_id).await;
        let result = {
            let _guard = lock.lock().await;
            match self.load_and_refresh(session_id).await {
                Ok(handle) => Ok(handle),
                Err(e) => {
                    if e.invalidates_session() {
                        self.fail_closed(session_id, &e).await;
                    }
                    Err(e)
                }
            }
        };
        self.release_session_lock(session_id, lock).await;
        result
    }

    async fn load_and_refresh(&self, session_id: SessionId) -> Result<AuthenticatedHandle> {
        // Read under the lock: a caller that waited sees the refreshed record.
        let record = self
            .token_store
            .load_tokens(session_id)
            .await?
            .ok_or(AuthError::NotAuthenticated)?;

        let handle = self.authenticator.materialize(&record)?;

        let outcome = match timeout(
            self.auth_timeout,
            self.authenticator.refresh_if_expired(&handle),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(AuthError::RefreshFailed("refresh timed out".to_string())),
        };

        let Some(renewed) = outcome.record.filter(|_| outcome.refreshed) else {
            debug!("Stored token still valid");
            return Ok(handle);
        };

        self.token_store.store_tokens(session_id, &renewed).await?;
        self.emit(AuthEvent::TokenRefreshed {
            session_id: session_id.to_string(),
            expires_at: renewed.expiry.map(|expiry| expiry.timestamp()),
        });
        info!("Access token refreshed");

        self.authenticator.materialize(&renewed)
    }

    /// Current state of the session.
    pub async fn state(&self, session_id: SessionId) -> Result<AuthState> {
        if self.token_store.has_tokens(session_id).await? {
            Ok(AuthState::Authenticated)
        } else if self.token_store.has_pending(session_id).await? {
            Ok(AuthState::Authenticating)
        } else {
            Ok(AuthState::Unauthenticated)
        }
    }

    /// Drop everything stored for the session. Idempotent.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn logout(&self, session_id: SessionId) -> Result<()> {
        let lock = self.session_lock(session_id).await;
        let cleared = {
            let _guard = lock.lock().await;
            self.token_store.clear_session(session_id).await
        };
        self.release_session_lock(session_id, lock).await;
        cleared?;

        self.emit(AuthEvent::SignedOut {
            session_id: session_id.to_string(),
        });
        info!("Session signed out");
        Ok(())
    }

    async fn session_lock(&self, session_id: SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;
        locks
            .entry(session_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Forget the session's lock once no other task holds or awaits it.
    async fn release_session_lock(&self, session_id: SessionId, lock: Arc<Mutex<()>>) {
        let mut locks = self.session_locks.lock().await;
        // Clones are only taken under the map lock, so the count is stable here.
        let idle = locks
            .get(&session_id)
            .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(&session_id);
        }
    }

    async fn fail_closed(&self, session_id: SessionId, cause: &AuthError) {
        let cleared = match self.token_store.clear_session(session_id).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to clear session after auth failure");
                false
            }
        };
        self.emit(AuthEvent::AuthError {
            session_id: Some(session_id.to_string()),
            message: cause.to_string(),
            recoverable: cleared,
        });
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is not an error.
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }
}
