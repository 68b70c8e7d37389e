//! Credential lifecycle: authorize, exchange, materialize, refresh.

use crate::error::{AuthError, Result};
use crate::oauth::{
    CallbackParams, OAuthFlowManager, PendingAuthorization, RefreshGrant, TokenEndpointError,
    TokenResponse,
};
use crate::types::{AuthenticatedHandle, RefreshOutcome, TokenRecord};
use bridge_traits::http::HttpClient;
use bridge_traits::time::Clock;
use chrono::{DateTime, Duration, Utc};
use core_runtime::config::OAuthClientConfig;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Drives the OAuth2 credential lifecycle for one configured client.
///
/// The authenticator is stateless with respect to sessions: callers persist
/// the returned [`PendingAuthorization`] and [`TokenRecord`] values.
pub struct Authenticator {
    flow: OAuthFlowManager,
    clock: Arc<dyn Clock>,
    expiry_skew: Duration,
}

impl Authenticator {
    pub fn new(
        config: OAuthClientConfig,
        http_client: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
        expiry_skew: std::time::Duration,
    ) -> Self {
        let expiry_skew = Duration::from_std(expiry_skew).unwrap_or_else(|_| Duration::zero());
        Self {
            flow: OAuthFlowManager::new(config, http_client),
            clock,
            expiry_skew,
        }
    }

    /// Produce the consent URL and the state that must come back with it.
    pub fn build_authorization_url(&self) -> Result<(String, PendingAuthorization)> {
        self.flow.build_auth_url()
    }

    /// Complete an authorization from the provider's redirect URL.
    ///
    /// # Errors
    ///
    /// - [`AuthError::AuthState`] when no attempt is pending or the returned
    ///   state differs from the pending one
    /// - [`AuthError::Exchange`] when the provider reported an error, no code
    ///   was returned, or the token endpoint failed
    #[instrument(skip(self, callback_url, expected))]
    pub async fn exchange_code(
        &self,
        callback_url: &str,
        expected: Option<&PendingAuthorization>,
    ) -> Result<TokenRecord> {
        let params = CallbackParams::from_url(callback_url)?;

        let pending = expected.ok_or_else(|| {
            AuthError::AuthState("no authorization attempt is pending".to_string())
        })?;

        match params.state.as_deref() {
            Some(state) if state == pending.state() => {}
            Some(_) => {
                warn!("Callback state does not match the pending authorization");
                return Err(AuthError::AuthState(
                    "callback state does not match".to_string(),
                ));
            }
            None => {
                return Err(AuthError::AuthState(
                    "callback carried no state".to_string(),
                ))
            }
        }

        if let Some(error) = params.error {
            return Err(AuthError::Exchange(format!(
                "provider denied authorization: {}",
                error
            )));
        }

        let code = params
            .code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| AuthError::Exchange("callback carried no code".to_string()))?;

        let response = self
            .flow
            .exchange_code(&code, pending)
            .await
            .map_err(|e| AuthError::Exchange(e.to_string()))?;

        let config = self.flow.config();
        let record = TokenRecord {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            token_endpoint: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scopes: granted_scopes(&response, config.scopes.iter().cloned().collect()),
            expiry: Some(self.expiry_from(&response)),
        };
        record.validate().map_err(|e| AuthError::Exchange(e.to_string()))?;

        debug!(has_refresh_token = record.can_refresh(), "Authorization completed");
        Ok(record)
    }

    /// Turn a stored record into a handle usable for remote calls.
    pub fn materialize(&self, record: &TokenRecord) -> Result<AuthenticatedHandle> {
        record.validate()?;
        Ok(AuthenticatedHandle::new(record.clone()))
    }

    /// Same as [`materialize`](Self::materialize), from a persisted document.
    pub fn materialize_document(&self, document: &[u8]) -> Result<AuthenticatedHandle> {
        let record = TokenRecord::from_document(document)?;
        Ok(AuthenticatedHandle::new(record))
    }

    /// Renew the credential if it is expired or about to expire.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ReauthRequired`] when the token is expired and there is
    ///   no refresh token
    /// - [`AuthError::RefreshFailed`] when the token endpoint refused or could
    ///   not be reached
    #[instrument(skip(self, handle))]
    pub async fn refresh_if_expired(&self, handle: &AuthenticatedHandle) -> Result<RefreshOutcome> {
        let record = handle.record();
        if !record.is_expired_at(self.clock.now(), self.expiry_skew) {
            return Ok(RefreshOutcome::unchanged());
        }

        let refresh_token = match record.refresh_token.as_deref() {
            Some(token) if record.can_refresh() => token,
            _ => {
                warn!("Access token expired and no refresh token is stored");
                return Err(AuthError::ReauthRequired);
            }
        };

        let grant = RefreshGrant {
            refresh_token,
            token_endpoint: &record.token_endpoint,
            client_id: &record.client_id,
            client_secret: &record.client_secret,
        };

        let response = self.flow.refresh(grant).await.map_err(|e| match e {
            TokenEndpointError::Rejected { status, body } => {
                AuthError::RefreshFailed(format!("token endpoint returned {}: {}", status, body))
            }
            other => AuthError::RefreshFailed(other.to_string()),
        })?;

        let renewed = TokenRecord {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            token_endpoint: record.token_endpoint.clone(),
            client_id: record.client_id.clone(),
            client_secret: record.client_secret.clone(),
            scopes: granted_scopes(&response, record.scopes.clone()),
            expiry: Some(self.expiry_from(&response)),
        };
        renewed
            .validate()
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        Ok(RefreshOutcome::renewed(renewed))
    }

    fn expiry_from(&self, response: &TokenResponse) -> DateTime<Utc> {
        self.clock.now() + Duration::seconds(response.expires_in)
    }
}

fn granted_scopes(response: &TokenResponse, fallback: BTreeSet<String>) -> BTreeSet<String> {
    match response.scope.as_deref() {
        Some(scope) if !scope.trim().is_empty() => {
            scope.split_whitespace().map(str::to_string).collect()
        }
        _ => fallback,
    }
}
