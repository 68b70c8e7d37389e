//! OAuth 2.0 Authorization Code Flow with PKCE
//!
//! Implements RFC 6749 (OAuth 2.0) and RFC 7636 (PKCE) against Google's
//! authorization server.
//!
//! # Overview
//!
//! The flow manager handles:
//! - Building authorization URLs that request offline access
//! - Exchanging authorization codes for tokens
//! - Refreshing access tokens with bounded retry
//! - Parsing the redirect URL the provider sends the browser back to
//!
//! # Security
//!
//! - The code verifier and state are generated from a CSPRNG
//! - Only the S256 challenge leaves the process during authorization
//! - Tokens, codes and verifiers are never logged

use crate::error::{AuthError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use core_runtime::config::OAuthClientConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Three attempts, 100ms then 200ms apart.
const REFRESH_RETRY: RetryPolicy = RetryPolicy {
    max_attempts: 3,
    base_delay: Duration::from_millis(100),
    max_delay: Duration::from_secs(30),
};

/// Base used to resolve callback URLs that arrive without scheme and host.
const CALLBACK_BASE: &str = "http://localhost/";

/// State and PKCE verifier of one in-flight authorization attempt.
///
/// Persisted in the session between `begin` and the callback. The verifier
/// must never be sent to the authorization server; only its challenge is.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    state: String,
    verifier: String,
}

impl PendingAuthorization {
    /// Generate a fresh attempt.
    ///
    /// The verifier is 32 random bytes and the state is 16 random bytes
    /// (128 bits), both base64url-encoded without padding.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { state, verifier }
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    /// S256 challenge: BASE64URL(SHA256(code_verifier))
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("state", &self.state)
            .field("verifier", &"[REDACTED]")
            .finish()
    }
}

/// Query parameters carried by the provider's redirect back to the app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Extract `code`, `state` and `error` from a callback URL.
    ///
    /// Relative URLs such as `/oauth2callback?code=...` are accepted.
    pub fn from_url(callback_url: &str) -> Result<Self> {
        let base = Url::parse(CALLBACK_BASE)
            .map_err(|e| AuthError::Other(format!("Invalid callback base: {}", e)))?;
        let url = base
            .join(callback_url)
            .map_err(|e| AuthError::Exchange(format!("Malformed callback URL: {}", e)))?;

        let mut params = CallbackParams::default();
        for (key, value) in url.query_pairs() {
            let value = value.into_owned();
            match key.as_ref() {
                "code" => params.code = Some(value),
                "state" => params.state = Some(value),
                "error" => params.error = Some(value),
                _ => {}
            }
        }
        Ok(params)
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Space-delimited scopes actually granted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

/// Failure talking to the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEndpointError {
    /// The request never produced a response
    Transport(String),
    /// The endpoint answered with a non-success status
    Rejected { status: u16, body: String },
    /// The success body could not be decoded
    Malformed(String),
}

impl fmt::Display for TokenEndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenEndpointError::Transport(msg) => write!(f, "transport failure: {}", msg),
            TokenEndpointError::Rejected { status, body } => {
                write!(f, "token endpoint returned {}: {}", status, body)
            }
            TokenEndpointError::Malformed(msg) => write!(f, "malformed token response: {}", msg),
        }
    }
}

/// Credentials needed to renew an access token.
#[derive(Clone, Copy)]
pub struct RefreshGrant<'a> {
    pub refresh_token: &'a str,
    pub token_endpoint: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

/// OAuth 2.0 flow manager for a single configured client.
pub struct OAuthFlowManager {
    config: OAuthClientConfig,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthClientConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &OAuthClientConfig {
        &self.config
    }

    /// Build the consent URL for a fresh authorization attempt.
    ///
    /// Requests offline access so the provider issues a refresh token, and
    /// incremental consent so earlier grants are kept.
    #[instrument(skip(self))]
    pub fn build_auth_url(&self) -> Result<(String, PendingAuthorization)> {
        let pending = PendingAuthorization::generate();
        let challenge = pending.challenge();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Other(format!("Invalid auth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("scope", &self.config.scopes.join(" "));
            query.append_pair("state", pending.state());
            query.append_pair("code_challenge", &challenge);
            query.append_pair("code_challenge_method", "S256");
            query.append_pair("access_type", "offline");
            query.append_pair("include_granted_scopes", "true");
        }

        debug!("Built authorization URL");

        Ok((url.to_string(), pending))
    }

    /// Exchange an authorization code for tokens.
    ///
    /// State verification is the caller's job; this only talks to the token
    /// endpoint.
    #[instrument(skip(self, code, pending))]
    pub async fn exchange_code(
        &self,
        code: &str,
        pending: &PendingAuthorization,
    ) -> std::result::Result<TokenResponse, TokenEndpointError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code_verifier", pending.verifier()),
        ];
        let encoded = serde_urlencoded::to_string(params)
            .map_err(|e| TokenEndpointError::Malformed(e.to_string()))?;

        debug!("Exchanging authorization code for tokens");

        let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
            .form(encoded);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| TokenEndpointError::Transport(e.to_string()))?;

        if !response.is_success() {
            let status = response.status;
            let body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            warn!(status = status, "Token exchange rejected");

            return Err(TokenEndpointError::Rejected { status, body });
        }

        let token_response: TokenResponse = response
            .json()
            .map_err(|e| TokenEndpointError::Malformed(e.to_string()))?;

        info!(
            expires_in = token_response.expires_in,
            has_refresh_token = token_response.refresh_token.is_some(),
            "Exchanged authorization code for tokens"
        );

        Ok(token_response)
    }

    /// Renew an access token.
    ///
    /// 4xx responses are terminal. Transport failures and 5xx responses are
    /// retried with exponential backoff (100ms, 200ms) for up to three
    /// attempts. When the provider omits a new refresh token the old one is
    /// carried over.
    #[instrument(skip(self, grant))]
    pub async fn refresh(
        &self,
        grant: RefreshGrant<'_>,
    ) -> std::result::Result<TokenResponse, TokenEndpointError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", grant.refresh_token),
            ("client_id", grant.client_id),
            ("client_secret", grant.client_secret),
        ];
        let encoded = serde_urlencoded::to_string(params)
            .map_err(|e| TokenEndpointError::Malformed(e.to_string()))?;

        let mut attempts = 0;

        loop {
            attempts += 1;

            let request = HttpRequest::new(HttpMethod::Post, grant.token_endpoint.to_string())
                .form(encoded.clone());

            let last_error = match self.http_client.execute(request).await {
                Ok(response) if response.is_success() => {
                    let mut token_response: TokenResponse = response
                        .json()
                        .map_err(|e| TokenEndpointError::Malformed(e.to_string()))?;

                    if token_response.refresh_token.is_none() {
                        token_response.refresh_token = Some(grant.refresh_token.to_string());
                    }

                    info!(
                        expires_in = token_response.expires_in,
                        attempts = attempts,
                        "Refreshed access token"
                    );
                    return Ok(token_response);
                }
                Ok(response) => {
                    let status = response.status;
                    let body = response
                        .text()
                        .unwrap_or_else(|_| "Unable to read error response".to_string());

                    if response.is_client_error() {
                        warn!(status = status, "Token refresh rejected without retry");
                        return Err(TokenEndpointError::Rejected { status, body });
                    }
                    TokenEndpointError::Rejected { status, body }
                }
                Err(e) => TokenEndpointError::Transport(e.to_string()),
            };

            let Some(delay) = REFRESH_RETRY.delay_after(attempts) else {
                warn!(attempts = attempts, error = %last_error, "Token refresh gave up");
                return Err(last_error);
            };
            warn!(
                attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use bytes::Bytes;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        pub Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn config() -> OAuthClientConfig {
        OAuthClientConfig {
            client_id: "test-client.apps.googleusercontent.com".to_string(),
            client_secret: "GOCSPX-secret".to_string(),
            redirect_uri: "http://localhost:5000/oauth2callback".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/drive".to_string(),
                "openid".to_string(),
            ],
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn grant() -> RefreshGrant<'static> {
        RefreshGrant {
            refresh_token: "1//refresh",
            token_endpoint: "https://oauth2.googleapis.com/token",
            client_id: "test-client.apps.googleusercontent.com",
            client_secret: "GOCSPX-secret",
        }
    }

    #[test]
    fn test_pending_authorization_generation() {
        let first = PendingAuthorization::generate();
        let second = PendingAuthorization::generate();

        assert_eq!(first.challenge(), first.challenge());
        assert_ne!(first.state(), second.state());
        assert_ne!(first.verifier(), second.verifier());
        // 16 bytes -> 22 base64url characters
        assert_eq!(first.state().len(), 22);
    }

    #[test]
    fn test_challenge_is_base64url() {
        let pending = PendingAuthorization {
            state: "state".to_string(),
            verifier: "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string(),
        };

        // RFC 7636 appendix B
        assert_eq!(
            pending.challenge(),
            "E9Melhoa2OwvFrEMTJguCQaoeC2tNjnpOiJM3bpYkSE"
        );
    }

    #[test]
    fn test_pending_debug_hides_verifier() {
        let pending = PendingAuthorization::generate();
        let rendered = format!("{:?}", pending);
        assert!(!rendered.contains(pending.verifier()));
    }

    #[test]
    fn test_build_auth_url() {
        let manager = OAuthFlowManager::new(config(), Arc::new(MockHttp::new()));
        let (url, pending) = manager.build_auth_url().unwrap();

        let parsed = Url::parse(&url).unwrap();
        let query: HashMap<_, _> = parsed.query_pairs().into_owned().collect();

        assert_eq!(query["client_id"], "test-client.apps.googleusercontent.com");
        assert_eq!(query["redirect_uri"], "http://localhost:5000/oauth2callback");
        assert_eq!(query["response_type"], "code");
        assert_eq!(
            query["scope"],
            "https://www.googleapis.com/auth/drive openid"
        );
        assert_eq!(query["state"], pending.state());
        assert_eq!(query["code_challenge"], pending.challenge());
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(query["access_type"], "offline");
        assert_eq!(query["include_granted_scopes"], "true");
    }

    #[test]
    fn test_build_auth_url_invalid_endpoint() {
        let mut cfg = config();
        cfg.auth_url = "not a valid url".to_string();
        let manager = OAuthFlowManager::new(cfg, Arc::new(MockHttp::new()));

        assert!(manager.build_auth_url().is_err());
    }

    #[test]
    fn test_callback_params_relative_url() {
        let params =
            CallbackParams::from_url("/oauth2callback?state=abc&code=4%2F0Adeu&scope=drive")
                .unwrap();

        assert_eq!(params.code.as_deref(), Some("4/0Adeu"));
        assert_eq!(params.state.as_deref(), Some("abc"));
        assert_eq!(params.error, None);
    }

    #[test]
    fn test_callback_params_error() {
        let params = CallbackParams::from_url(
            "http://localhost:5000/oauth2callback?error=access_denied&state=abc",
        )
        .unwrap();

        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.code, None);
    }

    #[tokio::test]
    async fn test_exchange_code_sends_verifier() {
        let pending = PendingAuthorization::generate();
        let verifier = pending.verifier().to_string();

        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(move |request| {
                let body = request
                    .body
                    .as_ref()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .unwrap_or_default();
                request.method == HttpMethod::Post
                    && request.url == "https://oauth2.googleapis.com/token"
                    && body.contains("grant_type=authorization_code")
                    && body.contains(&format!("code_verifier={}", verifier))
            })
            .times(1)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"access_token":"ya29.new","refresh_token":"1//r","expires_in":3599,"scope":"openid"}"#,
                ))
            });

        let manager = OAuthFlowManager::new(config(), Arc::new(http));
        let tokens = manager.exchange_code("auth-code", &pending).await.unwrap();

        assert_eq!(tokens.access_token, "ya29.new");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//r"));
        assert_eq!(tokens.expires_in, 3599);
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(400, r#"{"error":"invalid_grant"}"#)));

        let manager = OAuthFlowManager::new(config(), Arc::new(http));
        let err = manager
            .exchange_code("bad", &PendingAuthorization::generate())
            .await
            .unwrap_err();

        assert!(matches!(err, TokenEndpointError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_refresh_keeps_old_refresh_token() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, r#"{"access_token":"ya29.fresh"}"#)));

        let manager = OAuthFlowManager::new(config(), Arc::new(http));
        let tokens = manager.refresh(grant()).await.unwrap();

        assert_eq!(tokens.access_token, "ya29.fresh");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(tokens.expires_in, 3600);
    }

    #[tokio::test]
    async fn test_refresh_client_error_is_terminal() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(401, r#"{"error":"invalid_client"}"#)));

        let manager = OAuthFlowManager::new(config(), Arc::new(http));
        let err = manager.refresh(grant()).await.unwrap_err();

        assert!(matches!(err, TokenEndpointError::Rejected { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_refresh_retries_server_errors() {
        let mut http = MockHttp::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(503, "unavailable")));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(BridgeError::OperationFailed("connection reset".to_string()))
            });
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response(200, r#"{"access_token":"ya29.third"}"#)));

        let manager = OAuthFlowManager::new(config(), Arc::new(http));
        let tokens = manager.refresh(grant()).await.unwrap();

        assert_eq!(tokens.access_token, "ya29.third");
    }

    #[tokio::test]
    async fn test_refresh_gives_up_after_three_attempts() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(3)
            .returning(|_| Ok(response(500, "boom")));

        let manager = OAuthFlowManager::new(config(), Arc::new(http));
        let err = manager.refresh(grant()).await.unwrap_err();

        assert!(matches!(err, TokenEndpointError::Rejected { status: 500, .. }));
    }

    #[test]
    fn test_token_response_minimal() {
        let response: TokenResponse = serde_json::from_str(r#"{"access_token":"token"}"#).unwrap();
        assert_eq!(response.refresh_token, None);
        assert_eq!(response.expires_in, 3600);
    }
}
