use crate::error::{AuthError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of one browser session.
///
/// Every credential, pending authorization and refresh lock is keyed by a
/// session id; nothing is shared between sessions.
///
/// # Examples
///
/// ```
/// use core_auth::SessionId;
///
/// let session_id = SessionId::new();
/// let parsed = SessionId::parse(&session_id.to_string()).unwrap();
/// assert_eq!(session_id, parsed);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a session ID from its string form
    pub fn parse(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Serializable OAuth2 credential bundle persisted per session.
///
/// The serialized field names (`token`, `token_uri`, `expiry`, ...) match the
/// session document written by earlier deployments, so existing sessions
/// keep working. Those documents store `expiry` without a UTC offset; such
/// timestamps are read as UTC.
///
/// A record without a refresh token cannot be renewed once it expires; the
/// holder has to sign in again.
///
/// # Security
///
/// The `Debug` implementation redacts every secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    #[serde(rename = "token")]
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(rename = "token_uri")]
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    /// When the access token expires; `None` means the provider gave no expiry
    #[serde(default, with = "expiry_format")]
    pub expiry: Option<DateTime<Utc>>,
}

/// Writes RFC 3339; reads RFC 3339 or a naive ISO 8601 timestamp taken as UTC.
mod expiry_format {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };

        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(Some(parsed.with_timezone(&Utc)));
        }

        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(&raw, format).ok())
            .map(|naive| Some(naive.and_utc()))
            .ok_or_else(|| D::Error::custom(format!("unrecognized expiry timestamp: {}", raw)))
    }
}

impl TokenRecord {
    /// Whether the access token is expired at `now`, or will be within `skew`.
    ///
    /// A record without an expiry is never considered expired.
    ///
    /// ```
    /// use chrono::{Duration, Utc};
    /// # use core_auth::TokenRecord;
    /// # let mut record = TokenRecord {
    /// #     access_token: "a".into(), refresh_token: None,
    /// #     token_endpoint: "https://oauth2.googleapis.com/token".into(),
    /// #     client_id: "c".into(), client_secret: "s".into(),
    /// #     scopes: Default::default(), expiry: None,
    /// # };
    /// let now = Utc::now();
    /// record.expiry = Some(now + Duration::seconds(30));
    /// assert!(!record.is_expired_at(now, Duration::zero()));
    /// assert!(record.is_expired_at(now, Duration::seconds(60)));
    /// ```
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        match self.expiry {
            Some(expiry) => now + skew >= expiry,
            None => false,
        }
    }

    /// Whether the record carries a usable refresh token.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.trim().is_empty())
    }

    /// Structural validity check performed before a record is used.
    pub fn validate(&self) -> Result<()> {
        if self.access_token.trim().is_empty() {
            return Err(AuthError::InvalidToken(
                "access token is missing".to_string(),
            ));
        }
        if self.token_endpoint.trim().is_empty() {
            return Err(AuthError::InvalidToken(
                "token endpoint is missing".to_string(),
            ));
        }
        if self.client_id.trim().is_empty() {
            return Err(AuthError::InvalidToken("client id is missing".to_string()));
        }
        Ok(())
    }

    /// Parse a persisted session document.
    ///
    /// Any structural problem, including a missing `token` field, is reported
    /// as [`AuthError::InvalidToken`].
    pub fn from_document(document: &[u8]) -> Result<Self> {
        let record: TokenRecord = serde_json::from_slice(document)
            .map_err(|e| AuthError::InvalidToken(format!("unreadable credential: {}", e)))?;
        record.validate()?;
        Ok(record)
    }

    /// Serialize into the persisted session document.
    pub fn to_document(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| AuthError::Other(format!("Failed to serialize credential: {}", e)))
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// A credential that passed validation and can authorize remote calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedHandle {
    record: TokenRecord,
}

impl AuthenticatedHandle {
    pub(crate) fn new(record: TokenRecord) -> Self {
        Self { record }
    }

    pub fn access_token(&self) -> &str {
        &self.record.access_token
    }

    pub fn record(&self) -> &TokenRecord {
        &self.record
    }
}

/// Result of [`Authenticator::refresh_if_expired`](crate::Authenticator::refresh_if_expired).
///
/// When `refreshed` is true, `record` holds the renewed credential that the
/// caller must persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub refreshed: bool,
    pub record: Option<TokenRecord>,
}

impl RefreshOutcome {
    pub fn unchanged() -> Self {
        Self {
            refreshed: false,
            record: None,
        }
    }

    pub fn renewed(record: TokenRecord) -> Self {
        Self {
            refreshed: true,
            record: Some(record),
        }
    }
}

/// Authentication state of a session.
///
/// ```text
/// Unauthenticated -> Authenticating -> Authenticated
///        ^                 |                 |
///        +-----------------+-----------------+   (any auth failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    /// An authorization URL was issued and the callback is pending
    Authenticating,
    /// The session holds a stored credential
    Authenticated,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Unauthenticated => write!(f, "Unauthenticated"),
            AuthState::Authenticating => write!(f, "Authenticating"),
            AuthState::Authenticated => write!(f, "Authenticated"),
        }
    }
}
