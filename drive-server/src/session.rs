//! Session cookie handling.
//!
//! The cookie only carries an opaque [`SessionId`]; credentials stay in the
//! server-side session store.

use axum::http::{header, HeaderMap};
use core_auth::SessionId;

pub const SESSION_COOKIE: &str = "drive_session";

/// Session id from the request's `Cookie` headers, if present and well formed.
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| SessionId::parse(value.trim()).ok())
}

pub fn session_cookie(session_id: SessionId) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, session_id
    )
}

pub fn expired_session_cookie() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_reads_session_among_other_cookies() {
        let id = SessionId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; drive_session={}; lang=en", id)).unwrap(),
        );

        assert_eq!(session_from_headers(&headers), Some(id));
    }

    #[test]
    fn test_reads_session_from_second_cookie_header() {
        let id = SessionId::new();
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(
            header::COOKIE,
            HeaderValue::from_str(&format!("drive_session={}", id)).unwrap(),
        );

        assert_eq!(session_from_headers(&headers), Some(id));
    }

    #[test]
    fn test_ignores_malformed_session() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("drive_session=not-a-uuid"),
        );

        assert_eq!(session_from_headers(&headers), None);
        assert_eq!(session_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_cookie_is_http_only() {
        let id = SessionId::new();
        let cookie = session_cookie(id);

        assert!(cookie.starts_with(&format!("drive_session={};", id)));
        assert!(cookie.contains("HttpOnly"));
        assert!(expired_session_cookie().contains("Max-Age=0"));
    }
}
