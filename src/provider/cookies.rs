//! Session cookie codec.
//!
//! Values are opaque provider tokens, forwarded end-to-end and never
//! inspected. The identity-provider client is the only writer; everything
//! else copies these `Set-Cookie` values onto whatever response goes out.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};

use super::Session;

pub const SESSION_COOKIE: &str = "ponto_session";
pub const REFRESH_COOKIE: &str = "ponto_refresh";

/// `Set-Cookie` values carrying a fresh session.
///
/// # Errors
///
/// Fails when a token contains bytes a header cannot carry.
pub fn session_cookies(
    session: &Session,
    secure: bool,
) -> Result<Vec<HeaderValue>, InvalidHeaderValue> {
    Ok(vec![
        cookie(SESSION_COOKIE, &session.access_token, secure)?,
        cookie(REFRESH_COOKIE, &session.refresh_token, secure)?,
    ])
}

/// `Set-Cookie` values that expire both session cookies.
#[must_use]
pub fn clear_session_cookies(secure: bool) -> Vec<HeaderValue> {
    [SESSION_COOKIE, REFRESH_COOKIE]
        .iter()
        .filter_map(|name| expired_cookie(name, secure).ok())
        .collect()
}

/// Read the opaque access and refresh tokens from the request's `Cookie`
/// header.
#[must_use]
pub fn extract_tokens(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let mut access = None;
    let mut refresh = None;

    if let Some(value) = headers.get(COOKIE).and_then(|header| header.to_str().ok()) {
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            match key.trim() {
                SESSION_COOKIE => access = non_empty(val.trim()),
                REFRESH_COOKIE => refresh = non_empty(val.trim()),
                _ => {}
            }
        }
    }

    (access, refresh)
}

fn cookie(name: &str, value: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn expired_cookie(name: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            access_token: "access-123".to_string(),
            refresh_token: "refresh-456".to_string(),
            expires_at: None,
            user: None,
        }
    }

    #[test]
    fn test_session_cookies_attributes() {
        let cookies = session_cookies(&session(), false).unwrap();
        assert_eq!(cookies.len(), 2);
        assert_eq!(
            cookies[0],
            "ponto_session=access-123; Path=/; HttpOnly; SameSite=Lax"
        );
        assert_eq!(
            cookies[1],
            "ponto_refresh=refresh-456; Path=/; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn test_session_cookies_secure_flag() {
        let cookies = session_cookies(&session(), true).unwrap();
        for cookie in cookies {
            assert!(cookie.to_str().unwrap().ends_with("; Secure"));
        }
    }

    #[test]
    fn test_clear_session_cookies_expire_both() {
        let cookies = clear_session_cookies(false);
        assert_eq!(cookies.len(), 2);
        for cookie in cookies {
            assert!(cookie.to_str().unwrap().contains("Max-Age=0"));
        }
    }

    #[test]
    fn test_extract_tokens() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; ponto_session=access-123; ponto_refresh=refresh-456"),
        );

        let (access, refresh) = extract_tokens(&headers);
        assert_eq!(access.as_deref(), Some("access-123"));
        assert_eq!(refresh.as_deref(), Some("refresh-456"));
    }

    #[test]
    fn test_extract_tokens_missing_or_empty() {
        let headers = HeaderMap::new();
        assert_eq!(extract_tokens(&headers), (None, None));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("ponto_session="));
        assert_eq!(extract_tokens(&headers), (None, None));
    }
}
