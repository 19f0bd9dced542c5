//! Builders for the two redirect shapes of the hand-off.
//!
//! Tokens only ever ride on the native-scheme URL. The web-URL builder
//! cannot accept tokens at all, so a token can never end up in a
//! bookmarkable or server-logged web location.

use std::fmt;
use url::form_urlencoded;

use super::params::{self, MobileContext};

/// Opaque credential bundle issued by the identity provider. Held only
/// while building a redirect; the redacted `Debug` keeps the tokens out of
/// log records.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<i64>,
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RedirectError {
    /// Asking for a native redirect without an app scheme is a caller bug
    /// and fails loudly instead of silently producing a broken URL.
    #[error("app scheme is required for a mobile redirect")]
    MissingAppScheme,
}

/// Build the custom-scheme URL the native app intercepts:
/// `{app_scheme}://auth/callback?access_token=...&refresh_token=...`,
/// with `expires_at` and the percent-encoded `redirect_url` appended when
/// present.
///
/// # Errors
///
/// Returns [`RedirectError::MissingAppScheme`] when `app_scheme` is empty.
pub fn build_app_redirect(
    app_scheme: &str,
    tokens: &AuthTokens,
    redirect_url: Option<&str>,
) -> Result<String, RedirectError> {
    if app_scheme.is_empty() {
        return Err(RedirectError::MissingAppScheme);
    }

    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("access_token", &tokens.access_token);
    query.append_pair("refresh_token", &tokens.refresh_token);
    if let Some(expires_at) = tokens.expires_at {
        query.append_pair("expires_at", &expires_at.to_string());
    }
    if let Some(redirect_url) = redirect_url {
        query.append_pair("redirect_url", redirect_url);
    }

    Ok(format!("{app_scheme}://auth/callback?{}", query.finish()))
}

/// Build a web URL that keeps the mobile context alive across a page
/// bounce (login ⇄ signup ⇄ callback). Never carries tokens.
#[must_use]
pub fn build_web_url(base_path: &str, context: &MobileContext, extra: &[(&str, &str)]) -> String {
    params::serialize(base_path, context, extra)
}
