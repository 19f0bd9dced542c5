//! Codec for the two hand-off query parameters, `app_scheme` and
//! `redirect_url`, plus WebView detection.

use regex::Regex;
use url::form_urlencoded;
use url::Url;

pub const APP_SCHEME_PARAM: &str = "app_scheme";
pub const REDIRECT_URL_PARAM: &str = "redirect_url";

/// Marker that the current navigation came from (or must return to) a
/// native app. Derived fresh from each request's query string, never
/// persisted, and forwarded unchanged through every intermediate redirect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MobileContext {
    pub app_scheme: Option<String>,
    pub redirect_url: Option<String>,
}

impl MobileContext {
    /// At least one hand-off parameter was supplied.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.app_scheme.is_some() || self.redirect_url.is_some()
    }

    /// Both parameters required for a token hand-off are supplied.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.app_scheme.is_some() && self.redirect_url.is_some()
    }
}

/// Read the hand-off parameters from a raw query string. Absent or empty
/// values become `None`, never the empty string.
#[must_use]
pub fn extract(query: &str) -> MobileContext {
    let mut context = MobileContext::default();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            APP_SCHEME_PARAM => context.app_scheme = Some(value.into_owned()),
            REDIRECT_URL_PARAM => context.redirect_url = Some(value.into_owned()),
            _ => {}
        }
    }

    context
}

/// Outcome of validating a [`MobileContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Check the hand-off parameters. Both fields are independently optional:
/// absence is never an error, only a malformed present value is. Callers
/// decide whether a scheme without a redirect URL is acceptable.
#[must_use]
pub fn validate(context: &MobileContext) -> Validation {
    let mut errors = Vec::new();

    if let Some(scheme) = &context.app_scheme {
        if !valid_app_scheme(scheme) {
            errors.push("Invalid app scheme format".to_string());
        }
    }

    if let Some(url) = &context.redirect_url {
        if Url::parse(url).is_err() {
            errors.push("Invalid redirect URL format".to_string());
        }
    }

    Validation {
        is_valid: errors.is_empty(),
        errors,
    }
}

// URI scheme shape per RFC 3986, capped at 49 characters.
fn valid_app_scheme(scheme: &str) -> bool {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]{0,48}$").map_or(false, |re| re.is_match(scheme))
}

/// Append any present hand-off parameters (plus caller-supplied extras) to
/// `base_path`. Returns the path unchanged when there is nothing to append.
#[must_use]
pub fn serialize(base_path: &str, context: &MobileContext, extra: &[(&str, &str)]) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());

    if let Some(scheme) = &context.app_scheme {
        query.append_pair(APP_SCHEME_PARAM, scheme);
    }
    if let Some(url) = &context.redirect_url {
        query.append_pair(REDIRECT_URL_PARAM, url);
    }
    for (key, value) in extra {
        query.append_pair(key, value);
    }

    let query = query.finish();
    if query.is_empty() {
        base_path.to_string()
    } else {
        format!("{base_path}?{query}")
    }
}

/// Classify a User-Agent string as a mobile embedded browser.
///
/// Only genuine embedding markers match: the Android WebView `; wv)` token,
/// and `AppleWebKit` on an iOS device without the `Safari/` product an iOS
/// WebView omits. Ordinary desktop and mobile browsers must never match; a
/// missed WebView merely falls back to the normal web flow.
#[must_use]
pub fn is_mobile_webview(user_agent: &str) -> bool {
    if user_agent.contains("; wv)") {
        return true;
    }

    let ios_device = ["iPhone", "iPad", "iPod"]
        .iter()
        .any(|device| user_agent.contains(device));

    ios_device && user_agent.contains("AppleWebKit") && !user_agent.contains("Safari/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(app_scheme: Option<&str>, redirect_url: Option<&str>) -> MobileContext {
        MobileContext {
            app_scheme: app_scheme.map(ToString::to_string),
            redirect_url: redirect_url.map(ToString::to_string),
        }
    }

    #[test]
    fn test_extract_absent_fields_are_none() {
        let extracted = extract("other=1");
        assert_eq!(extracted, MobileContext::default());
        assert!(!extracted.is_present());
    }

    #[test]
    fn test_extract_empty_values_are_none() {
        let extracted = extract("app_scheme=&redirect_url=");
        assert_eq!(extracted.app_scheme, None);
        assert_eq!(extracted.redirect_url, None);
    }

    #[test]
    fn test_extract_decodes_values() {
        let extracted = extract("app_scheme=myapp&redirect_url=https%3A%2F%2Fexample.com%2Fx");
        assert_eq!(extracted.app_scheme.as_deref(), Some("myapp"));
        assert_eq!(
            extracted.redirect_url.as_deref(),
            Some("https://example.com/x")
        );
        assert!(extracted.is_complete());
    }

    #[test]
    fn test_serialize_extract_round_trip() {
        let contexts = [
            context(None, None),
            context(Some("myapp"), None),
            context(None, Some("https://example.com/x")),
            context(Some("my-app.v2"), Some("https://example.com/path?a=1&b=two words")),
        ];

        for original in contexts {
            let url = serialize("/auth/login", &original, &[]);
            let query = url.split_once('?').map_or("", |(_, query)| query);
            assert_eq!(extract(query), original, "round trip failed for {url}");
        }
    }

    #[test]
    fn test_serialize_without_params_returns_base_path() {
        assert_eq!(
            serialize("/auth/login", &MobileContext::default(), &[]),
            "/auth/login"
        );
    }

    #[test]
    fn test_serialize_appends_extra_pairs() {
        let url = serialize("/auth/signup", &context(Some("myapp"), None), &[("next", "/x")]);
        assert_eq!(url, "/auth/signup?app_scheme=myapp&next=%2Fx");
    }

    #[test]
    fn test_validate_scheme_format() {
        assert!(validate(&context(Some("myapp"), None)).is_valid);
        assert!(validate(&context(Some("my-app.v2+beta"), None)).is_valid);

        let invalid = validate(&context(Some("my app"), None));
        assert!(!invalid.is_valid);
        assert_eq!(invalid.errors, vec!["Invalid app scheme format"]);

        assert!(!validate(&context(Some("1app"), None)).is_valid);
        assert!(!validate(&context(Some(&"a".repeat(50)), None)).is_valid);
        assert!(validate(&context(Some(&"a".repeat(49)), None)).is_valid);
    }

    #[test]
    fn test_validate_redirect_url() {
        assert!(validate(&context(None, Some("https://example.com/x"))).is_valid);

        let invalid = validate(&context(None, Some("not a url")));
        assert!(!invalid.is_valid);
        assert_eq!(invalid.errors, vec!["Invalid redirect URL format"]);

        // Relative URLs are not absolute URLs.
        assert!(!validate(&context(None, Some("/auth/callback"))).is_valid);
    }

    #[test]
    fn test_validate_absence_is_valid() {
        assert!(validate(&MobileContext::default()).is_valid);
        // One field on its own is fine; callers decide if that is enough.
        assert!(validate(&context(Some("myapp"), None)).is_valid);
        assert!(validate(&context(None, Some("https://example.com"))).is_valid);
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let validation = validate(&context(Some("my app"), Some("nope")));
        assert!(!validation.is_valid);
        assert_eq!(validation.errors.len(), 2);
    }

    #[test]
    fn test_webview_detection_android() {
        let android_webview = "Mozilla/5.0 (Linux; Android 13; Pixel 7 Build/TQ2A; wv) \
             AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/112.0.0.0 Mobile Safari/537.36";
        assert!(is_mobile_webview(android_webview));

        let android_chrome = "Mozilla/5.0 (Linux; Android 13; Pixel 7) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/112.0.0.0 Mobile Safari/537.36";
        assert!(!is_mobile_webview(android_chrome));
    }

    #[test]
    fn test_webview_detection_ios() {
        let ios_webview = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_3 like Mac OS X) \
             AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148";
        assert!(is_mobile_webview(ios_webview));

        // Mobile Safari carries the Safari/ product token and must not match.
        let mobile_safari = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_3 like Mac OS X) \
             AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Mobile/15E148 Safari/604.1";
        assert!(!is_mobile_webview(mobile_safari));
    }

    #[test]
    fn test_webview_detection_desktop_browsers() {
        let desktop_chrome = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
             AppleWebKit/537.36 (KHTML, like Gecko) Chrome/112.0.0.0 Safari/537.36";
        assert!(!is_mobile_webview(desktop_chrome));

        let firefox = "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/112.0";
        assert!(!is_mobile_webview(firefox));

        assert!(!is_mobile_webview(""));
    }
}
