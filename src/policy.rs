//! Shared path classification and gate decisions.
//!
//! Both the edge middleware ([`crate::gate`]) and the client flows
//! ([`crate::flow`]) import these functions, so the two layers can never
//! disagree about which paths require a session or where a redirect lands.

use crate::mobile::params::MobileContext;
use crate::mobile::redirect::build_web_url;

pub const LOGIN_PATH: &str = "/auth/login";
pub const DASHBOARD_PATH: &str = "/dashboard";
pub const MOBILE_SUCCESS_PATH: &str = "/auth/mobile-success";

const AUTH_ENTRY_PAGES: &[&str] = &["/auth/login", "/auth/signup"];

const PUBLIC_PAGES: &[&str] = &[
    "/auth/login",
    "/auth/signup",
    "/auth/signup-success",
    "/auth/callback",
    "/auth/mobile-success",
    "/auth/error",
];

const PUBLIC_APIS: &[&str] = &[
    "/api/auth/login",
    "/api/auth/signup",
    "/api/auth/refresh",
    "/api/health",
];

/// Where a request path falls in the public/protected split. Computed fresh
/// per request, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Public,
    ProtectedPage,
    AuthEntryPage,
    PublicApi,
    ProtectedApi,
}

impl PathClass {
    #[must_use]
    pub const fn is_api(self) -> bool {
        matches!(self, Self::PublicApi | Self::ProtectedApi)
    }
}

/// What the gate does with a request once path, session, and mobile context
/// are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectToLogin(MobileContext),
    RedirectToDashboardOrMobileSuccess(MobileContext),
    Unauthorized,
}

// A prefix only matches on a segment boundary, so "/auth/signup" cannot
// swallow "/auth/signup-success".
fn matches_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .map_or(false, |rest| rest.is_empty() || rest.starts_with('/'))
}

/// Classify a request path. Unknown API paths are protected, unknown page
/// paths are protected, and `/` is public by exact match only: treating it
/// as a prefix would make every path public.
#[must_use]
pub fn classify(path: &str) -> PathClass {
    if matches_prefix(path, "/api") {
        if PUBLIC_APIS.iter().any(|prefix| matches_prefix(path, prefix)) {
            PathClass::PublicApi
        } else {
            PathClass::ProtectedApi
        }
    } else if path == "/" {
        PathClass::Public
    } else if AUTH_ENTRY_PAGES
        .iter()
        .any(|prefix| matches_prefix(path, prefix))
    {
        PathClass::AuthEntryPage
    } else if PUBLIC_PAGES
        .iter()
        .any(|prefix| matches_prefix(path, prefix))
    {
        PathClass::Public
    } else {
        PathClass::ProtectedPage
    }
}

/// The gate decision table, first match wins:
///
/// * a protected API without a session is rejected with 401, never redirected
/// * other API paths pass through, the handlers own finer-grained checks
/// * a page that needs a session bounces to login, mobile context intact
/// * an auth entry page with a live session bounces to the dashboard, or to
///   the mobile-success page when the navigation carries an app scheme
#[must_use]
pub fn decide(class: PathClass, session_present: bool, mobile: &MobileContext) -> GateDecision {
    match class {
        PathClass::ProtectedApi if !session_present => GateDecision::Unauthorized,
        PathClass::PublicApi | PathClass::ProtectedApi => GateDecision::Allow,
        PathClass::ProtectedPage if !session_present => {
            GateDecision::RedirectToLogin(mobile.clone())
        }
        PathClass::AuthEntryPage if session_present => {
            GateDecision::RedirectToDashboardOrMobileSuccess(mobile.clone())
        }
        PathClass::Public | PathClass::AuthEntryPage | PathClass::ProtectedPage => {
            GateDecision::Allow
        }
    }
}

impl GateDecision {
    /// Web location a redirect decision resolves to; `None` for `Allow` and
    /// `Unauthorized`. The login target keeps the mobile context alive; the
    /// dashboard discards it, since with a session already established any
    /// further hand-off happens at the callback step, not here.
    #[must_use]
    pub fn redirect_path(&self) -> Option<String> {
        match self {
            Self::Allow | Self::Unauthorized => None,
            Self::RedirectToLogin(mobile) => Some(build_web_url(LOGIN_PATH, mobile, &[])),
            Self::RedirectToDashboardOrMobileSuccess(mobile) => {
                if mobile.app_scheme.is_some() {
                    Some(build_web_url(MOBILE_SUCCESS_PATH, mobile, &[]))
                } else {
                    Some(DASHBOARD_PATH.to_string())
                }
            }
        }
    }
}
