//! Mobile hand-off: parameter codec, WebView detection, redirect building.

pub mod params;
pub mod redirect;

pub use self::params::{extract, is_mobile_webview, validate, MobileContext};
pub use self::redirect::{build_app_redirect, build_web_url, AuthTokens};
