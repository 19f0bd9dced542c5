//! Thin HTML pages.
//!
//! The bridge is not a UI project; these pages exist so every gate
//! redirect lands on a real route and so the hand-off pages have a place
//! to run. Mobile parameters are re-serialized onto every cross-page link
//! so the context survives the whole login chain.

use axum::{
    extract::RawQuery,
    http::header::USER_AGENT,
    http::HeaderMap,
    response::Html,
};

use crate::mobile::{params, redirect::build_web_url};
use crate::policy::{DASHBOARD_PATH, LOGIN_PATH};

pub async fn index() -> Html<String> {
    Html(page(
        "Welcome",
        &format!(r#"<p><a href="{LOGIN_PATH}">Sign in</a> or <a href="{DASHBOARD_PATH}">go to your dashboard</a>.</p>"#),
    ))
}

/// Login page. The signup link keeps the mobile parameters, and the markup
/// flags WebView navigations so a shell can adjust its chrome.
pub async fn login(headers: HeaderMap, RawQuery(query): RawQuery) -> Html<String> {
    let mobile = params::extract(query.as_deref().unwrap_or(""));
    let webview = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map_or(false, params::is_mobile_webview);

    let signup_href = build_web_url("/auth/signup", &mobile, &[]);
    let body = format!(
        r#"<main data-webview="{webview}">
<form method="post" action="/api/auth/login">
<input type="email" name="email" placeholder="Email" required>
<input type="password" name="password" placeholder="Password" required>
<button type="submit">Sign in</button>
</form>
<p>No account? <a href="{}">Sign up</a></p>
</main>"#,
        escape_html(&signup_href)
    );

    Html(page("Sign in", &body))
}

pub async fn signup(RawQuery(query): RawQuery) -> Html<String> {
    let mobile = params::extract(query.as_deref().unwrap_or(""));
    let login_href = build_web_url(LOGIN_PATH, &mobile, &[]);
    let body = format!(
        r#"<form method="post" action="/api/auth/signup">
<input type="email" name="email" placeholder="Email" required>
<input type="password" name="password" placeholder="Password (6+ characters)" required>
<button type="submit">Create account</button>
</form>
<p>Already registered? <a href="{}">Sign in</a></p>"#,
        escape_html(&login_href)
    );

    Html(page("Create account", &body))
}

pub async fn signup_success() -> Html<String> {
    Html(page(
        "Check your email",
        "<p>Account created. Follow the confirmation link we sent you to finish signing up.</p>",
    ))
}

/// Landing spot after the provider round trip. The actual decision logic
/// runs in [`crate::flow::callback`]; this page only hosts it.
pub async fn callback() -> Html<String> {
    Html(page(
        "Signing you in",
        "<p>Completing authentication&hellip;</p>",
    ))
}

pub async fn mobile_success() -> Html<String> {
    Html(page(
        "Signed in",
        "<p>You are signed in. Returning you to the app&hellip;</p>",
    ))
}

/// Renders provider error parameters. Both values are attacker-supplied
/// query strings and are escaped before they touch the markup.
pub async fn auth_error(RawQuery(query): RawQuery) -> Html<String> {
    let mut error = None;
    let mut description = None;

    for (key, value) in url::form_urlencoded::parse(query.as_deref().unwrap_or("").as_bytes()) {
        match key.as_ref() {
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    let body = format!(
        r#"<p>Something went wrong: {}</p>
<p>{}</p>
<p><a href="{LOGIN_PATH}">Back to sign in</a></p>"#,
        escape_html(error.as_deref().unwrap_or("unknown error")),
        escape_html(description.as_deref().unwrap_or("")),
    );

    Html(page("Authentication error", &body))
}

pub async fn dashboard() -> Html<String> {
    Html(page("Dashboard", "<p>You are signed in.</p>"))
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
<h1>{title}</h1>
{body}
</body>
</html>"#
    )
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
