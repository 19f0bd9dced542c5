//! Token-handling API endpoints.
//!
//! Each handler talks to the identity provider through a client built for
//! that one request, relays the provider's error messages unmodified, and
//! sets the session cookies on success so the next page load passes the
//! gate without another login.

use axum::{
    extract::{Extension, RawQuery},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use super::ErrorResponse;
use crate::config::BridgeConfig;
use crate::gate::CurrentSession;
use crate::mobile::{params, redirect::build_app_redirect};
use crate::provider::{cookies, ProviderClient, ProviderError, Session, User};

// No Debug derive: the password must not be printable.
#[derive(ToSchema, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(ToSchema, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Where the confirmation email lands the user; defaults to the site's
    /// callback page.
    #[serde(default, rename = "redirectUrl")]
    pub redirect_url: Option<String>,
}

// No Debug derive: the refresh token must not be printable.
#[derive(ToSchema, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Success body shared by login, signup, and refresh.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserResponse {
    pub user: User,
    /// Always null: profile storage is not part of the bridge.
    pub profile: Option<serde_json::Value>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MobileCallbackResponse {
    #[serde(rename = "redirectUrl")]
    pub redirect_url: String,
    pub session: Session,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in, session cookies set", body = AuthResponse),
        (status = 400, description = "Missing email or password", body = ErrorResponse),
        (status = 401, description = "Provider rejected the credentials", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(config): Extension<BridgeConfig>,
    Json(payload): Json<LoginRequest>,
) -> Response {
    let (Some(email), Some(password)) = (
        non_empty(payload.email.as_deref()),
        non_empty(payload.password.as_deref()),
    ) else {
        return bad_request("Email and password are required");
    };

    let client = match ProviderClient::new(&config) {
        Ok(client) => client,
        Err(err) => return internal_error(&err),
    };

    match client.sign_in_with_password(email, password).await {
        Ok(session) => {
            let headers = session_cookie_headers(&session, config.session_cookie_secure());
            (
                StatusCode::OK,
                headers,
                Json(AuthResponse {
                    message: "Login successful".to_string(),
                    user: session.user.clone(),
                    session: Some(session),
                }),
            )
                .into_response()
        }
        Err(ProviderError::Rejected(message)) => {
            (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(message))).into_response()
        }
        Err(err) => internal_error(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account created; session may be pending email confirmation", body = AuthResponse),
        (status = 400, description = "Invalid input or provider rejection", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn signup(
    Extension(config): Extension<BridgeConfig>,
    Json(payload): Json<SignupRequest>,
) -> Response {
    let (Some(email), Some(password)) = (
        non_empty(payload.email.as_deref()),
        non_empty(payload.password.as_deref()),
    ) else {
        return bad_request("Email and password are required");
    };

    if password.len() < 6 {
        return bad_request("Password must be at least 6 characters long");
    }

    let email_redirect = payload
        .redirect_url
        .clone()
        .unwrap_or_else(|| config.default_email_redirect());

    let client = match ProviderClient::new(&config) {
        Ok(client) => client,
        Err(err) => return internal_error(&err),
    };

    match client.sign_up(email, password, &email_redirect).await {
        Ok(outcome) => {
            // Cookies only when the provider auto-confirmed and issued a
            // session; a pending signup has nothing to set.
            let headers = outcome.session.as_ref().map_or_else(HeaderMap::new, |session| {
                session_cookie_headers(session, config.session_cookie_secure())
            });
            (
                StatusCode::OK,
                headers,
                Json(AuthResponse {
                    message: "Signup successful. Please check your email for confirmation."
                        .to_string(),
                    user: outcome.user,
                    session: outcome.session,
                }),
            )
                .into_response()
        }
        Err(ProviderError::Rejected(message)) => bad_request(&message),
        Err(err) => internal_error(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Session refreshed, cookies rotated", body = AuthResponse),
        (status = 400, description = "No refresh token supplied", body = ErrorResponse),
        (status = 401, description = "Provider rejected the refresh token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    Extension(config): Extension<BridgeConfig>,
    headers: HeaderMap,
    payload: Option<Json<RefreshRequest>>,
) -> Response {
    // Body first, cookie as fallback.
    let from_body = payload.and_then(|Json(body)| body.refresh_token);
    let refresh_token = match from_body.or_else(|| cookies::extract_tokens(&headers).1) {
        Some(token) => token,
        None => return bad_request("Refresh token is required"),
    };

    let client = match ProviderClient::new(&config) {
        Ok(client) => client,
        Err(err) => return internal_error(&err),
    };

    match client.refresh_session(&refresh_token).await {
        Ok(session) => {
            let headers = session_cookie_headers(&session, config.session_cookie_secure());
            (
                StatusCode::OK,
                headers,
                Json(AuthResponse {
                    message: "Token refreshed successfully".to_string(),
                    user: session.user.clone(),
                    session: Some(session),
                }),
            )
                .into_response()
        }
        Err(ProviderError::Rejected(message)) => {
            (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(message))).into_response()
        }
        Err(err) => internal_error(&err),
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/user",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "No authenticated user", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn user(current: Option<Extension<CurrentSession>>) -> Response {
    let user = current
        .and_then(|Extension(CurrentSession(session))| session)
        .and_then(|session| session.user);

    match user {
        Some(user) => (StatusCode::OK, Json(UserResponse { user, profile: None })).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("No authenticated user")),
        )
            .into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/mobile-callback",
    params(
        ("app_scheme" = String, Query, description = "Custom URL scheme of the calling app"),
        ("redirect_url" = Option<String>, Query, description = "Where the app resumes after the hand-off")
    ),
    responses(
        (status = 200, description = "Deep link carrying the session tokens", body = MobileCallbackResponse),
        (status = 400, description = "Missing or malformed mobile parameters", body = ErrorResponse),
        (status = 401, description = "No active session", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn mobile_callback(
    current: Option<Extension<CurrentSession>>,
    RawQuery(query): RawQuery,
) -> Response {
    let Some(session) = current.and_then(|Extension(CurrentSession(session))| session) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("No active session")),
        )
            .into_response();
    };

    let mobile = params::extract(query.as_deref().unwrap_or(""));
    let Some(app_scheme) = mobile.app_scheme.as_deref() else {
        return bad_request("App scheme is required");
    };

    let validation = params::validate(&mobile);
    if !validation.is_valid {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_details(
                "Invalid mobile parameters",
                validation.errors,
            )),
        )
            .into_response();
    }

    match build_app_redirect(app_scheme, &session.tokens(), mobile.redirect_url.as_deref()) {
        Ok(redirect_url) => (
            StatusCode::OK,
            Json(MobileCallbackResponse {
                redirect_url,
                user: session.user.clone(),
                session,
            }),
        )
            .into_response(),
        Err(err) => internal_error(&err),
    }
}

fn session_cookie_headers(session: &Session, secure: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match cookies::session_cookies(session, secure) {
        Ok(values) => {
            for value in values {
                headers.append(SET_COOKIE, value);
            }
        }
        Err(err) => error!("Failed to build session cookies: {err}"),
    }
    headers
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
}

fn internal_error(err: &dyn std::error::Error) -> Response {
    error!("Internal server error: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Internal server error")),
    )
        .into_response()
}
