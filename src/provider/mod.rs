//! Identity-provider HTTP client and session types.
//!
//! The provider is a black box with a GoTrue-compatible wire surface; the
//! bridge relays its opaque tokens and passes its error messages through
//! unmodified. A [`ProviderClient`] is constructed per request or per
//! check, never cached in process-wide state, so credentials cannot leak
//! across requests.

pub mod cookies;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::instrument;
use utoipa::ToSchema;

use crate::{config::BridgeConfig, mobile::redirect::AuthTokens, APP_USER_AGENT};

/// Identity issued by the provider. Opaque to the bridge beyond the id and
/// email surfaced to pages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Session issued by the provider: opaque access/refresh tokens plus
/// expiry. The bridge reads and relays it, never mutates or inspects its
/// content; `Debug` is redacted so the tokens cannot reach a log record.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

impl Session {
    /// Token bundle for the mobile redirect builder.
    #[must_use]
    pub fn tokens(&self) -> AuthTokens {
        AuthTokens {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// What a signup produced: the session is absent while the account waits
/// for email confirmation.
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    pub session: Option<Session>,
    pub user: Option<User>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider rejected the credentials or session. The message passes
    /// through to the caller unmodified and is never retried.
    #[error("{0}")]
    Rejected(String),

    /// The round trip to the provider failed before an answer arrived.
    /// Never retried here; callers treat it as "no answer", not "no session".
    #[error("identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with something the bridge cannot interpret.
    #[error("unexpected identity provider response: {0}")]
    Unexpected(String),
}

impl ProviderError {
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

// Signup answers arrive in two shapes: a full session when the provider
// auto-confirms, or a bare user while confirmation is pending.
#[derive(Deserialize)]
struct SignupWire {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// HTTP client for the identity provider's auth API.
pub struct ProviderClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl ProviderClient {
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be built.
    pub fn new(config: &BridgeConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/auth/v1", config.provider_url()),
            api_key: config.provider_key().clone(),
        })
    }

    /// # Errors
    ///
    /// [`ProviderError::Rejected`] with the provider's message when the
    /// credentials are wrong, [`ProviderError::Transport`] when the round
    /// trip fails.
    #[instrument(skip_all)]
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, ProviderError> {
        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .query(&[("grant_type", "password")])
            .header("apikey", self.api_key.expose_secret())
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        Self::session_from(response).await
    }

    /// Register a new account. `email_redirect_to` is where the
    /// confirmation email lands the user.
    ///
    /// # Errors
    ///
    /// [`ProviderError::Rejected`] when the provider refuses the signup.
    #[instrument(skip_all)]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        email_redirect_to: &str,
    ) -> Result<SignupOutcome, ProviderError> {
        let response = self
            .http
            .post(format!("{}/signup", self.base_url))
            .query(&[("redirect_to", email_redirect_to)])
            .header("apikey", self.api_key.expose_secret())
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let wire: SignupWire = response
            .json()
            .await
            .map_err(|err| ProviderError::Unexpected(err.to_string()))?;

        Ok(signup_outcome(wire))
    }

    /// Exchange a refresh token for a fresh session.
    ///
    /// # Errors
    ///
    /// [`ProviderError::Rejected`] when the refresh token is stale.
    #[instrument(skip_all)]
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, ProviderError> {
        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", self.api_key.expose_secret())
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        Self::session_from(response).await
    }

    /// Resolve an access token to its user.
    ///
    /// # Errors
    ///
    /// [`ProviderError::Rejected`] when the token is invalid or expired.
    #[instrument(skip_all)]
    pub async fn get_user(&self, access_token: &str) -> Result<User, ProviderError> {
        let response = self
            .http
            .get(format!("{}/user", self.base_url))
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|err| ProviderError::Unexpected(err.to_string()))
        } else {
            Err(Self::rejection(response).await)
        }
    }

    async fn session_from(response: reqwest::Response) -> Result<Session, ProviderError> {
        if response.status().is_success() {
            response
                .json()
                .await
                .map_err(|err| ProviderError::Unexpected(err.to_string()))
        } else {
            Err(Self::rejection(response).await)
        }
    }

    async fn rejection(response: reqwest::Response) -> ProviderError {
        let status = response.status();
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| rejection_message(&body))
            .unwrap_or_else(|| format!("identity provider returned {status}"));

        if status.is_client_error() {
            ProviderError::Rejected(message)
        } else {
            ProviderError::Unexpected(message)
        }
    }
}

fn signup_outcome(wire: SignupWire) -> SignupOutcome {
    match (wire.access_token, wire.refresh_token) {
        (Some(access_token), Some(refresh_token)) => {
            let user = wire.user.clone();
            SignupOutcome {
                session: Some(Session {
                    access_token,
                    refresh_token,
                    expires_at: wire.expires_at,
                    user: wire.user,
                }),
                user,
            }
        }
        _ => SignupOutcome {
            session: None,
            user: wire
                .user
                .or_else(|| wire.id.map(|id| User { id, email: wire.email })),
        },
    }
}

// Provider error bodies vary; take the first message-bearing field.
fn rejection_message(body: &serde_json::Value) -> Option<String> {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| body.get(key))
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
}
