//! Client-side flow mirrors of the gate's policy.
//!
//! These state machines drive the callback page and the per-page auth
//! guard. They are framework-agnostic: session lookups and navigations go
//! through the [`SessionSource`] and [`Navigator`] seams, state changes are
//! published on `tokio::sync::watch` channels, and dropping the returned
//! [`FlowHandle`] aborts the task so a torn-down page can never navigate.

pub mod callback;
pub mod guard;

use std::future::Future;
use std::pin::Pin;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::BridgeConfig;
use crate::mobile::redirect::AuthTokens;
use crate::provider::{ProviderClient, ProviderError, Session};

/// Session lifecycle notifications the guard reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
}

/// Where a flow decided to send the user.
#[derive(Clone, PartialEq, Eq)]
pub enum NavigationTarget {
    /// In-site path, possibly carrying mobile hand-off parameters.
    Web(String),
    /// Custom-scheme deep link. Carries tokens, so `Debug` hides the URL.
    App(String),
}

impl std::fmt::Debug for NavigationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Web(path) => f.debug_tuple("Web").field(path).finish(),
            Self::App(_) => f.debug_tuple("App").field(&"[REDACTED]").finish(),
        }
    }
}

/// Seam for "who is signed in right now".
pub trait SessionSource: Send + Sync + 'static {
    /// `Ok(None)` means "definitely signed out"; an error means the answer
    /// is unknown and must not be treated as signed out.
    fn current_session(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Session>, ProviderError>> + Send + '_>>;
}

/// Seam for performing navigations.
pub trait Navigator: Send + Sync + 'static {
    fn navigate(&self, target: NavigationTarget);
}

/// Session source backed by the identity provider. Built per check with the
/// tokens the caller currently holds.
pub struct ProviderSessionSource {
    config: BridgeConfig,
    tokens: AuthTokens,
}

impl ProviderSessionSource {
    #[must_use]
    pub const fn new(config: BridgeConfig, tokens: AuthTokens) -> Self {
        Self { config, tokens }
    }
}

impl SessionSource for ProviderSessionSource {
    fn current_session(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Session>, ProviderError>> + Send + '_>> {
        Box::pin(async move {
            let client = ProviderClient::new(&self.config)?;
            match client.get_user(&self.tokens.access_token).await {
                Ok(user) => Ok(Some(Session {
                    access_token: self.tokens.access_token.clone(),
                    refresh_token: self.tokens.refresh_token.clone(),
                    expires_at: self.tokens.expires_at,
                    user: Some(user),
                })),
                Err(err) if err.is_transport() => Err(err),
                Err(err) => {
                    debug!("No current session: {err}");
                    Ok(None)
                }
            }
        })
    }
}

/// Owner of a running flow task. Dropping the handle aborts the task, so
/// nothing runs (and nothing navigates) after the owning page is gone.
pub struct FlowHandle {
    task: Option<JoinHandle<()>>,
}

impl FlowHandle {
    fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// Wait for the flow to run to completion. Used in tests and anywhere
    /// the caller wants the terminal state rather than early teardown.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for FlowHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
