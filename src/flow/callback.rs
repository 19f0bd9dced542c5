//! Callback-page state machine.
//!
//! Runs once when the provider lands the user back on `/auth/callback` and
//! decides between three exits: hand the tokens to the native app, continue
//! to the dashboard, or return to login. Exactly one navigation happens per
//! run, and none at all once the handle is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, warn};

use super::{FlowHandle, NavigationTarget, Navigator, SessionSource};
use crate::mobile::params::{self, MobileContext};
use crate::mobile::redirect::build_app_redirect;
use crate::policy::{DASHBOARD_PATH, LOGIN_PATH};

/// Observable state of the callback flow. `Failed` is terminal only after
/// its delayed bounce back to login fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackState {
    Checking,
    HandoffToMobile,
    GoToDashboard,
    GoToLogin,
    Failed(String),
}

const HANDOFF_DELAY: Duration = Duration::from_millis(100);
const FAILURE_DELAY: Duration = Duration::from_secs(3);

/// The callback flow. One instance drives one landing on the callback page.
pub struct CallbackFlow<S, N> {
    source: Arc<S>,
    navigator: Arc<N>,
    mobile: MobileContext,
    handoff_delay: Duration,
    failure_delay: Duration,
}

impl<S: SessionSource, N: Navigator> CallbackFlow<S, N> {
    #[must_use]
    pub fn new(source: Arc<S>, navigator: Arc<N>, mobile: MobileContext) -> Self {
        Self {
            source,
            navigator,
            mobile,
            handoff_delay: HANDOFF_DELAY,
            failure_delay: FAILURE_DELAY,
        }
    }

    /// Override the pauses before hand-off and after failure. Tests shrink
    /// them; production keeps the defaults.
    #[must_use]
    pub const fn with_delays(mut self, handoff: Duration, failure: Duration) -> Self {
        self.handoff_delay = handoff;
        self.failure_delay = failure;
        self
    }

    /// Start the flow. The watch receiver observes state transitions;
    /// dropping the handle stops the flow before its navigation fires.
    #[must_use]
    pub fn spawn(self) -> (watch::Receiver<CallbackState>, FlowHandle) {
        let (tx, rx) = watch::channel(CallbackState::Checking);
        let task = tokio::spawn(self.run(tx));
        (rx, FlowHandle::new(task))
    }

    async fn run(self, state: watch::Sender<CallbackState>) {
        // Malformed hand-off parameters are reported but do not block the
        // web flow; the session check still decides the exit.
        let validation = params::validate(&self.mobile);
        if !validation.is_valid {
            warn!("Invalid mobile parameters: {}", validation.errors.join(", "));
        }

        let session = match self.source.current_session().await {
            Ok(session) => session,
            Err(err) => {
                error!("Callback session check failed: {err}");
                self.fail(&state, "Authentication failed. Please try again.")
                    .await;
                return;
            }
        };

        match session {
            Some(session) if self.mobile.is_complete() && validation.is_valid => {
                let app_scheme = self.mobile.app_scheme.as_deref().unwrap_or_default();
                match build_app_redirect(
                    app_scheme,
                    &session.tokens(),
                    self.mobile.redirect_url.as_deref(),
                ) {
                    Ok(url) => {
                        let _ = state.send(CallbackState::HandoffToMobile);
                        // Give the page a beat to render the hand-off notice
                        // before leaving the web context.
                        tokio::time::sleep(self.handoff_delay).await;
                        self.navigator.navigate(NavigationTarget::App(url));
                    }
                    Err(err) => {
                        error!("Mobile hand-off failed: {err}");
                        self.fail(&state, "Could not return to the app.").await;
                    }
                }
            }
            Some(_) => {
                let _ = state.send(CallbackState::GoToDashboard);
                self.navigator
                    .navigate(NavigationTarget::Web(DASHBOARD_PATH.to_string()));
            }
            None => {
                let _ = state.send(CallbackState::GoToLogin);
                self.navigator.navigate(NavigationTarget::Web(params::serialize(
                    LOGIN_PATH,
                    &self.mobile,
                    &[],
                )));
            }
        }
    }

    // Failure shows its message for a while, then returns to login with the
    // mobile context intact so the user can retry from the app.
    async fn fail(&self, state: &watch::Sender<CallbackState>, message: &str) {
        let _ = state.send(CallbackState::Failed(message.to_string()));
        tokio::time::sleep(self.failure_delay).await;
        self.navigator.navigate(NavigationTarget::Web(params::serialize(
            LOGIN_PATH,
            &self.mobile,
            &[],
        )));
    }
}
