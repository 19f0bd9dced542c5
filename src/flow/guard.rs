//! Per-page auth guard.
//!
//! Mirrors the gate's decision table on the client so a page whose session
//! disappears mid-visit (sign-out in another tab, expired refresh) bounces
//! the user without waiting for the next full page load. The guard never
//! renders protected content before the session check answers.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, error};

use super::{AuthEvent, FlowHandle, NavigationTarget, Navigator, SessionSource};
use crate::mobile::params::MobileContext;
use crate::mobile::redirect::build_web_url;
use crate::policy::{self, PathClass};

/// What the guarded page needs from the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardRequirement {
    /// Protected content: a session must exist.
    RequireSession,
    /// Auth entry pages: an existing session means the user does not belong
    /// here.
    RequireAnonymous,
}

impl GuardRequirement {
    #[must_use]
    pub const fn satisfied_by(self, authenticated: bool) -> bool {
        match self {
            Self::RequireSession => authenticated,
            Self::RequireAnonymous => !authenticated,
        }
    }

    // The policy class this requirement corresponds to; keeps guard
    // redirects and gate redirects on the same decision table.
    const fn path_class(self) -> PathClass {
        match self {
            Self::RequireSession => PathClass::ProtectedPage,
            Self::RequireAnonymous => PathClass::AuthEntryPage,
        }
    }
}

/// Observable guard state. Pages render nothing while `Loading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Loading,
    Ready { authenticated: bool },
}

impl GuardState {
    /// Whether the guarded content may be shown.
    #[must_use]
    pub const fn should_render(self, requirement: GuardRequirement) -> bool {
        match self {
            Self::Loading => false,
            Self::Ready { authenticated } => requirement.satisfied_by(authenticated),
        }
    }
}

/// The guard flow. One instance watches one mounted page.
pub struct AuthGuard<S, N> {
    source: Arc<S>,
    navigator: Arc<N>,
    requirement: GuardRequirement,
    mobile: MobileContext,
    redirect_to: Option<String>,
}

impl<S: SessionSource, N: Navigator> AuthGuard<S, N> {
    #[must_use]
    pub const fn new(
        source: Arc<S>,
        navigator: Arc<N>,
        requirement: GuardRequirement,
        mobile: MobileContext,
    ) -> Self {
        Self {
            source,
            navigator,
            requirement,
            mobile,
            redirect_to: None,
        }
    }

    /// Override where an unsatisfied `RequireSession` guard sends the user
    /// instead of the login page.
    #[must_use]
    pub fn with_redirect_to(mut self, path: impl Into<String>) -> Self {
        self.redirect_to = Some(path.into());
        self
    }

    /// Start the guard. It checks the session once, then keeps reacting to
    /// sign-in/sign-out events until the handle is dropped or the event
    /// channel closes.
    #[must_use]
    pub fn spawn(self, events: broadcast::Receiver<AuthEvent>) -> (watch::Receiver<GuardState>, FlowHandle) {
        let (tx, rx) = watch::channel(GuardState::Loading);
        let task = tokio::spawn(self.run(tx, events));
        (rx, FlowHandle::new(task))
    }

    async fn run(self, state: watch::Sender<GuardState>, mut events: broadcast::Receiver<AuthEvent>) {
        let mut authenticated = match self.source.current_session().await {
            Ok(session) => session.is_some(),
            Err(err) => {
                // Unknown is rendered as unauthenticated; the gate still
                // holds the real line server-side.
                error!("Guard session check failed: {err}");
                false
            }
        };

        let _ = state.send(GuardState::Ready { authenticated });
        self.redirect_if_needed(authenticated);

        loop {
            match events.recv().await {
                Ok(event) => {
                    authenticated = matches!(event, AuthEvent::SignedIn);
                    let _ = state.send(GuardState::Ready { authenticated });
                    self.redirect_if_needed(authenticated);
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    debug!("Guard missed {missed} auth events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    fn redirect_if_needed(&self, authenticated: bool) {
        if self.requirement.satisfied_by(authenticated) {
            return;
        }

        let decision = policy::decide(self.requirement.path_class(), authenticated, &self.mobile);
        let location = match (&self.redirect_to, self.requirement) {
            (Some(custom), GuardRequirement::RequireSession) => {
                build_web_url(custom, &self.mobile, &[])
            }
            _ => match decision.redirect_path() {
                Some(path) => path,
                None => return,
            },
        };

        self.navigator.navigate(NavigationTarget::Web(location));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::testing::{session, FailingSource, RecordingNavigator, StaticSource};
    use std::time::Duration;

    fn mobile(app_scheme: Option<&str>) -> MobileContext {
        MobileContext {
            app_scheme: app_scheme.map(ToString::to_string),
            redirect_url: None,
        }
    }

    fn guard(
        session: Option<crate::provider::Session>,
        navigator: &Arc<RecordingNavigator>,
        requirement: GuardRequirement,
        mobile: MobileContext,
    ) -> AuthGuard<StaticSource, RecordingNavigator> {
        AuthGuard::new(
            Arc::new(StaticSource { session }),
            navigator.clone(),
            requirement,
            mobile,
        )
    }

    async fn ready(rx: &mut watch::Receiver<GuardState>) -> GuardState {
        rx.wait_for(|state| *state != GuardState::Loading)
            .await
            .map(|state| *state)
            .unwrap()
    }

    #[test]
    fn test_should_render() {
        let require_session = GuardRequirement::RequireSession;
        assert!(!GuardState::Loading.should_render(require_session));
        assert!(GuardState::Ready { authenticated: true }.should_render(require_session));
        assert!(!GuardState::Ready { authenticated: false }.should_render(require_session));

        let require_anonymous = GuardRequirement::RequireAnonymous;
        assert!(GuardState::Ready { authenticated: false }.should_render(require_anonymous));
        assert!(!GuardState::Ready { authenticated: true }.should_render(require_anonymous));
    }

    #[tokio::test]
    async fn test_require_session_without_session_redirects_to_login() {
        let navigator = Arc::new(RecordingNavigator::default());
        let (events_tx, events) = broadcast::channel(4);
        let (mut rx, _handle) = guard(
            None,
            &navigator,
            GuardRequirement::RequireSession,
            mobile(Some("myapp")),
        )
        .spawn(events);

        assert_eq!(ready(&mut rx).await, GuardState::Ready { authenticated: false });
        assert_eq!(
            navigator.recorded(),
            vec![NavigationTarget::Web("/auth/login?app_scheme=myapp".to_string())]
        );
        drop(events_tx);
    }

    #[tokio::test]
    async fn test_require_anonymous_with_session_and_scheme_goes_to_mobile_success() {
        // Same destination the gate would pick for this navigation.
        let navigator = Arc::new(RecordingNavigator::default());
        let (events_tx, events) = broadcast::channel(4);
        let (mut rx, _handle) = guard(
            Some(session()),
            &navigator,
            GuardRequirement::RequireAnonymous,
            mobile(Some("myapp")),
        )
        .spawn(events);

        assert_eq!(ready(&mut rx).await, GuardState::Ready { authenticated: true });
        assert_eq!(
            navigator.recorded(),
            vec![NavigationTarget::Web(
                "/auth/mobile-success?app_scheme=myapp".to_string()
            )]
        );
        drop(events_tx);
    }

    #[tokio::test]
    async fn test_satisfied_guard_never_navigates() {
        let navigator = Arc::new(RecordingNavigator::default());
        let (events_tx, events) = broadcast::channel(4);
        let (mut rx, _handle) = guard(
            Some(session()),
            &navigator,
            GuardRequirement::RequireSession,
            MobileContext::default(),
        )
        .spawn(events);

        assert_eq!(ready(&mut rx).await, GuardState::Ready { authenticated: true });
        assert!(navigator.recorded().is_empty());
        drop(events_tx);
    }

    #[tokio::test]
    async fn test_redirect_to_override_keeps_mobile_context() {
        let navigator = Arc::new(RecordingNavigator::default());
        let (events_tx, events) = broadcast::channel(4);
        let (mut rx, _handle) = guard(
            None,
            &navigator,
            GuardRequirement::RequireSession,
            mobile(Some("myapp")),
        )
        .with_redirect_to("/auth/signup")
        .spawn(events);

        ready(&mut rx).await;
        assert_eq!(
            navigator.recorded(),
            vec![NavigationTarget::Web("/auth/signup?app_scheme=myapp".to_string())]
        );
        drop(events_tx);
    }

    #[tokio::test]
    async fn test_sign_out_event_bounces_a_protected_page() {
        let navigator = Arc::new(RecordingNavigator::default());
        let (events_tx, events) = broadcast::channel(4);
        let (mut rx, _handle) = guard(
            Some(session()),
            &navigator,
            GuardRequirement::RequireSession,
            MobileContext::default(),
        )
        .spawn(events);

        assert_eq!(ready(&mut rx).await, GuardState::Ready { authenticated: true });

        events_tx.send(AuthEvent::SignedOut).unwrap();
        rx.wait_for(|state| *state == GuardState::Ready { authenticated: false })
            .await
            .unwrap();

        assert_eq!(
            navigator.recorded(),
            vec![NavigationTarget::Web("/auth/login".to_string())]
        );
    }

    #[tokio::test]
    async fn test_failed_check_is_rendered_as_unauthenticated() {
        let navigator = Arc::new(RecordingNavigator::default());
        let (events_tx, events) = broadcast::channel(4);
        let (mut rx, _handle) = AuthGuard::new(
            Arc::new(FailingSource),
            navigator.clone(),
            GuardRequirement::RequireSession,
            MobileContext::default(),
        )
        .spawn(events);

        assert_eq!(ready(&mut rx).await, GuardState::Ready { authenticated: false });
        assert_eq!(
            navigator.recorded(),
            vec![NavigationTarget::Web("/auth/login".to_string())]
        );
        drop(events_tx);
    }

    #[tokio::test]
    async fn test_dropped_handle_stops_reacting_to_events() {
        let navigator = Arc::new(RecordingNavigator::default());
        let (events_tx, events) = broadcast::channel(4);
        let (mut rx, handle) = guard(
            Some(session()),
            &navigator,
            GuardRequirement::RequireSession,
            MobileContext::default(),
        )
        .spawn(events);

        ready(&mut rx).await;
        drop(handle);

        let _ = events_tx.send(AuthEvent::SignedOut);
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(navigator.recorded().is_empty());
    }
}
