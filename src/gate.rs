//! Session Gate: Tower middleware that runs before every page and API
//! handler.
//!
//! Per request it resolves the caller's session against the identity
//! provider, classifies the path through [`crate::policy`], and either
//! passes the request through, redirects (preserving mobile context), or
//! answers 401. Any `Set-Cookie` values produced while resolving the
//! session ride on *every* response shape; dropping them would silently
//! truncate the user's session on the next request.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{
    header::{LOCATION, SET_COOKIE},
    HeaderMap, HeaderValue, Request, StatusCode,
};
use axum::response::{IntoResponse, Json, Response};
use tower::{Layer, Service};
use tracing::{debug, error};

use crate::config::BridgeConfig;
use crate::mobile::params;
use crate::policy::{self, GateDecision};
use crate::provider::{cookies, ProviderClient, Session};

/// What one session lookup produced: the session, if any, plus the
/// `Set-Cookie` values that must ride on whichever response the gate sends.
#[derive(Debug, Default)]
pub struct ResolvedSession {
    pub session: Option<Session>,
    pub set_cookies: Vec<HeaderValue>,
}

/// Seam between the gate and the identity provider. Production uses
/// [`ProviderSessionResolver`]; tests plug in canned sessions.
pub trait SessionResolver: Send + Sync + 'static {
    fn resolve<'a>(
        &'a self,
        headers: &'a HeaderMap,
    ) -> Pin<Box<dyn Future<Output = ResolvedSession> + Send + 'a>>;
}

/// Session resolved by the gate, inserted into request extensions so
/// handlers reuse the lookup instead of making a second provider round
/// trip.
#[derive(Clone, Debug)]
pub struct CurrentSession(pub Option<Session>);

/// Resolver that validates the session cookies against the identity
/// provider, refreshing them when the access token has gone stale.
pub struct ProviderSessionResolver {
    config: BridgeConfig,
}

impl ProviderSessionResolver {
    #[must_use]
    pub const fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    async fn lookup(&self, headers: &HeaderMap) -> ResolvedSession {
        let (access, refresh) = cookies::extract_tokens(headers);
        if access.is_none() && refresh.is_none() {
            return ResolvedSession::default();
        }

        // Fresh client per request; a shared one could leak credentials
        // across requests.
        let client = match ProviderClient::new(&self.config) {
            Ok(client) => client,
            Err(err) => {
                error!("Failed to build provider client: {err}");
                return ResolvedSession::default();
            }
        };

        if let Some(access_token) = &access {
            match client.get_user(access_token).await {
                Ok(user) => {
                    return ResolvedSession {
                        session: Some(Session {
                            access_token: access_token.clone(),
                            refresh_token: refresh.unwrap_or_default(),
                            expires_at: None,
                            user: Some(user),
                        }),
                        set_cookies: Vec::new(),
                    };
                }
                Err(err) if err.is_transport() => {
                    // Never destroy a session over a transient failure.
                    error!("Session lookup failed: {err}");
                    return ResolvedSession::default();
                }
                Err(err) => debug!("Access token rejected: {err}"),
            }
        }

        let Some(refresh_token) = refresh else {
            return ResolvedSession::default();
        };

        let secure = self.config.session_cookie_secure();
        match client.refresh_session(&refresh_token).await {
            Ok(session) => {
                let set_cookies = cookies::session_cookies(&session, secure).unwrap_or_else(|err| {
                    error!("Failed to build session cookies: {err}");
                    Vec::new()
                });
                ResolvedSession {
                    session: Some(session),
                    set_cookies,
                }
            }
            Err(err) if err.is_transport() => {
                error!("Session refresh failed: {err}");
                ResolvedSession::default()
            }
            Err(err) => {
                debug!("Refresh token rejected: {err}");
                ResolvedSession {
                    session: None,
                    set_cookies: cookies::clear_session_cookies(secure),
                }
            }
        }
    }
}

impl SessionResolver for ProviderSessionResolver {
    fn resolve<'a>(
        &'a self,
        headers: &'a HeaderMap,
    ) -> Pin<Box<dyn Future<Output = ResolvedSession> + Send + 'a>> {
        Box::pin(self.lookup(headers))
    }
}

/// Tower `Layer` that wraps services with the session gate.
pub struct SessionGateLayer<R> {
    resolver: Arc<R>,
}

impl<R> SessionGateLayer<R> {
    #[must_use]
    pub fn new(resolver: Arc<R>) -> Self {
        Self { resolver }
    }
}

impl<R> Clone for SessionGateLayer<R> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
        }
    }
}

impl<R, S> Layer<S> for SessionGateLayer<R> {
    type Service = SessionGate<R, S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionGate {
            inner,
            resolver: self.resolver.clone(),
        }
    }
}

/// Tower `Service` implementing the gate decision table.
pub struct SessionGate<R, S> {
    inner: S,
    resolver: Arc<R>,
}

impl<R, S: Clone> Clone for SessionGate<R, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<R, S> Service<Request<Body>> for SessionGate<R, S>
where
    R: SessionResolver,
    S: Service<Request<Body>, Error = Infallible> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Future: Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let resolver = self.resolver.clone();

        Box::pin(async move {
            let path = req.uri().path().to_string();
            let mobile = params::extract(req.uri().query().unwrap_or(""));
            let headers = req.headers().clone();

            // The lookup may refresh the session cookie, so no response may
            // be produced before it completes.
            let resolved = resolver.resolve(&headers).await;

            let decision = policy::decide(
                policy::classify(&path),
                resolved.session.is_some(),
                &mobile,
            );

            let mut response = if let Some(location) = decision.redirect_path() {
                redirect_response(&location)
            } else if decision == GateDecision::Unauthorized {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({ "error": "Unauthorized" })),
                )
                    .into_response()
            } else {
                req.extensions_mut().insert(CurrentSession(resolved.session));
                inner
                    .call(req)
                    .await
                    .unwrap_or_else(|infallible| match infallible {})
                    .into_response()
            };

            // Refreshed (or clearing) cookies ride on every response shape.
            for cookie in resolved.set_cookies {
                response.headers_mut().append(SET_COOKIE, cookie);
            }

            Ok(response)
        })
    }
}

fn redirect_response(location: &str) -> Response {
    HeaderValue::from_str(location).map_or_else(
        |err| {
            error!("Invalid redirect location: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
        |value| {
            let mut response = StatusCode::TEMPORARY_REDIRECT.into_response();
            response.headers_mut().insert(LOCATION, value);
            response
        },
    )
}
