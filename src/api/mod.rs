use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, Request, StatusCode},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::mpsc};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::BridgeConfig,
    gate::{ProviderSessionResolver, SessionGateLayer},
};

pub mod handlers;
// OpenAPI document assembly lives in openapi.rs.
mod openapi;

use handlers::{auth, health, pages};

/// Build the bridge router: pages and APIs behind the session gate, the
/// Swagger UI outside it.
///
/// # Errors
///
/// Returns an error when the site URL cannot be turned into a CORS origin.
pub fn router(config: BridgeConfig) -> Result<Router> {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(site_origin(config.site_url())?))
        .allow_credentials(true);

    let resolver = Arc::new(ProviderSessionResolver::new(config.clone()));

    let app = Router::new()
        .route("/", get(pages::index))
        .route("/auth/login", get(pages::login))
        .route("/auth/signup", get(pages::signup))
        .route("/auth/signup-success", get(pages::signup_success))
        .route("/auth/callback", get(pages::callback))
        .route("/auth/mobile-success", get(pages::mobile_success))
        .route("/auth/error", get(pages::auth_error))
        .route("/dashboard", get(pages::dashboard))
        .route("/api/health", get(health::health))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/user", get(auth::user))
        .route("/api/auth/mobile-callback", get(auth::mobile_callback))
        // Explicit fallback so the gate stack below also covers unmatched
        // paths; `merge` would otherwise swap in a fallback without it.
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(SessionGateLayer::new(resolver))
                .layer(Extension(config)),
        )
        .merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        );

    Ok(app)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, config: BridgeConfig) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {err}");
        }
        let _ = tx.send(());
    });

    let app = router(config)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            rx.recv().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn site_origin(site_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(site_url).with_context(|| format!("Invalid site URL: {site_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Site URL must include a valid host: {site_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build site origin header")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use secrecy::SecretString;
    use tower::ServiceExt;

    fn config() -> BridgeConfig {
        BridgeConfig::new(
            "http://127.0.0.1:1".to_string(),
            SecretString::from("test-key".to_string()),
            "http://localhost:8080".to_string(),
        )
    }

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_site_origin() {
        assert_eq!(
            site_origin("http://localhost:8080/").unwrap(),
            "http://localhost:8080"
        );
        assert_eq!(
            site_origin("https://app.example.com/some/path").unwrap(),
            "https://app.example.com"
        );
        assert!(site_origin("not a url").is_err());
    }

    #[tokio::test]
    async fn test_health_passes_the_gate_without_a_session() {
        let app = router(config()).unwrap();
        let response = app.oneshot(request("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("X-App"));
    }

    #[tokio::test]
    async fn test_landing_page_is_public() {
        let app = router(config()).unwrap();
        let response = app.oneshot(request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_dashboard_without_session_redirects_to_login() {
        let app = router(config()).unwrap();
        let response = app.oneshot(request("/dashboard")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[axum::http::header::LOCATION],
            "/auth/login"
        );
    }

    #[tokio::test]
    async fn test_unknown_api_without_session_is_unauthorized() {
        let app = router(config()).unwrap();
        let response = app.oneshot(request("/api/profile")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
