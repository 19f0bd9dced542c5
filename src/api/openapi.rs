use utoipa::OpenApi;

use super::handlers;
use crate::provider::{Session, User};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::auth::login,
        handlers::auth::signup,
        handlers::auth::refresh,
        handlers::auth::user,
        handlers::auth::mobile_callback,
    ),
    components(schemas(
        handlers::ErrorResponse,
        handlers::health::Health,
        handlers::auth::LoginRequest,
        handlers::auth::SignupRequest,
        handlers::auth::RefreshRequest,
        handlers::auth::AuthResponse,
        handlers::auth::UserResponse,
        handlers::auth::MobileCallbackResponse,
        Session,
        User,
    )),
    tags(
        (name = "auth", description = "Session bridge endpoints"),
        (name = "health", description = "Liveness")
    ),
    info(description = "Authentication bridge between one web front end and native mobile apps")
)]
pub struct ApiDoc;
