//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP endpoints of the blog API:
//! - Post endpoints (`/blog/...`)
//! - Comment endpoints (`/blog/post/{slug}/comments/...`)
//! - Profile endpoints (`/user/profile/...`)
//! - Account endpoints (signup, tokens, password management)

pub mod auth;
pub mod comments;
pub mod common;
pub mod middleware;
pub mod posts;
pub mod responses;
pub mod users;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::common::Urls;
pub use middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};

/// Build the API router
pub fn build_api_router() -> Router<AppState> {
    // Protected routes (need auth)
    let protected_routes = Router::new()
        .merge(posts::protected_router())
        .merge(comments::protected_router())
        .merge(users::protected_router())
        .merge(auth::protected_router())
        .route_layer(axum_middleware::from_fn(middleware::require_auth));

    // Public routes
    Router::new()
        .route("/", get(api_root))
        .merge(posts::public_router())
        .merge(comments::public_router())
        .merge(users::public_router())
        .merge(auth::public_router())
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origin);

    Router::new()
        .merge(build_api_router())
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum_middleware::from_fn_with_state(
                    state.clone(),
                    middleware::optional_auth,
                )),
        )
        .with_state(state)
}

/// CORS for the configured origin; `*` allows any origin
fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = match origin.trim() {
        "*" => AllowOrigin::any(),
        origin => match origin.parse::<HeaderValue>() {
            Ok(value) => AllowOrigin::exact(value),
            Err(_) => {
                tracing::warn!("Invalid CORS origin '{}', cross-origin requests disabled", origin);
                AllowOrigin::list(Vec::<HeaderValue>::new())
            }
        },
    };

    let cors = CorsLayer::new().allow_origin(allow_origin).allow_methods([
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
    ]);
    if origin.trim() == "*" {
        cors.allow_headers(Any)
    } else {
        cors.allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    }
}

#[derive(Debug, Serialize)]
pub struct ApiRootResponse {
    pub blog: String,
    pub signup: String,
}

/// GET / - Entry points of the API
async fn api_root(State(state): State<AppState>) -> Json<ApiRootResponse> {
    let urls = Urls::new(state.base_url());
    Json(ApiRootResponse {
        blog: urls.blog(),
        signup: urls.signup(),
    })
}

async fn not_found() -> ApiError {
    ApiError::not_found("Not found.")
}
