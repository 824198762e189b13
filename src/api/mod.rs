//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints:
//! - Auth and session endpoints
//! - Social account connection endpoints
//! - Post composing, scheduling and metrics endpoints
//! - AI variation endpoints
//! - Billing and webhook endpoints
//! - Team and invite endpoints
//! - Blog and notification endpoints
//! - Bug report endpoints
//! - Admin back-office endpoints

pub mod admin;
pub mod ai;
pub mod auth;
pub mod billing;
pub mod blog;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod responses;
pub mod social;
pub mod support;
pub mod teams;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser, RequestStats};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/social", social::protected_router())
        .nest("/posts", posts::protected_router())
        .nest("/ai", ai::protected_router())
        .nest("/billing", billing::protected_router())
        .nest("/teams", teams::protected_router())
        .nest("/blog", blog::protected_router())
        .nest("/notifications", notifications::protected_router())
        .nest("/support", support::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Login and registration get an extra per-IP throttle
    let auth_routes = auth::public_router().route_layer(axum_middleware::from_fn_with_state(
        state.clone(),
        middleware::auth_rate_limit,
    ));

    // Public routes
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes)
        .nest("/social", social::public_router())
        .nest("/billing", billing::public_router())
        .nest("/blog", blog::public_router())
        .merge(admin_routes)
        .merge(protected_routes)
}

/// GET /api/health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": admin::APP_VERSION,
    }))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
            .allow_credentials(true),
        Err(_) => {
            tracing::warn!(origin = cors_origin, "Invalid CORS origin, allowing none");
            CorsLayer::new()
        }
    };

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        // Maintenance gate sits outside routing so it covers everything
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::maintenance_gate,
        ))
        // Request stats middleware (outermost layer, runs for all requests)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}
