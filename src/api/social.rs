//! Social connection API endpoints
//!
//! - GET    /api/social/accounts
//! - GET    /api/social/{platform}/connect
//! - GET    /api/social/{platform}/callback
//! - GET    /api/social/{platform}/verify
//! - DELETE /api/social/{platform}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use std::str::FromStr;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::SocialAccountResponse;
use crate::models::Platform;
use crate::services::oauth::{ConnectStart, ConnectionHealth, SocialError};

/// Build protected social routes
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(list_accounts))
        .route("/{platform}/connect", get(connect))
        .route("/{platform}/verify", get(verify))
        .route("/{platform}", delete(disconnect))
}

/// Build public social routes (OAuth redirects arrive unauthenticated;
/// the signed state parameter carries the user identity)
pub fn public_router() -> Router<AppState> {
    Router::new().route("/{platform}/callback", get(callback))
}

pub(crate) fn map_social_error(e: SocialError) -> ApiError {
    match e {
        SocialError::NotConfigured(platform) => {
            ApiError::validation_error(format!("{} is not configured on this server", platform))
        }
        SocialError::NotConnected(platform) => {
            ApiError::not_found(format!("No connected {} account", platform))
        }
        SocialError::InvalidState => ApiError::validation_error("Invalid or expired state token"),
        SocialError::TokenExpired => {
            ApiError::unauthorized("Platform credentials expired, reconnect the account")
        }
        SocialError::PlatformError(msg) => ApiError::new("PLATFORM_ERROR", msg),
        SocialError::InternalError(err) => ApiError::internal_error(err.to_string()),
    }
}

fn parse_platform(raw: &str) -> Result<Platform, ApiError> {
    Platform::from_str(raw).map_err(ApiError::validation_error)
}

/// GET /api/social/accounts
async fn list_accounts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<SocialAccountResponse>>, ApiError> {
    let accounts = state
        .connections
        .list_accounts(user.0.id)
        .await
        .map_err(map_social_error)?;

    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

/// GET /api/social/{platform}/connect
///
/// Returns the authorization URL the client should redirect to, plus
/// the state to hand back for platforms without a redirect leg.
async fn connect(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(platform): Path<String>,
) -> Result<Json<ConnectStart>, ApiError> {
    let platform = parse_platform(&platform)?;
    let start = state
        .connections
        .connect_url(user.0.id, platform)
        .map_err(map_social_error)?;

    Ok(Json(start))
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: String,
    state: String,
}

/// GET /api/social/{platform}/callback
async fn callback(
    State(state): State<AppState>,
    Path(platform): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<SocialAccountResponse>, ApiError> {
    // The platform segment is informational; identity and platform both
    // come from the signed state token.
    parse_platform(&platform)?;

    let account = state
        .connections
        .handle_callback(&query.state, &query.code)
        .await
        .map_err(map_social_error)?;

    Ok(Json(account.into()))
}

/// GET /api/social/{platform}/verify
///
/// Reports connection health, refreshing a near-expiry token first.
async fn verify(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(platform): Path<String>,
) -> Result<Json<ConnectionHealth>, ApiError> {
    let platform = parse_platform(&platform)?;
    let health = state
        .connections
        .verify(user.0.id, platform)
        .await
        .map_err(map_social_error)?;

    Ok(Json(health))
}

/// DELETE /api/social/{platform}
async fn disconnect(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(platform): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let platform = parse_platform(&platform)?;
    let removed = state
        .connections
        .disconnect(user.0.id, platform)
        .await
        .map_err(map_social_error)?;

    if !removed {
        return Err(ApiError::not_found(format!(
            "No connected {} account",
            platform
        )));
    }

    Ok(StatusCode::NO_CONTENT)
}
