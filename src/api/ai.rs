//! AI variation API endpoints
//!
//! - POST /api/ai/variations
//! - GET  /api/ai/usage

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::Platform;
use crate::services::ai::AiServiceError;
use crate::services::quota::QuotaError;

/// Build protected AI routes
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/variations", post(generate_variations))
        .route("/usage", get(usage))
}

const MAX_VARIATIONS: u32 = 5;

#[derive(Debug, Deserialize)]
struct VariationRequest {
    content: String,
    platform: Platform,
    #[serde(default = "default_count")]
    count: u32,
}

fn default_count() -> u32 {
    1
}

#[derive(Debug, Serialize)]
struct VariationResponse {
    platform: String,
    variations: Vec<String>,
}

/// POST /api/ai/variations
///
/// Rewrite a draft in a platform-appropriate voice, returning up to
/// five alternatives. Counts against the monthly AI quota only on
/// success.
async fn generate_variations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<VariationRequest>,
) -> Result<Json<VariationResponse>, ApiError> {
    if body.content.trim().is_empty() {
        return Err(ApiError::validation_error("Content cannot be empty"));
    }
    let count = body.count.clamp(1, MAX_VARIATIONS);

    let variations = state
        .ai_service
        .generate_variations(&user.0, &body.content, body.platform, count)
        .await
        .map_err(|e| match e {
            AiServiceError::NotConfigured => {
                ApiError::validation_error("AI generation is not configured on this server")
            }
            AiServiceError::QuotaExceeded => {
                ApiError::quota_exceeded("Monthly AI generation limit reached")
            }
            AiServiceError::RequestFailed(msg) => {
                ApiError::new("PLATFORM_ERROR", format!("AI request failed: {}", msg))
            }
            AiServiceError::InternalError(err) => ApiError::internal_error(err.to_string()),
        })?;

    Ok(Json(VariationResponse {
        platform: body.platform.to_string(),
        variations,
    }))
}

#[derive(Debug, Serialize)]
struct UsageResponse {
    ai_used: i64,
    ai_limit: Option<u32>,
    posts_used: i64,
    post_limit: Option<u32>,
}

/// GET /api/ai/usage
///
/// Current calendar-month usage against the plan's quotas.
async fn usage(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UsageResponse>, ApiError> {
    let usage = state
        .quota_service
        .usage(&user.0)
        .await
        .map_err(|e| match e {
            QuotaError::InternalError(err) => ApiError::internal_error(err.to_string()),
            other => ApiError::internal_error(other.to_string()),
        })?;

    Ok(Json(UsageResponse {
        ai_used: usage.ai_used,
        ai_limit: usage.ai_limit,
        posts_used: usage.posts_used,
        post_limit: usage.post_limit,
    }))
}
