//! Post API endpoints
//!
//! Compose, schedule, publish, and inspect cross-platform posts.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::PostResponse;
use crate::api::social::map_social_error;
use crate::models::{CreatePostInput, PostMetric, UpdatePostInput};
use crate::services::post::PostServiceError;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Build protected post routes
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts).post(create_post))
        .route("/{id}", get(get_post).delete(delete_post))
        .route("/{id}", put(update_post))
        .route("/{id}/publish", post(publish_post))
        .route("/{id}/metrics", get(refresh_metrics))
}

pub(crate) fn map_post_error(e: PostServiceError) -> ApiError {
    match e {
        PostServiceError::NotFound => ApiError::not_found("Post not found"),
        PostServiceError::Forbidden => ApiError::forbidden("That post belongs to someone else"),
        PostServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        PostServiceError::QuotaExceeded => {
            ApiError::quota_exceeded("Monthly post limit reached, upgrade your plan")
        }
        PostServiceError::Social(err) => map_social_error(err),
        PostServiceError::InternalError(err) => ApiError::internal_error(err.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_per_page")]
    per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Serialize)]
struct PaginatedPostsResponse {
    posts: Vec<PostResponse>,
    total: i64,
    page: i64,
    per_page: i64,
}

/// GET /api/posts
async fn list_posts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<PaginatedPostsResponse>, ApiError> {
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, MAX_PAGE_SIZE);

    let (posts, total) = state
        .post_service
        .list_posts(user.0.id, page, per_page)
        .await
        .map_err(map_post_error)?;

    Ok(Json(PaginatedPostsResponse {
        posts: posts.into_iter().map(Into::into).collect(),
        total,
        page,
        per_page,
    }))
}

/// POST /api/posts
async fn create_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<CreatePostInput>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state
        .post_service
        .create_post(&user.0, input)
        .await
        .map_err(map_post_error)?;

    Ok((StatusCode::CREATED, Json(PostResponse::from(post))))
}

/// GET /api/posts/{id}
async fn get_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = state
        .post_service
        .get_post(user.0.id, id)
        .await
        .map_err(map_post_error)?;

    Ok(Json(post.into()))
}

/// PUT /api/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdatePostInput>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = state
        .post_service
        .update_post(user.0.id, id, input)
        .await
        .map_err(map_post_error)?;

    Ok(Json(post.into()))
}

/// DELETE /api/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .post_service
        .delete_post(user.0.id, id)
        .await
        .map_err(map_post_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/posts/{id}/publish
///
/// Immediate fan-out to every target platform. The response carries the
/// per-platform outcomes whether or not they all succeeded.
async fn publish_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<PostResponse>, ApiError> {
    let post = state
        .post_service
        .publish_post(&user.0, id)
        .await
        .map_err(map_post_error)?;

    Ok(Json(post.into()))
}

#[derive(Debug, Serialize)]
struct MetricsResponse {
    metrics: Vec<MetricEntry>,
}

#[derive(Debug, Serialize)]
struct MetricEntry {
    platform: String,
    impressions: i64,
    likes: i64,
    comments: i64,
    shares: i64,
    fetched_at: String,
}

impl From<PostMetric> for MetricEntry {
    fn from(m: PostMetric) -> Self {
        Self {
            platform: m.platform.to_string(),
            impressions: m.impressions,
            likes: m.likes,
            comments: m.comments,
            shares: m.shares,
            fetched_at: m.fetched_at.to_rfc3339(),
        }
    }
}

/// GET /api/posts/{id}/metrics
///
/// Pulls fresh engagement numbers from each platform the post reached.
async fn refresh_metrics(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MetricsResponse>, ApiError> {
    let metrics = state
        .post_service
        .refresh_metrics(user.0.id, id)
        .await
        .map_err(map_post_error)?;

    Ok(Json(MetricsResponse {
        metrics: metrics.into_iter().map(Into::into).collect(),
    }))
}
