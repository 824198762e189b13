//! Public blog API endpoints
//!
//! Reading is public; commenting and voting require an account. Post
//! authoring lives under the admin routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{BlogComment, BlogPost, VoteKind};
use crate::services::blog::BlogServiceError;

/// Build public blog routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts))
        .route("/{slug}", get(get_post))
        .route("/{slug}/comments", get(list_comments))
}

/// Build protected blog routes
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/{slug}/comments", post(add_comment))
        .route("/{slug}/vote", post(vote))
}

pub(crate) fn map_blog_error(e: BlogServiceError) -> ApiError {
    match e {
        BlogServiceError::NotFound => ApiError::not_found("Blog post not found"),
        BlogServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        BlogServiceError::SlugTaken => ApiError::conflict("A post with that slug already exists"),
        BlogServiceError::InternalError(err) => ApiError::internal_error(err.to_string()),
    }
}

#[derive(Debug, Serialize)]
struct BlogPostSummary {
    slug: String,
    title: String,
    upvotes: i64,
    downvotes: i64,
    created_at: String,
}

impl From<BlogPost> for BlogPostSummary {
    fn from(post: BlogPost) -> Self {
        Self {
            slug: post.slug,
            title: post.title,
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            created_at: post.created_at.to_rfc3339(),
        }
    }
}

/// GET /api/blog
async fn list_posts(
    State(state): State<AppState>,
) -> Result<Json<Vec<BlogPostSummary>>, ApiError> {
    let posts = state
        .blog_service
        .list_published()
        .await
        .map_err(map_blog_error)?;

    Ok(Json(posts.into_iter().map(Into::into).collect()))
}

/// GET /api/blog/{slug}
async fn get_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<BlogPost>, ApiError> {
    let post = state
        .blog_service
        .get_published(&slug)
        .await
        .map_err(map_blog_error)?;

    Ok(Json(post))
}

/// GET /api/blog/{slug}/comments
async fn list_comments(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Vec<BlogComment>>, ApiError> {
    let post = state
        .blog_service
        .get_published(&slug)
        .await
        .map_err(map_blog_error)?;

    let comments = state
        .blog_service
        .list_comments(post.id)
        .await
        .map_err(map_blog_error)?;

    Ok(Json(comments))
}

#[derive(Debug, Deserialize)]
struct CommentRequest {
    content: String,
}

/// POST /api/blog/{slug}/comments
async fn add_comment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
    Json(body): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state
        .blog_service
        .get_published(&slug)
        .await
        .map_err(map_blog_error)?;

    let comment = state
        .blog_service
        .add_comment(&user.0, post.id, &body.content)
        .await
        .map_err(map_blog_error)?;

    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Debug, Deserialize)]
struct VoteRequest {
    kind: VoteKind,
}

#[derive(Debug, Serialize)]
struct VoteResponse {
    upvotes: i64,
    downvotes: i64,
}

/// POST /api/blog/{slug}/vote
///
/// Toggles: the same direction twice removes the vote, the opposite
/// direction moves it.
async fn vote(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(slug): Path<String>,
    Json(body): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    let post = state
        .blog_service
        .get_published(&slug)
        .await
        .map_err(map_blog_error)?;

    let updated = state
        .blog_service
        .vote(&user.0, post.id, body.kind)
        .await
        .map_err(map_blog_error)?;

    Ok(Json(VoteResponse {
        upvotes: updated.upvotes,
        downvotes: updated.downvotes,
    }))
}
