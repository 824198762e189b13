//! Post service
//!
//! Compose once, publish everywhere. Publishing fans out to every
//! target platform; one platform failing never blocks the others. A
//! post counts as published when at least one platform accepted it.

use crate::db::repositories::{PostRepository, UserRepository};
use crate::models::{
    CreatePostInput, Platform, PlatformResult, Post, PostMetric, PostStatus, UpdatePostInput, User,
};
use crate::services::notification::{kinds, NotificationService};
use crate::services::oauth::{ConnectionManager, PublishContent, SocialError};
use crate::services::quota::{QuotaError, QuotaService};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PostServiceError {
    #[error("Post not found")]
    NotFound,

    #[error("Not allowed to access this post")]
    Forbidden,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Monthly post limit reached")]
    QuotaExceeded,

    #[error(transparent)]
    Social(#[from] SocialError),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<QuotaError> for PostServiceError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::PostExceeded | QuotaError::AiExceeded => PostServiceError::QuotaExceeded,
            QuotaError::InternalError(e) => PostServiceError::InternalError(e),
        }
    }
}

pub struct PostService {
    post_repo: Arc<dyn PostRepository>,
    user_repo: Arc<dyn UserRepository>,
    connections: Arc<ConnectionManager>,
    quota: Arc<QuotaService>,
    notifications: Arc<NotificationService>,
}

impl PostService {
    pub fn new(
        post_repo: Arc<dyn PostRepository>,
        user_repo: Arc<dyn UserRepository>,
        connections: Arc<ConnectionManager>,
        quota: Arc<QuotaService>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            post_repo,
            user_repo,
            connections,
            quota,
            notifications,
        }
    }

    /// Create a draft, or a scheduled post when `scheduled_for` is set.
    pub async fn create_post(
        &self,
        user: &User,
        input: CreatePostInput,
    ) -> Result<Post, PostServiceError> {
        if input.content.trim().is_empty() {
            return Err(PostServiceError::ValidationError(
                "Post content cannot be empty".to_string(),
            ));
        }
        if input.targets.is_empty() {
            return Err(PostServiceError::ValidationError(
                "At least one target platform is required".to_string(),
            ));
        }
        if let Some(when) = input.scheduled_for {
            if when <= Utc::now() {
                return Err(PostServiceError::ValidationError(
                    "Scheduled time must be in the future".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let status = if input.scheduled_for.is_some() {
            PostStatus::Scheduled
        } else {
            PostStatus::Draft
        };

        let post = Post {
            id: 0,
            user_id: user.id,
            content: input.content,
            media_urls: input.media_urls,
            targets: input.targets,
            status,
            scheduled_for: input.scheduled_for,
            published_at: None,
            platform_results: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let created = self
            .post_repo
            .create(&post)
            .await
            .context("Failed to create post")?;
        Ok(created)
    }

    pub async fn get_post(&self, user_id: i64, id: i64) -> Result<Post, PostServiceError> {
        let post = self
            .post_repo
            .get_by_id(id)
            .await
            .context("Failed to get post")?
            .ok_or(PostServiceError::NotFound)?;

        if post.user_id != user_id {
            return Err(PostServiceError::Forbidden);
        }
        Ok(post)
    }

    pub async fn list_posts(
        &self,
        user_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Post>, i64), PostServiceError> {
        let result = self
            .post_repo
            .list_for_user(user_id, page, per_page)
            .await
            .context("Failed to list posts")?;
        Ok(result)
    }

    /// Update a draft or scheduled post. Published posts are immutable.
    pub async fn update_post(
        &self,
        user_id: i64,
        id: i64,
        input: UpdatePostInput,
    ) -> Result<Post, PostServiceError> {
        let mut post = self.get_post(user_id, id).await?;

        if matches!(post.status, PostStatus::Published) {
            return Err(PostServiceError::ValidationError(
                "Published posts cannot be edited".to_string(),
            ));
        }

        if let Some(content) = input.content {
            if content.trim().is_empty() {
                return Err(PostServiceError::ValidationError(
                    "Post content cannot be empty".to_string(),
                ));
            }
            post.content = content;
        }
        if let Some(media_urls) = input.media_urls {
            post.media_urls = media_urls;
        }
        if let Some(targets) = input.targets {
            if targets.is_empty() {
                return Err(PostServiceError::ValidationError(
                    "At least one target platform is required".to_string(),
                ));
            }
            post.targets = targets;
        }
        if let Some(scheduled_for) = input.scheduled_for {
            if let Some(when) = scheduled_for {
                if when <= Utc::now() {
                    return Err(PostServiceError::ValidationError(
                        "Scheduled time must be in the future".to_string(),
                    ));
                }
            }
            post.scheduled_for = scheduled_for;
            post.status = if scheduled_for.is_some() {
                PostStatus::Scheduled
            } else {
                PostStatus::Draft
            };
        }

        let updated = self
            .post_repo
            .update(&post)
            .await
            .context("Failed to update post")?;
        Ok(updated)
    }

    pub async fn delete_post(&self, user_id: i64, id: i64) -> Result<(), PostServiceError> {
        self.get_post(user_id, id).await?;
        self.post_repo
            .delete(id)
            .await
            .context("Failed to delete post")?;
        Ok(())
    }

    /// Publish a post right now, subject to the plan's monthly ceiling.
    pub async fn publish_post(&self, user: &User, id: i64) -> Result<Post, PostServiceError> {
        let post = self.get_post(user.id, id).await?;

        if matches!(post.status, PostStatus::Published) {
            return Err(PostServiceError::ValidationError(
                "Post is already published".to_string(),
            ));
        }

        self.quota.check_post_quota(user).await?;
        self.fan_out(post).await
    }

    /// Publish a due scheduled post on behalf of its owner. Called by
    /// the scheduler; quota is still enforced.
    pub async fn publish_due_post(&self, post: Post) -> Result<Post, PostServiceError> {
        let owner = self
            .user_repo
            .get_by_id(post.user_id)
            .await
            .context("Failed to load post owner")?
            .ok_or(PostServiceError::NotFound)?;

        if let Err(err) = self.quota.check_post_quota(&owner).await {
            // Mark the post failed so the scheduler does not retry forever
            let mut failed = post;
            failed.status = PostStatus::Failed;
            failed.updated_at = Utc::now();
            self.post_repo
                .update(&failed)
                .await
                .context("Failed to mark post failed")?;
            return Err(err.into());
        }

        self.fan_out(post).await
    }

    /// Attempt delivery to every target and record per-platform results.
    async fn fan_out(&self, mut post: Post) -> Result<Post, PostServiceError> {
        let content = PublishContent {
            text: post.content.clone(),
            media_urls: post.media_urls.clone(),
        };

        let mut results = Vec::with_capacity(post.targets.len());
        for platform in post.targets.clone() {
            let outcome = self.publish_to_platform(post.user_id, platform, &content).await;
            let attempted_at = Utc::now();
            match outcome {
                Ok(remote_post_id) => results.push(PlatformResult {
                    platform,
                    success: true,
                    remote_post_id: Some(remote_post_id),
                    error: None,
                    attempted_at,
                }),
                Err(err) => {
                    tracing::warn!(%platform, "Publish failed: {}", err);
                    results.push(PlatformResult {
                        platform,
                        success: false,
                        remote_post_id: None,
                        error: Some(err.to_string()),
                        attempted_at,
                    });
                }
            }
        }

        let any_success = results.iter().any(|r| r.success);
        let now = Utc::now();
        post.platform_results = results;
        post.status = if any_success {
            PostStatus::Published
        } else {
            PostStatus::Failed
        };
        post.published_at = any_success.then_some(now);
        post.updated_at = now;

        let updated = self
            .post_repo
            .update(&post)
            .await
            .context("Failed to store publish results")?;

        if any_success {
            self.quota.invalidate_post_usage(updated.user_id).await;
        }

        let (kind, title) = if any_success {
            (kinds::POST_PUBLISHED, "Post published")
        } else {
            (kinds::POST_FAILED, "Post failed to publish")
        };
        let failed: Vec<String> = updated
            .platform_results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.platform.to_string())
            .collect();
        let body = if failed.is_empty() {
            "Delivered to all target platforms".to_string()
        } else {
            format!("Failed platforms: {}", failed.join(", "))
        };
        if let Err(err) = self
            .notifications
            .notify(updated.user_id, kind, title, &body)
            .await
        {
            tracing::warn!("Failed to create publish notification: {:#}", err);
        }

        Ok(updated)
    }

    async fn publish_to_platform(
        &self,
        user_id: i64,
        platform: Platform,
        content: &PublishContent,
    ) -> Result<String, SocialError> {
        let account = self.connections.require_account(user_id, platform).await?;
        let access_token = self.connections.fresh_access_token(&account).await?;
        let client = self.connections.client(platform)?;
        client.publish(&access_token, content).await
    }

    /// Pull fresh engagement numbers for every platform that accepted
    /// the post. Stored metrics are replaced, latest wins.
    pub async fn refresh_metrics(
        &self,
        user_id: i64,
        post_id: i64,
    ) -> Result<Vec<PostMetric>, PostServiceError> {
        let post = self.get_post(user_id, post_id).await?;

        for result in post.platform_results.iter().filter(|r| r.success) {
            let remote_post_id = match &result.remote_post_id {
                Some(id) => id,
                None => continue,
            };

            let fetched = async {
                let account = self
                    .connections
                    .require_account(user_id, result.platform)
                    .await?;
                let access_token = self.connections.fresh_access_token(&account).await?;
                let client = self.connections.client(result.platform)?;
                client.fetch_metrics(&access_token, remote_post_id).await
            }
            .await;

            match fetched {
                Ok(metrics) => {
                    let metric = PostMetric {
                        id: 0,
                        post_id,
                        platform: result.platform,
                        impressions: metrics.impressions,
                        likes: metrics.likes,
                        comments: metrics.comments,
                        shares: metrics.shares,
                        fetched_at: Utc::now(),
                    };
                    self.post_repo
                        .upsert_metric(&metric)
                        .await
                        .context("Failed to store post metrics")?;
                }
                Err(err) => {
                    tracing::warn!(platform = %result.platform, "Metrics fetch failed: {}", err);
                }
            }
        }

        let metrics = self
            .post_repo
            .list_metrics(post_id)
            .await
            .context("Failed to list post metrics")?;
        Ok(metrics)
    }
}
