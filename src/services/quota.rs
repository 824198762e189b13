//! Plan quota enforcement
//!
//! Monthly ceilings derive from the user's plan; usage is counted from
//! rows created since the start of the current calendar month. Counts
//! are cached briefly to keep hot paths off the database.

use crate::cache::{Cache, CacheLayer};
use crate::db::repositories::{AiGenerationRepository, PostRepository};
use crate::models::User;
use anyhow::Context;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const USAGE_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    #[error("Monthly AI generation limit reached")]
    AiExceeded,

    #[error("Monthly post limit reached")]
    PostExceeded,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Current-month usage against plan ceilings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub ai_used: i64,
    pub ai_limit: Option<u32>,
    pub posts_used: i64,
    pub post_limit: Option<u32>,
}

/// Midnight UTC on the first of the current month.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

pub struct QuotaService {
    post_repo: Arc<dyn PostRepository>,
    ai_repo: Arc<dyn AiGenerationRepository>,
    cache: Arc<Cache>,
}

impl QuotaService {
    pub fn new(
        post_repo: Arc<dyn PostRepository>,
        ai_repo: Arc<dyn AiGenerationRepository>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            post_repo,
            ai_repo,
            cache,
        }
    }

    fn ai_cache_key(user_id: i64) -> String {
        format!("quota:ai:{}", user_id)
    }

    fn post_cache_key(user_id: i64) -> String {
        format!("quota:posts:{}", user_id)
    }

    /// Usage summary for the user's current month.
    pub async fn usage(&self, user: &User) -> Result<QuotaUsage, QuotaError> {
        let ai_used = self.ai_used(user.id).await?;
        let posts_used = self.posts_used(user.id).await?;

        Ok(QuotaUsage {
            ai_used,
            ai_limit: user.plan.ai_generation_quota(),
            posts_used,
            post_limit: user.plan.post_quota(),
        })
    }

    /// Fails with `AiExceeded` when the user is at their AI ceiling.
    pub async fn check_ai_quota(&self, user: &User) -> Result<(), QuotaError> {
        if let Some(limit) = user.plan.ai_generation_quota() {
            let used = self.ai_used(user.id).await?;
            if used >= limit as i64 {
                return Err(QuotaError::AiExceeded);
            }
        }
        Ok(())
    }

    /// Fails with `PostExceeded` when the user is at their publish ceiling.
    pub async fn check_post_quota(&self, user: &User) -> Result<(), QuotaError> {
        if let Some(limit) = user.plan.post_quota() {
            let used = self.posts_used(user.id).await?;
            if used >= limit as i64 {
                return Err(QuotaError::PostExceeded);
            }
        }
        Ok(())
    }

    /// Record one AI generation and invalidate the cached count.
    pub async fn record_ai_generation(&self, user_id: i64) -> Result<(), QuotaError> {
        self.ai_repo
            .record(user_id)
            .await
            .context("Failed to record AI generation")?;
        let _ = self.cache.delete(&Self::ai_cache_key(user_id)).await;
        Ok(())
    }

    /// Drop the cached publish count after a post goes out.
    pub async fn invalidate_post_usage(&self, user_id: i64) {
        let _ = self.cache.delete(&Self::post_cache_key(user_id)).await;
    }

    async fn ai_used(&self, user_id: i64) -> Result<i64, QuotaError> {
        let key = Self::ai_cache_key(user_id);
        if let Ok(Some(cached)) = self.cache.get::<i64>(&key).await {
            return Ok(cached);
        }

        let used = self
            .ai_repo
            .count_since(user_id, month_start(Utc::now()))
            .await
            .context("Failed to count AI generations")?;

        let _ = self.cache.set(&key, &used, USAGE_CACHE_TTL).await;
        Ok(used)
    }

    async fn posts_used(&self, user_id: i64) -> Result<i64, QuotaError> {
        let key = Self::post_cache_key(user_id);
        if let Ok(Some(cached)) = self.cache.get::<i64>(&key).await {
            return Ok(cached);
        }

        let used = self
            .post_repo
            .count_published_since(user_id, month_start(Utc::now()))
            .await
            .context("Failed to count published posts")?;

        let _ = self.cache.set(&key, &used, USAGE_CACHE_TTL).await;
        Ok(used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        SqlxAiGenerationRepository, SqlxPostRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Plan, User, UserRole};

    async fn setup() -> (QuotaService, User) {
        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let user = users
            .create(&User::new(
                "alice".to_string(),
                "alice@example.com".to_string(),
                "hash".to_string(),
                UserRole::User,
            ))
            .await
            .expect("create user");

        let service = QuotaService::new(
            Arc::new(SqlxPostRepository::new(pool.clone())),
            Arc::new(SqlxAiGenerationRepository::new(pool)),
            Arc::new(Cache::Memory(MemoryCache::new())),
        );

        (service, user)
    }

    #[test]
    fn test_month_start() {
        let now = Utc.with_ymd_and_hms(2025, 3, 17, 14, 30, 0).unwrap();
        let start = month_start(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_free_plan_ai_quota_enforced() {
        let (service, user) = setup().await;
        assert!(matches!(user.plan, Plan::Free));

        for _ in 0..10 {
            service.check_ai_quota(&user).await.expect("under quota");
            service
                .record_ai_generation(user.id)
                .await
                .expect("record");
        }

        let result = service.check_ai_quota(&user).await;
        assert!(matches!(result, Err(QuotaError::AiExceeded)));
    }

    #[tokio::test]
    async fn test_studio_posts_unlimited() {
        let (service, mut user) = setup().await;
        user.plan = Plan::Studio;

        // No ceiling; always passes
        service.check_post_quota(&user).await.expect("unlimited");
    }

    #[tokio::test]
    async fn test_usage_reports_limits() {
        let (service, user) = setup().await;
        service.record_ai_generation(user.id).await.expect("record");

        let usage = service.usage(&user).await.expect("usage");
        assert_eq!(usage.ai_used, 1);
        assert_eq!(usage.ai_limit, Some(10));
        assert_eq!(usage.posts_used, 0);
        assert_eq!(usage.post_limit, Some(15));
    }

    #[tokio::test]
    async fn test_record_invalidates_cached_count() {
        let (service, user) = setup().await;

        // Prime the cache
        let before = service.usage(&user).await.expect("usage");
        assert_eq!(before.ai_used, 0);

        service.record_ai_generation(user.id).await.expect("record");

        let after = service.usage(&user).await.expect("usage");
        assert_eq!(after.ai_used, 1);
    }
}
