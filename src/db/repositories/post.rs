//! Post repository
//!
//! Posts plus their per-platform engagement metrics. Media URLs, target
//! platforms, and delivery results are stored as JSON text columns.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Platform, PlatformResult, Post, PostMetric, PostStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Create a new post
    async fn create(&self, post: &Post) -> Result<Post>;

    /// Get post by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<Post>>;

    /// List a user's posts, newest first
    async fn list_for_user(&self, user_id: i64, page: i64, per_page: i64)
        -> Result<(Vec<Post>, i64)>;

    /// Update a post
    async fn update(&self, post: &Post) -> Result<Post>;

    /// Delete a post
    async fn delete(&self, id: i64) -> Result<()>;

    /// Scheduled posts whose time has come
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Post>>;

    /// Posts a user published since the given instant (quota accounting)
    async fn count_published_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<i64>;

    /// Count all posts
    async fn count(&self) -> Result<i64>;

    /// Insert or refresh engagement counters for (post, platform)
    async fn upsert_metric(&self, metric: &PostMetric) -> Result<()>;

    /// All stored metrics for one post
    async fn list_metrics(&self, post_id: i64) -> Result<Vec<PostMetric>>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.as_sqlite().unwrap(), post).await,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.as_mysql().unwrap(), post).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_post_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<(Vec<Post>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_posts_sqlite(self.pool.as_sqlite().unwrap(), user_id, page, per_page).await
            }
            DatabaseDriver::Mysql => {
                list_posts_mysql(self.pool.as_mysql().unwrap(), user_id, page, per_page).await
            }
        }
    }

    async fn update(&self, post: &Post) -> Result<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_post_sqlite(self.pool.as_sqlite().unwrap(), post).await,
            DatabaseDriver::Mysql => update_post_mysql(self.pool.as_mysql().unwrap(), post).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => delete_post_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => delete_post_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_due_sqlite(self.pool.as_sqlite().unwrap(), now).await,
            DatabaseDriver::Mysql => list_due_mysql(self.pool.as_mysql().unwrap(), now).await,
        }
    }

    async fn count_published_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_published_since_sqlite(self.pool.as_sqlite().unwrap(), user_id, since).await
            }
            DatabaseDriver::Mysql => {
                count_published_since_mysql(self.pool.as_mysql().unwrap(), user_id, since).await
            }
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_posts_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => count_posts_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn upsert_metric(&self, metric: &PostMetric) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                upsert_metric_sqlite(self.pool.as_sqlite().unwrap(), metric).await
            }
            DatabaseDriver::Mysql => {
                upsert_metric_mysql(self.pool.as_mysql().unwrap(), metric).await
            }
        }
    }

    async fn list_metrics(&self, post_id: i64) -> Result<Vec<PostMetric>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_metrics_sqlite(self.pool.as_sqlite().unwrap(), post_id).await
            }
            DatabaseDriver::Mysql => {
                list_metrics_mysql(self.pool.as_mysql().unwrap(), post_id).await
            }
        }
    }
}

const POST_COLUMNS: &str = "id, user_id, content, media_urls, targets, status, scheduled_for, \
     published_at, platform_results, created_at, updated_at";

fn targets_json(targets: &[Platform]) -> Result<String> {
    serde_json::to_string(targets).context("Failed to serialize targets")
}

fn results_json(results: &[PlatformResult]) -> Result<String> {
    serde_json::to_string(results).context("Failed to serialize platform results")
}

fn media_json(urls: &[String]) -> Result<String> {
    serde_json::to_string(urls).context("Failed to serialize media URLs")
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO posts (user_id, content, media_urls, targets, status, scheduled_for,
                           published_at, platform_results, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(post.user_id)
    .bind(&post.content)
    .bind(media_json(&post.media_urls)?)
    .bind(targets_json(&post.targets)?)
    .bind(post.status.to_string())
    .bind(post.scheduled_for)
    .bind(post.published_at)
    .bind(results_json(&post.platform_results)?)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn get_post_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post")?;

    match row {
        Some(row) => Ok(Some(row_to_post_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn list_posts_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    page: i64,
    per_page: i64,
) -> Result<(Vec<Post>, i64)> {
    let offset = (page - 1) * per_page;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM posts WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        POST_COLUMNS
    ))
    .bind(user_id)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list posts")?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row_to_post_sqlite(&row)?);
    }

    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM posts WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count user posts")?
        .get("count");

    Ok((posts, total))
}

async fn update_post_sqlite(pool: &SqlitePool, post: &Post) -> Result<Post> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE posts
        SET content = ?, media_urls = ?, targets = ?, status = ?, scheduled_for = ?,
            published_at = ?, platform_results = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.content)
    .bind(media_json(&post.media_urls)?)
    .bind(targets_json(&post.targets)?)
    .bind(post.status.to_string())
    .bind(post.scheduled_for)
    .bind(post.published_at)
    .bind(results_json(&post.platform_results)?)
    .bind(now)
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    get_post_sqlite(pool, post.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
}

async fn delete_post_sqlite(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;
    Ok(())
}

async fn list_due_sqlite(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<Post>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM posts WHERE status = 'scheduled' AND scheduled_for <= ? \
         ORDER BY scheduled_for",
        POST_COLUMNS
    ))
    .bind(now)
    .fetch_all(pool)
    .await
    .context("Failed to list due posts")?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row_to_post_sqlite(&row)?);
    }
    Ok(posts)
}

async fn count_published_since_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    since: DateTime<Utc>,
) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM posts \
         WHERE user_id = ? AND status = 'published' AND published_at >= ?",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await
    .context("Failed to count published posts")?;

    Ok(row.get("count"))
}

async fn count_posts_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM posts")
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    Ok(row.get("count"))
}

async fn upsert_metric_sqlite(pool: &SqlitePool, metric: &PostMetric) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO post_metrics (post_id, platform, impressions, likes, comments, shares, fetched_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (post_id, platform) DO UPDATE SET
            impressions = excluded.impressions,
            likes = excluded.likes,
            comments = excluded.comments,
            shares = excluded.shares,
            fetched_at = excluded.fetched_at
        "#,
    )
    .bind(metric.post_id)
    .bind(metric.platform.to_string())
    .bind(metric.impressions)
    .bind(metric.likes)
    .bind(metric.comments)
    .bind(metric.shares)
    .bind(metric.fetched_at)
    .execute(pool)
    .await
    .context("Failed to upsert post metric")?;
    Ok(())
}

async fn list_metrics_sqlite(pool: &SqlitePool, post_id: i64) -> Result<Vec<PostMetric>> {
    let rows = sqlx::query(
        "SELECT id, post_id, platform, impressions, likes, comments, shares, fetched_at \
         FROM post_metrics WHERE post_id = ? ORDER BY platform",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to list post metrics")?;

    let mut metrics = Vec::new();
    for row in rows {
        metrics.push(row_to_metric_sqlite(&row)?);
    }
    Ok(metrics)
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Post> {
    let status_str: String = row.get("status");
    let status = PostStatus::from_str(&status_str)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid post status in database: {}", status_str))?;

    let media_str: String = row.get("media_urls");
    let media_urls: Vec<String> =
        serde_json::from_str(&media_str).context("Invalid media_urls JSON in database")?;

    let targets_str: String = row.get("targets");
    let targets: Vec<Platform> =
        serde_json::from_str(&targets_str).context("Invalid targets JSON in database")?;

    let results_str: String = row.get("platform_results");
    let platform_results: Vec<PlatformResult> =
        serde_json::from_str(&results_str).context("Invalid platform_results JSON in database")?;

    Ok(Post {
        id: row.get("id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        media_urls,
        targets,
        status,
        scheduled_for: row.get("scheduled_for"),
        published_at: row.get("published_at"),
        platform_results,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_metric_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<PostMetric> {
    let platform_str: String = row.get("platform");
    let platform = Platform::from_str(&platform_str)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid platform in database: {}", platform_str))?;

    Ok(PostMetric {
        id: row.get("id"),
        post_id: row.get("post_id"),
        platform,
        impressions: row.get("impressions"),
        likes: row.get("likes"),
        comments: row.get("comments"),
        shares: row.get("shares"),
        fetched_at: row.get("fetched_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_post_mysql(pool: &MySqlPool, post: &Post) -> Result<Post> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO posts (user_id, content, media_urls, targets, status, scheduled_for,
                           published_at, platform_results, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(post.user_id)
    .bind(&post.content)
    .bind(media_json(&post.media_urls)?)
    .bind(targets_json(&post.targets)?)
    .bind(post.status.to_string())
    .bind(post.scheduled_for)
    .bind(post.published_at)
    .bind(results_json(&post.platform_results)?)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

async fn get_post_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Post>> {
    let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get post")?;

    match row {
        Some(row) => Ok(Some(row_to_post_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn list_posts_mysql(
    pool: &MySqlPool,
    user_id: i64,
    page: i64,
    per_page: i64,
) -> Result<(Vec<Post>, i64)> {
    let offset = (page - 1) * per_page;

    let rows = sqlx::query(&format!(
        "SELECT {} FROM posts WHERE user_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
        POST_COLUMNS
    ))
    .bind(user_id)
    .bind(per_page)
    .bind(offset)
    .fetch_all(pool)
    .await
    .context("Failed to list posts")?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row_to_post_mysql(&row)?);
    }

    let total: i64 = sqlx::query("SELECT COUNT(*) as count FROM posts WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .context("Failed to count user posts")?
        .get("count");

    Ok((posts, total))
}

async fn update_post_mysql(pool: &MySqlPool, post: &Post) -> Result<Post> {
    let now = Utc::now();

    sqlx::query(
        r#"
        UPDATE posts
        SET content = ?, media_urls = ?, targets = ?, status = ?, scheduled_for = ?,
            published_at = ?, platform_results = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&post.content)
    .bind(media_json(&post.media_urls)?)
    .bind(targets_json(&post.targets)?)
    .bind(post.status.to_string())
    .bind(post.scheduled_for)
    .bind(post.published_at)
    .bind(results_json(&post.platform_results)?)
    .bind(now)
    .bind(post.id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    get_post_mysql(pool, post.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Post not found after update"))
}

async fn delete_post_mysql(pool: &MySqlPool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;
    Ok(())
}

async fn list_due_mysql(pool: &MySqlPool, now: DateTime<Utc>) -> Result<Vec<Post>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM posts WHERE status = 'scheduled' AND scheduled_for <= ? \
         ORDER BY scheduled_for",
        POST_COLUMNS
    ))
    .bind(now)
    .fetch_all(pool)
    .await
    .context("Failed to list due posts")?;

    let mut posts = Vec::new();
    for row in rows {
        posts.push(row_to_post_mysql(&row)?);
    }
    Ok(posts)
}

async fn count_published_since_mysql(
    pool: &MySqlPool,
    user_id: i64,
    since: DateTime<Utc>,
) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM posts \
         WHERE user_id = ? AND status = 'published' AND published_at >= ?",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await
    .context("Failed to count published posts")?;

    Ok(row.get("count"))
}

async fn count_posts_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM posts")
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    Ok(row.get("count"))
}

async fn upsert_metric_mysql(pool: &MySqlPool, metric: &PostMetric) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO post_metrics (post_id, platform, impressions, likes, comments, shares, fetched_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            impressions = VALUES(impressions),
            likes = VALUES(likes),
            comments = VALUES(comments),
            shares = VALUES(shares),
            fetched_at = VALUES(fetched_at)
        "#,
    )
    .bind(metric.post_id)
    .bind(metric.platform.to_string())
    .bind(metric.impressions)
    .bind(metric.likes)
    .bind(metric.comments)
    .bind(metric.shares)
    .bind(metric.fetched_at)
    .execute(pool)
    .await
    .context("Failed to upsert post metric")?;
    Ok(())
}

async fn list_metrics_mysql(pool: &MySqlPool, post_id: i64) -> Result<Vec<PostMetric>> {
    let rows = sqlx::query(
        "SELECT id, post_id, platform, impressions, likes, comments, shares, fetched_at \
         FROM post_metrics WHERE post_id = ? ORDER BY platform",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to list post metrics")?;

    let mut metrics = Vec::new();
    for row in rows {
        metrics.push(row_to_metric_mysql(&row)?);
    }
    Ok(metrics)
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Post> {
    let status_str: String = row.get("status");
    let status = PostStatus::from_str(&status_str)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid post status in database: {}", status_str))?;

    let media_str: String = row.get("media_urls");
    let media_urls: Vec<String> =
        serde_json::from_str(&media_str).context("Invalid media_urls JSON in database")?;

    let targets_str: String = row.get("targets");
    let targets: Vec<Platform> =
        serde_json::from_str(&targets_str).context("Invalid targets JSON in database")?;

    let results_str: String = row.get("platform_results");
    let platform_results: Vec<PlatformResult> =
        serde_json::from_str(&results_str).context("Invalid platform_results JSON in database")?;

    Ok(Post {
        id: row.get("id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        media_urls,
        targets,
        status,
        scheduled_for: row.get("scheduled_for"),
        published_at: row.get("published_at"),
        platform_results,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_metric_mysql(row: &sqlx::mysql::MySqlRow) -> Result<PostMetric> {
    let platform_str: String = row.get("platform");
    let platform = Platform::from_str(&platform_str)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid platform in database: {}", platform_str))?;

    Ok(PostMetric {
        id: row.get("id"),
        post_id: row.get("post_id"),
        platform,
        impressions: row.get("impressions"),
        likes: row.get("likes"),
        comments: row.get("comments"),
        shares: row.get("shares"),
        fetched_at: row.get("fetched_at"),
    })
}
