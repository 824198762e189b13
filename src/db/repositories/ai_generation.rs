//! AI generation usage repository
//!
//! One row per completed generation. Monthly quota checks count rows
//! since the start of the current calendar month.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// AI generation usage repository trait
#[async_trait]
pub trait AiGenerationRepository: Send + Sync {
    /// Record a completed generation
    async fn record(&self, user_id: i64) -> Result<()>;

    /// Generations by a user since the given time
    async fn count_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<i64>;

    /// Total generations across all users (admin stats)
    async fn count(&self) -> Result<i64>;
}

/// SQLx-based AI generation repository implementation
pub struct SqlxAiGenerationRepository {
    pool: DynDatabasePool,
}

impl SqlxAiGenerationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AiGenerationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AiGenerationRepository for SqlxAiGenerationRepository {
    async fn record(&self, user_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => record_sqlite(self.pool.as_sqlite().unwrap(), user_id).await,
            DatabaseDriver::Mysql => record_mysql(self.pool.as_mysql().unwrap(), user_id).await,
        }
    }

    async fn count_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                count_since_sqlite(self.pool.as_sqlite().unwrap(), user_id, since).await
            }
            DatabaseDriver::Mysql => {
                count_since_mysql(self.pool.as_mysql().unwrap(), user_id, since).await
            }
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => count_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }
}

async fn record_sqlite(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query("INSERT INTO ai_generations (user_id, created_at) VALUES (?, ?)")
        .bind(user_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to record AI generation")?;
    Ok(())
}

async fn count_since_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    since: DateTime<Utc>,
) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM ai_generations WHERE user_id = ? AND created_at >= ?",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await
    .context("Failed to count AI generations")?;
    Ok(row.get("count"))
}

async fn count_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM ai_generations")
        .fetch_one(pool)
        .await
        .context("Failed to count AI generations")?;
    Ok(row.get("count"))
}

async fn record_mysql(pool: &MySqlPool, user_id: i64) -> Result<()> {
    sqlx::query("INSERT INTO ai_generations (user_id, created_at) VALUES (?, ?)")
        .bind(user_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .context("Failed to record AI generation")?;
    Ok(())
}

async fn count_since_mysql(
    pool: &MySqlPool,
    user_id: i64,
    since: DateTime<Utc>,
) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM ai_generations WHERE user_id = ? AND created_at >= ?",
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(pool)
    .await
    .context("Failed to count AI generations")?;
    Ok(row.get("count"))
}

async fn count_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM ai_generations")
        .fetch_one(pool)
        .await
        .context("Failed to count AI generations")?;
    Ok(row.get("count"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::user::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};
    use chrono::Duration;

    async fn setup() -> (SqlxAiGenerationRepository, i64) {
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

        (SqlxAiGenerationRepository::new(pool), user.id)
    }

    #[tokio::test]
    async fn test_record_and_count() {
        let (repo, user_id) = setup().await;
        repo.record(user_id).await.expect("record");
        repo.record(user_id).await.expect("record");

        let since = Utc::now() - Duration::days(30);
        assert_eq!(repo.count_since(user_id, since).await.expect("count"), 2);
        assert_eq!(repo.count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn test_count_since_excludes_other_users() {
        let (repo, user_id) = setup().await;
        repo.record(user_id).await.expect("record");

        let since = Utc::now() - Duration::days(30);
        assert_eq!(repo.count_since(user_id + 1, since).await.expect("count"), 0);
    }
}
