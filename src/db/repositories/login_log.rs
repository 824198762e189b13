//! Login attempt log repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Login log repository trait
#[async_trait]
pub trait LoginLogRepository: Send + Sync {
    /// Record a login attempt
    async fn record(&self, username: &str, ip_address: &str, success: bool) -> Result<()>;

    /// Failed attempts for a username since the given time
    async fn failed_attempts_since(&self, username: &str, since: DateTime<Utc>) -> Result<i64>;
}

/// SQLx-based login log repository implementation
pub struct SqlxLoginLogRepository {
    pool: DynDatabasePool,
}

impl SqlxLoginLogRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn LoginLogRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl LoginLogRepository for SqlxLoginLogRepository {
    async fn record(&self, username: &str, ip_address: &str, success: bool) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                record_sqlite(self.pool.as_sqlite().unwrap(), username, ip_address, success).await
            }
            DatabaseDriver::Mysql => {
                record_mysql(self.pool.as_mysql().unwrap(), username, ip_address, success).await
            }
        }
    }

    async fn failed_attempts_since(&self, username: &str, since: DateTime<Utc>) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                failed_since_sqlite(self.pool.as_sqlite().unwrap(), username, since).await
            }
            DatabaseDriver::Mysql => {
                failed_since_mysql(self.pool.as_mysql().unwrap(), username, since).await
            }
        }
    }
}

async fn record_sqlite(
    pool: &SqlitePool,
    username: &str,
    ip_address: &str,
    success: bool,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO login_logs (username, ip_address, success, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(ip_address)
    .bind(success)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to record login attempt")?;
    Ok(())
}

async fn failed_since_sqlite(
    pool: &SqlitePool,
    username: &str,
    since: DateTime<Utc>,
) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM login_logs \
         WHERE username = ? AND success = 0 AND created_at >= ?",
    )
    .bind(username)
    .bind(since)
    .fetch_one(pool)
    .await
    .context("Failed to count failed login attempts")?;
    Ok(row.get("count"))
}

async fn record_mysql(
    pool: &MySqlPool,
    username: &str,
    ip_address: &str,
    success: bool,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO login_logs (username, ip_address, success, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(ip_address)
    .bind(success)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to record login attempt")?;
    Ok(())
}

async fn failed_since_mysql(
    pool: &MySqlPool,
    username: &str,
    since: DateTime<Utc>,
) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM login_logs \
         WHERE username = ? AND success = 0 AND created_at >= ?",
    )
    .bind(username)
    .bind(since)
    .fetch_one(pool)
    .await
    .context("Failed to count failed login attempts")?;
    Ok(row.get("count"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup() -> SqlxLoginLogRepository {
        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");
        SqlxLoginLogRepository::new(pool)
    }

    #[tokio::test]
    async fn test_failed_attempts_counted() {
        let repo = setup().await;
        repo.record("alice", "127.0.0.1", false).await.expect("record");
        repo.record("alice", "127.0.0.1", false).await.expect("record");
        repo.record("alice", "127.0.0.1", true).await.expect("record");
        repo.record("bob", "127.0.0.1", false).await.expect("record");

        let since = Utc::now() - Duration::minutes(15);
        assert_eq!(
            repo.failed_attempts_since("alice", since).await.expect("count"),
            2
        );
        assert_eq!(
            repo.failed_attempts_since("bob", since).await.expect("count"),
            1
        );
    }

    #[tokio::test]
    async fn test_window_excludes_old_attempts() {
        let repo = setup().await;
        repo.record("alice", "127.0.0.1", false).await.expect("record");

        let since = Utc::now() + Duration::minutes(1);
        assert_eq!(
            repo.failed_attempts_since("alice", since).await.expect("count"),
            0
        );
    }
}
