//! Social account repository
//!
//! Stores one row per (user, platform) connection. Reconnecting upserts the
//! row so stale tokens never linger.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Platform, SocialAccount};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Social account repository trait
#[async_trait]
pub trait SocialAccountRepository: Send + Sync {
    /// Insert or replace the connection for (user, platform)
    async fn upsert(&self, account: &SocialAccount) -> Result<SocialAccount>;

    /// Get a user's connection to one platform
    async fn get(&self, user_id: i64, platform: Platform) -> Result<Option<SocialAccount>>;

    /// List all of a user's connections
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<SocialAccount>>;

    /// Persist refreshed tokens
    async fn update_tokens(
        &self,
        id: i64,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Remove the connection
    async fn delete(&self, user_id: i64, platform: Platform) -> Result<bool>;
}

/// SQLx-based social account repository implementation
pub struct SqlxSocialAccountRepository {
    pool: DynDatabasePool,
}

impl SqlxSocialAccountRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SocialAccountRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SocialAccountRepository for SqlxSocialAccountRepository {
    async fn upsert(&self, account: &SocialAccount) -> Result<SocialAccount> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                upsert_account_sqlite(self.pool.as_sqlite().unwrap(), account).await
            }
            DatabaseDriver::Mysql => {
                upsert_account_mysql(self.pool.as_mysql().unwrap(), account).await
            }
        }
    }

    async fn get(&self, user_id: i64, platform: Platform) -> Result<Option<SocialAccount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_account_sqlite(self.pool.as_sqlite().unwrap(), user_id, platform).await
            }
            DatabaseDriver::Mysql => {
                get_account_mysql(self.pool.as_mysql().unwrap(), user_id, platform).await
            }
        }
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<SocialAccount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_accounts_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => {
                list_accounts_mysql(self.pool.as_mysql().unwrap(), user_id).await
            }
        }
    }

    async fn update_tokens(
        &self,
        id: i64,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_tokens_sqlite(
                    self.pool.as_sqlite().unwrap(),
                    id,
                    access_token,
                    refresh_token,
                    expires_at,
                )
                .await
            }
            DatabaseDriver::Mysql => {
                update_tokens_mysql(
                    self.pool.as_mysql().unwrap(),
                    id,
                    access_token,
                    refresh_token,
                    expires_at,
                )
                .await
            }
        }
    }

    async fn delete(&self, user_id: i64, platform: Platform) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                delete_account_sqlite(self.pool.as_sqlite().unwrap(), user_id, platform).await
            }
            DatabaseDriver::Mysql => {
                delete_account_mysql(self.pool.as_mysql().unwrap(), user_id, platform).await
            }
        }
    }
}

const ACCOUNT_COLUMNS: &str = "id, user_id, platform, access_token, refresh_token, \
     token_expires_at, remote_id, remote_handle, remote_avatar_url, connected_at, refreshed_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn upsert_account_sqlite(pool: &SqlitePool, account: &SocialAccount) -> Result<SocialAccount> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO social_accounts
            (user_id, platform, access_token, refresh_token, token_expires_at,
             remote_id, remote_handle, remote_avatar_url, connected_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id, platform) DO UPDATE SET
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            token_expires_at = excluded.token_expires_at,
            remote_id = excluded.remote_id,
            remote_handle = excluded.remote_handle,
            remote_avatar_url = excluded.remote_avatar_url,
            connected_at = excluded.connected_at,
            refreshed_at = NULL
        "#,
    )
    .bind(account.user_id)
    .bind(account.platform.to_string())
    .bind(&account.access_token)
    .bind(&account.refresh_token)
    .bind(account.token_expires_at)
    .bind(&account.remote_id)
    .bind(&account.remote_handle)
    .bind(&account.remote_avatar_url)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to upsert social account")?;

    get_account_sqlite(pool, account.user_id, account.platform)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Social account not found after upsert"))
}

async fn get_account_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    platform: Platform,
) -> Result<Option<SocialAccount>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM social_accounts WHERE user_id = ? AND platform = ?",
        ACCOUNT_COLUMNS
    ))
    .bind(user_id)
    .bind(platform.to_string())
    .fetch_optional(pool)
    .await
    .context("Failed to get social account")?;

    match row {
        Some(row) => Ok(Some(row_to_account_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn list_accounts_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<SocialAccount>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM social_accounts WHERE user_id = ? ORDER BY connected_at",
        ACCOUNT_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list social accounts")?;

    let mut accounts = Vec::new();
    for row in rows {
        accounts.push(row_to_account_sqlite(&row)?);
    }
    Ok(accounts)
}

async fn update_tokens_sqlite(
    pool: &SqlitePool,
    id: i64,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE social_accounts
        SET access_token = ?, refresh_token = COALESCE(?, refresh_token),
            token_expires_at = ?, refreshed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(access_token)
    .bind(refresh_token)
    .bind(expires_at)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update social account tokens")?;
    Ok(())
}

async fn delete_account_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    platform: Platform,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM social_accounts WHERE user_id = ? AND platform = ?")
        .bind(user_id)
        .bind(platform.to_string())
        .execute(pool)
        .await
        .context("Failed to delete social account")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_account_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<SocialAccount> {
    let platform_str: String = row.get("platform");
    let platform = Platform::from_str(&platform_str)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid platform in database: {}", platform_str))?;

    Ok(SocialAccount {
        id: row.get("id"),
        user_id: row.get("user_id"),
        platform,
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        token_expires_at: row.get("token_expires_at"),
        remote_id: row.get("remote_id"),
        remote_handle: row.get("remote_handle"),
        remote_avatar_url: row.get("remote_avatar_url"),
        connected_at: row.get("connected_at"),
        refreshed_at: row.get("refreshed_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn upsert_account_mysql(pool: &MySqlPool, account: &SocialAccount) -> Result<SocialAccount> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO social_accounts
            (user_id, platform, access_token, refresh_token, token_expires_at,
             remote_id, remote_handle, remote_avatar_url, connected_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            access_token = VALUES(access_token),
            refresh_token = VALUES(refresh_token),
            token_expires_at = VALUES(token_expires_at),
            remote_id = VALUES(remote_id),
            remote_handle = VALUES(remote_handle),
            remote_avatar_url = VALUES(remote_avatar_url),
            connected_at = VALUES(connected_at),
            refreshed_at = NULL
        "#,
    )
    .bind(account.user_id)
    .bind(account.platform.to_string())
    .bind(&account.access_token)
    .bind(&account.refresh_token)
    .bind(account.token_expires_at)
    .bind(&account.remote_id)
    .bind(&account.remote_handle)
    .bind(&account.remote_avatar_url)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to upsert social account")?;

    get_account_mysql(pool, account.user_id, account.platform)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Social account not found after upsert"))
}

async fn get_account_mysql(
    pool: &MySqlPool,
    user_id: i64,
    platform: Platform,
) -> Result<Option<SocialAccount>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM social_accounts WHERE user_id = ? AND platform = ?",
        ACCOUNT_COLUMNS
    ))
    .bind(user_id)
    .bind(platform.to_string())
    .fetch_optional(pool)
    .await
    .context("Failed to get social account")?;

    match row {
        Some(row) => Ok(Some(row_to_account_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn list_accounts_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<SocialAccount>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM social_accounts WHERE user_id = ? ORDER BY connected_at",
        ACCOUNT_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list social accounts")?;

    let mut accounts = Vec::new();
    for row in rows {
        accounts.push(row_to_account_mysql(&row)?);
    }
    Ok(accounts)
}

async fn update_tokens_mysql(
    pool: &MySqlPool,
    id: i64,
    access_token: &str,
    refresh_token: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE social_accounts
        SET access_token = ?, refresh_token = COALESCE(?, refresh_token),
            token_expires_at = ?, refreshed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(access_token)
    .bind(refresh_token)
    .bind(expires_at)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update social account tokens")?;
    Ok(())
}

async fn delete_account_mysql(pool: &MySqlPool, user_id: i64, platform: Platform) -> Result<bool> {
    let result = sqlx::query("DELETE FROM social_accounts WHERE user_id = ? AND platform = ?")
        .bind(user_id)
        .bind(platform.to_string())
        .execute(pool)
        .await
        .context("Failed to delete social account")?;
    Ok(result.rows_affected() > 0)
}

fn row_to_account_mysql(row: &sqlx::mysql::MySqlRow) -> Result<SocialAccount> {
    let platform_str: String = row.get("platform");
    let platform = Platform::from_str(&platform_str)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid platform in database: {}", platform_str))?;

    Ok(SocialAccount {
        id: row.get("id"),
        user_id: row.get("user_id"),
        platform,
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        token_expires_at: row.get("token_expires_at"),
        remote_id: row.get("remote_id"),
        remote_handle: row.get("remote_handle"),
        remote_avatar_url: row.get("remote_avatar_url"),
        connected_at: row.get("connected_at"),
        refreshed_at: row.get("refreshed_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::user::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (SqlxSocialAccountRepository, i64) {
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

        (SqlxSocialAccountRepository::new(pool), user.id)
    }

    fn account(user_id: i64, platform: Platform, token: &str) -> SocialAccount {
        SocialAccount {
            id: 0,
            user_id,
            platform,
            access_token: token.to_string(),
            refresh_token: Some("refresh".to_string()),
            token_expires_at: None,
            remote_id: "remote-1".to_string(),
            remote_handle: "alice".to_string(),
            remote_avatar_url: None,
            connected_at: Utc::now(),
            refreshed_at: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let (repo, user_id) = setup().await;

        let created = repo
            .upsert(&account(user_id, Platform::Twitter, "tok-1"))
            .await
            .expect("upsert");
        assert!(created.id > 0);

        let found = repo
            .get(user_id, Platform::Twitter)
            .await
            .expect("get")
            .expect("found");
        assert_eq!(found.access_token, "tok-1");
    }

    #[tokio::test]
    async fn test_reconnect_replaces_tokens() {
        let (repo, user_id) = setup().await;

        let first = repo
            .upsert(&account(user_id, Platform::Twitter, "tok-1"))
            .await
            .expect("upsert");
        let second = repo
            .upsert(&account(user_id, Platform::Twitter, "tok-2"))
            .await
            .expect("upsert");

        // Same row, new token
        assert_eq!(first.id, second.id);
        assert_eq!(second.access_token, "tok-2");

        let all = repo.list_for_user(user_id).await.expect("list");
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_list_multiple_platforms() {
        let (repo, user_id) = setup().await;

        repo.upsert(&account(user_id, Platform::Twitter, "t"))
            .await
            .expect("upsert");
        repo.upsert(&account(user_id, Platform::Linkedin, "l"))
            .await
            .expect("upsert");

        let all = repo.list_for_user(user_id).await.expect("list");
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_update_tokens() {
        let (repo, user_id) = setup().await;
        let created = repo
            .upsert(&account(user_id, Platform::Linkedin, "old"))
            .await
            .expect("upsert");

        let expires = Utc::now() + chrono::Duration::hours(1);
        repo.update_tokens(created.id, "new", None, Some(expires))
            .await
            .expect("update_tokens");

        let found = repo
            .get(user_id, Platform::Linkedin)
            .await
            .expect("get")
            .expect("found");
        assert_eq!(found.access_token, "new");
        // refresh_token survives a refresh response that omits it
        assert_eq!(found.refresh_token.as_deref(), Some("refresh"));
        assert!(found.refreshed_at.is_some());
    }

    #[tokio::test]
    async fn test_delete() {
        let (repo, user_id) = setup().await;
        repo.upsert(&account(user_id, Platform::Devto, "key"))
            .await
            .expect("upsert");

        assert!(repo.delete(user_id, Platform::Devto).await.expect("delete"));
        assert!(!repo.delete(user_id, Platform::Devto).await.expect("delete"));
        assert!(repo
            .get(user_id, Platform::Devto)
            .await
            .expect("get")
            .is_none());
    }
}
