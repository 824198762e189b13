//! Notification repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Notification;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Notification repository trait
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Create a notification
    async fn create(&self, notification: &Notification) -> Result<Notification>;

    /// A user's notifications, newest first
    async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Notification>>;

    /// Count of unread notifications
    async fn unread_count(&self, user_id: i64) -> Result<i64>;

    /// Mark one notification as read. Returns false if it does not belong
    /// to the user or does not exist.
    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool>;

    /// Mark all of a user's notifications as read
    async fn mark_all_read(&self, user_id: i64) -> Result<()>;
}

/// SQLx-based notification repository implementation
pub struct SqlxNotificationRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn create(&self, notification: &Notification) -> Result<Notification> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_sqlite(self.pool.as_sqlite().unwrap(), notification).await
            }
            DatabaseDriver::Mysql => {
                create_mysql(self.pool.as_mysql().unwrap(), notification).await
            }
        }
    }

    async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<Notification>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_for_user_sqlite(self.pool.as_sqlite().unwrap(), user_id, limit).await
            }
            DatabaseDriver::Mysql => {
                list_for_user_mysql(self.pool.as_mysql().unwrap(), user_id, limit).await
            }
        }
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                unread_count_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => {
                unread_count_mysql(self.pool.as_mysql().unwrap(), user_id).await
            }
        }
    }

    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                mark_read_sqlite(self.pool.as_sqlite().unwrap(), id, user_id).await
            }
            DatabaseDriver::Mysql => {
                mark_read_mysql(self.pool.as_mysql().unwrap(), id, user_id).await
            }
        }
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                mark_all_read_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => {
                mark_all_read_mysql(self.pool.as_mysql().unwrap(), user_id).await
            }
        }
    }
}

// SQLite implementation functions

async fn create_sqlite(pool: &SqlitePool, notification: &Notification) -> Result<Notification> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO notifications (user_id, kind, title, body, read, created_at) \
         VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(notification.user_id)
    .bind(&notification.kind)
    .bind(&notification.title)
    .bind(&notification.body)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create notification")?;

    Ok(Notification {
        id: result.last_insert_rowid(),
        read: false,
        created_at: now,
        ..notification.clone()
    })
}

async fn list_for_user_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<Notification>> {
    let rows = sqlx::query(
        "SELECT id, user_id, kind, title, body, read, created_at FROM notifications \
         WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list notifications")?;

    Ok(rows
        .iter()
        .map(|row| Notification {
            id: row.get("id"),
            user_id: row.get("user_id"),
            kind: row.get("kind"),
            title: row.get("title"),
            body: row.get("body"),
            read: row.get("read"),
            created_at: row.get("created_at"),
        })
        .collect())
}

async fn unread_count_sqlite(pool: &SqlitePool, user_id: i64) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM notifications WHERE user_id = ? AND read = 0",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("Failed to count unread notifications")?;
    Ok(row.get("count"))
}

async fn mark_read_sqlite(pool: &SqlitePool, id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to mark notification read")?;
    Ok(result.rows_affected() > 0)
}

async fn mark_all_read_sqlite(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query("UPDATE notifications SET read = 1 WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to mark notifications read")?;
    Ok(())
}

// MySQL implementation functions

async fn create_mysql(pool: &MySqlPool, notification: &Notification) -> Result<Notification> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO notifications (user_id, kind, title, body, `read`, created_at) \
         VALUES (?, ?, ?, ?, 0, ?)",
    )
    .bind(notification.user_id)
    .bind(&notification.kind)
    .bind(&notification.title)
    .bind(&notification.body)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create notification")?;

    Ok(Notification {
        id: result.last_insert_id() as i64,
        read: false,
        created_at: now,
        ..notification.clone()
    })
}

async fn list_for_user_mysql(
    pool: &MySqlPool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<Notification>> {
    let rows = sqlx::query(
        "SELECT id, user_id, kind, title, body, `read`, created_at FROM notifications \
         WHERE user_id = ? ORDER BY created_at DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list notifications")?;

    Ok(rows
        .iter()
        .map(|row| {
            let read: i8 = row.get("read");
            Notification {
                id: row.get("id"),
                user_id: row.get("user_id"),
                kind: row.get("kind"),
                title: row.get("title"),
                body: row.get("body"),
                read: read != 0,
                created_at: row.get("created_at"),
            }
        })
        .collect())
}

async fn unread_count_mysql(pool: &MySqlPool, user_id: i64) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COUNT(*) as count FROM notifications WHERE user_id = ? AND `read` = 0",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .context("Failed to count unread notifications")?;
    Ok(row.get("count"))
}

async fn mark_read_mysql(pool: &MySqlPool, id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query("UPDATE notifications SET `read` = 1 WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to mark notification read")?;
    Ok(result.rows_affected() > 0)
}

async fn mark_all_read_mysql(pool: &MySqlPool, user_id: i64) -> Result<()> {
    sqlx::query("UPDATE notifications SET `read` = 1 WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to mark notifications read")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::user::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (SqlxNotificationRepository, i64) {
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

        (SqlxNotificationRepository::new(pool), user.id)
    }

    fn notification(user_id: i64, title: &str) -> Notification {
        Notification {
            id: 0,
            user_id,
            kind: "post_published".to_string(),
            title: title.to_string(),
            body: "body".to_string(),
            read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let (repo, user_id) = setup().await;
        repo.create(&notification(user_id, "one")).await.expect("create");
        repo.create(&notification(user_id, "two")).await.expect("create");

        let list = repo.list_for_user(user_id, 50).await.expect("list");
        assert_eq!(list.len(), 2);
        assert!(!list[0].read);
    }

    #[tokio::test]
    async fn test_unread_count_and_mark_read() {
        let (repo, user_id) = setup().await;
        let n = repo.create(&notification(user_id, "one")).await.expect("create");
        repo.create(&notification(user_id, "two")).await.expect("create");

        assert_eq!(repo.unread_count(user_id).await.expect("count"), 2);

        assert!(repo.mark_read(n.id, user_id).await.expect("mark"));
        assert_eq!(repo.unread_count(user_id).await.expect("count"), 1);

        // Wrong owner does not mark
        assert!(!repo.mark_read(n.id, user_id + 1).await.expect("mark"));
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let (repo, user_id) = setup().await;
        repo.create(&notification(user_id, "one")).await.expect("create");
        repo.create(&notification(user_id, "two")).await.expect("create");

        repo.mark_all_read(user_id).await.expect("mark all");
        assert_eq!(repo.unread_count(user_id).await.expect("count"), 0);
    }
}
