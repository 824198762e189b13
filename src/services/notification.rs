//! Notification service

use crate::db::repositories::NotificationRepository;
use crate::models::Notification;
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;

const DEFAULT_LIST_LIMIT: i64 = 50;

pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    /// Create a notification for a user.
    pub async fn notify(
        &self,
        user_id: i64,
        kind: &str,
        title: &str,
        body: &str,
    ) -> Result<Notification> {
        let notification = Notification {
            id: 0,
            user_id,
            kind: kind.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            read: false,
            created_at: Utc::now(),
        };

        self.repo
            .create(&notification)
            .await
            .context("Failed to create notification")
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Notification>> {
        self.repo
            .list_for_user(user_id, DEFAULT_LIST_LIMIT)
            .await
            .context("Failed to list notifications")
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64> {
        self.repo
            .unread_count(user_id)
            .await
            .context("Failed to count unread notifications")
    }

    /// Returns false when the notification is missing or owned by
    /// someone else.
    pub async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool> {
        self.repo
            .mark_read(id, user_id)
            .await
            .context("Failed to mark notification read")
    }

    pub async fn mark_all_read(&self, user_id: i64) -> Result<()> {
        self.repo
            .mark_all_read(user_id)
            .await
            .context("Failed to mark notifications read")
    }
}

/// Well-known notification kinds
pub mod kinds {
    pub const POST_PUBLISHED: &str = "post_published";
    pub const POST_FAILED: &str = "post_failed";
    pub const TEAM_INVITE: &str = "team_invite";
    pub const PAYMENT_RECEIVED: &str = "payment_received";
    pub const PLAN_CHANGED: &str = "plan_changed";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxNotificationRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (NotificationService, i64) {
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

        (
            NotificationService::new(Arc::new(SqlxNotificationRepository::new(pool))),
            user.id,
        )
    }

    #[tokio::test]
    async fn test_notify_and_read_flow() {
        let (service, user_id) = setup().await;

        let n = service
            .notify(user_id, kinds::POST_PUBLISHED, "Published", "Your post went out")
            .await
            .expect("notify");
        assert!(!n.read);

        assert_eq!(service.unread_count(user_id).await.expect("count"), 1);
        assert!(service.mark_read(n.id, user_id).await.expect("mark"));
        assert_eq!(service.unread_count(user_id).await.expect("count"), 0);
    }
}
