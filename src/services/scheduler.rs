//! Scheduled post delivery
//!
//! A background task polls for due posts once a minute and hands them
//! to the post service. Failures are logged and the loop keeps going.

use crate::db::repositories::PostRepository;
use crate::services::post::PostService;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(60);

pub struct Scheduler {
    post_repo: Arc<dyn PostRepository>,
    post_service: Arc<PostService>,
}

impl Scheduler {
    pub fn new(post_repo: Arc<dyn PostRepository>, post_service: Arc<PostService>) -> Self {
        Self {
            post_repo,
            post_service,
        }
    }

    /// One polling pass: publish every scheduled post whose time has
    /// come. Returns how many posts were attempted.
    pub async fn run_once(&self) -> usize {
        let due = match self.post_repo.list_due(Utc::now()).await {
            Ok(posts) => posts,
            Err(err) => {
                tracing::error!("Failed to list due posts: {:#}", err);
                return 0;
            }
        };

        let attempted = due.len();
        for post in due {
            let post_id = post.id;
            if let Err(err) = self.post_service.publish_due_post(post).await {
                tracing::warn!(post_id, "Scheduled publish failed: {}", err);
            }
        }
        attempted
    }

    /// Run the polling loop forever. Spawn this on the runtime.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let attempted = self.run_once().await;
            if attempted > 0 {
                tracing::info!(attempted, "Processed due posts");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryCache};
    use crate::db::repositories::{
        SocialAccountRepository, SqlxAiGenerationRepository, SqlxNotificationRepository,
        SqlxPostRepository, SqlxSocialAccountRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{
        Platform, Post, PostStatus, SocialAccount, User, UserRole,
    };
    use crate::services::notification::NotificationService;
    use crate::services::oauth::{
        ConnectionManager, PlatformClient, PlatformMetrics, PublishContent, RemoteProfile,
        SocialError, StateSigner, TokenSet,
    };
    use crate::services::quota::QuotaService;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use std::collections::HashMap;

    struct StubClient;

    #[async_trait]
    impl PlatformClient for StubClient {
        fn platform(&self) -> Platform {
            Platform::Linkedin
        }

        fn authorize_url(&self, _state: &str, _redirect_uri: &str) -> String {
            String::new()
        }

        async fn exchange_code(
            &self,
            _code: &str,
            _redirect_uri: &str,
        ) -> Result<TokenSet, SocialError> {
            unimplemented!()
        }

        async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenSet, SocialError> {
            unimplemented!()
        }

        async fn fetch_profile(&self, _access_token: &str) -> Result<RemoteProfile, SocialError> {
            unimplemented!()
        }

        async fn publish(
            &self,
            _access_token: &str,
            _content: &PublishContent,
        ) -> Result<String, SocialError> {
            Ok("remote-1".to_string())
        }

        async fn fetch_metrics(
            &self,
            _access_token: &str,
            _remote_post_id: &str,
        ) -> Result<PlatformMetrics, SocialError> {
            Ok(PlatformMetrics::default())
        }
    }

    #[tokio::test]
    async fn test_run_once_publishes_due_posts() {
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

        let account_repo = Arc::new(SqlxSocialAccountRepository::new(pool.clone()));
        account_repo
            .upsert(&SocialAccount {
                id: 0,
                user_id: user.id,
                platform: Platform::Linkedin,
                access_token: "token".to_string(),
                refresh_token: None,
                token_expires_at: None,
                remote_id: "r".to_string(),
                remote_handle: "alice".to_string(),
                remote_avatar_url: None,
                connected_at: Utc::now(),
                refreshed_at: None,
            })
            .await
            .expect("account");

        let mut clients: HashMap<Platform, Arc<dyn PlatformClient>> = HashMap::new();
        clients.insert(Platform::Linkedin, Arc::new(StubClient));

        let post_repo = Arc::new(SqlxPostRepository::new(pool.clone()));

        let service = Arc::new(PostService::new(
            post_repo.clone(),
            Arc::new(SqlxUserRepository::new(pool.clone())),
            Arc::new(ConnectionManager::new(
                clients,
                account_repo,
                StateSigner::new("s"),
                "http://localhost".to_string(),
            )),
            Arc::new(QuotaService::new(
                post_repo.clone(),
                Arc::new(SqlxAiGenerationRepository::new(pool.clone())),
                Arc::new(Cache::Memory(MemoryCache::new())),
            )),
            Arc::new(NotificationService::new(Arc::new(
                SqlxNotificationRepository::new(pool.clone()),
            ))),
        ));

        // A post scheduled in the past is due
        let now = Utc::now();
        let due = post_repo
            .create(&Post {
                id: 0,
                user_id: user.id,
                content: "scheduled".to_string(),
                media_urls: vec![],
                targets: vec![Platform::Linkedin],
                status: PostStatus::Scheduled,
                scheduled_for: Some(now - ChronoDuration::minutes(1)),
                published_at: None,
                platform_results: vec![],
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("create");

        let scheduler = Scheduler::new(post_repo.clone(), service);
        let attempted = scheduler.run_once().await;
        assert_eq!(attempted, 1);

        let published = post_repo
            .get_by_id(due.id)
            .await
            .expect("get")
            .expect("found");
        assert_eq!(published.status, PostStatus::Published);

        // Second pass finds nothing due
        assert_eq!(scheduler.run_once().await, 0);
    }
}
