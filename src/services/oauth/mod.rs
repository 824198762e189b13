//! Platform connections
//!
//! Each supported network implements `PlatformClient`; the
//! `ConnectionManager` drives the authorization flow, persists accounts,
//! and transparently refreshes tokens close to expiry.

pub mod devto;
pub mod linkedin;
pub mod pinterest;
pub mod state;
pub mod twitter;

use crate::db::repositories::SocialAccountRepository;
use crate::models::{Platform, SocialAccount};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub use state::{StateSigner, StateToken};

/// Tokens refreshed when they expire within this window.
const REFRESH_SKEW_MINUTES: i64 = 5;

/// Error types for platform connection operations
#[derive(Debug, thiserror::Error)]
pub enum SocialError {
    #[error("Platform {0} is not configured")]
    NotConfigured(Platform),

    #[error("Platform {0} is not connected")]
    NotConnected(Platform),

    #[error("Invalid or expired state token")]
    InvalidState,

    #[error("Token expired and no refresh token available")]
    TokenExpired,

    #[error("Platform request failed: {0}")]
    PlatformError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Token material returned by a code exchange or refresh
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime in seconds; None means the token does not expire
    pub expires_in: Option<i64>,
}

/// The connected account's identity on the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteProfile {
    pub id: String,
    pub handle: String,
    pub avatar_url: Option<String>,
}

/// Content handed to a platform for publishing
#[derive(Debug, Clone)]
pub struct PublishContent {
    pub text: String,
    pub media_urls: Vec<String>,
}

/// Engagement numbers for one remote post
#[derive(Debug, Clone, Default)]
pub struct PlatformMetrics {
    pub impressions: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
}

/// One supported network
#[async_trait]
pub trait PlatformClient: Send + Sync {
    fn platform(&self) -> Platform;

    /// The URL the user is redirected to for authorization
    fn authorize_url(&self, state: &str, redirect_uri: &str) -> String;

    /// Exchange an authorization code for tokens
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet, SocialError>;

    /// Refresh an access token
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, SocialError>;

    /// Fetch the authenticated account's profile
    async fn fetch_profile(&self, access_token: &str) -> Result<RemoteProfile, SocialError>;

    /// Publish content, returning the platform's post ID
    async fn publish(
        &self,
        access_token: &str,
        content: &PublishContent,
    ) -> Result<String, SocialError>;

    /// Fetch engagement metrics for a published post
    async fn fetch_metrics(
        &self,
        access_token: &str,
        remote_post_id: &str,
    ) -> Result<PlatformMetrics, SocialError>;
}

/// Everything the client needs to start a connection flow
#[derive(Debug, Clone, Serialize)]
pub struct ConnectStart {
    pub authorize_url: String,
    pub state: String,
}

/// Health report for one connection
#[derive(Debug, Serialize)]
pub struct ConnectionHealth {
    pub platform: Platform,
    pub healthy: bool,
    pub remote_handle: String,
    pub detail: Option<String>,
}

/// Manages account connections across all configured platforms
pub struct ConnectionManager {
    clients: HashMap<Platform, Arc<dyn PlatformClient>>,
    account_repo: Arc<dyn SocialAccountRepository>,
    signer: StateSigner,
    public_url: String,
}

impl ConnectionManager {
    pub fn new(
        clients: HashMap<Platform, Arc<dyn PlatformClient>>,
        account_repo: Arc<dyn SocialAccountRepository>,
        signer: StateSigner,
        public_url: String,
    ) -> Self {
        Self {
            clients,
            account_repo,
            signer,
            public_url,
        }
    }

    pub fn client(&self, platform: Platform) -> Result<&Arc<dyn PlatformClient>, SocialError> {
        self.clients
            .get(&platform)
            .ok_or(SocialError::NotConfigured(platform))
    }

    fn redirect_uri(&self, platform: Platform) -> String {
        format!(
            "{}/api/social/{}/callback",
            self.public_url.trim_end_matches('/'),
            platform
        )
    }

    /// Build the authorization URL that starts a connection flow.
    ///
    /// The state is returned alongside the URL: OAuth platforms carry it
    /// through the redirect, key-based platforms (Dev.to) submit it to
    /// the callback together with the API key.
    pub fn connect_url(
        &self,
        user_id: i64,
        platform: Platform,
    ) -> Result<ConnectStart, SocialError> {
        let client = self.client(platform)?;
        let token = StateToken::new(user_id, platform);
        let state = self.signer.sign(&token)?;
        let authorize_url = client.authorize_url(&state, &self.redirect_uri(platform));
        Ok(ConnectStart {
            authorize_url,
            state,
        })
    }

    /// Complete the flow: verify state, exchange the code, fetch the
    /// remote profile, and persist the connection. Reconnecting replaces
    /// the stored tokens for the same (user, platform) pair.
    pub async fn handle_callback(
        &self,
        state: &str,
        code: &str,
    ) -> Result<SocialAccount, SocialError> {
        let token = self
            .signer
            .verify(state)
            .map_err(|_| SocialError::InvalidState)?;

        let client = self.client(token.platform)?;
        let redirect_uri = self.redirect_uri(token.platform);
        let tokens = client.exchange_code(code, &redirect_uri).await?;
        let profile = client.fetch_profile(&tokens.access_token).await?;

        let now = Utc::now();
        let account = SocialAccount {
            id: 0,
            user_id: token.user_id,
            platform: token.platform,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_expires_at: tokens
                .expires_in
                .map(|secs| now + Duration::seconds(secs)),
            remote_id: profile.id,
            remote_handle: profile.handle,
            remote_avatar_url: profile.avatar_url,
            connected_at: now,
            refreshed_at: None,
        };

        let saved = self
            .account_repo
            .upsert(&account)
            .await
            .map_err(SocialError::InternalError)?;
        Ok(saved)
    }

    /// Return a usable access token for the account, refreshing it first
    /// when it expires within the skew window.
    pub async fn fresh_access_token(
        &self,
        account: &SocialAccount,
    ) -> Result<String, SocialError> {
        if !account.token_expires_within(Duration::minutes(REFRESH_SKEW_MINUTES)) {
            return Ok(account.access_token.clone());
        }

        let refresh_token = account
            .refresh_token
            .as_deref()
            .ok_or(SocialError::TokenExpired)?;

        let client = self.client(account.platform)?;
        let tokens = client.refresh_token(refresh_token).await?;

        let expires_at = tokens
            .expires_in
            .map(|secs| Utc::now() + Duration::seconds(secs));

        self.account_repo
            .update_tokens(
                account.id,
                &tokens.access_token,
                tokens.refresh_token.as_deref(),
                expires_at,
            )
            .await
            .map_err(SocialError::InternalError)?;

        Ok(tokens.access_token)
    }

    /// The account for (user, platform), or NotConnected.
    pub async fn require_account(
        &self,
        user_id: i64,
        platform: Platform,
    ) -> Result<SocialAccount, SocialError> {
        self.account_repo
            .get(user_id, platform)
            .await
            .map_err(SocialError::InternalError)?
            .ok_or(SocialError::NotConnected(platform))
    }

    /// Check a connection end to end: refresh the token if it is about
    /// to expire, then confirm the platform still accepts it. Rejections
    /// are reported as unhealthy rather than returned as errors.
    pub async fn verify(
        &self,
        user_id: i64,
        platform: Platform,
    ) -> Result<ConnectionHealth, SocialError> {
        let account = self.require_account(user_id, platform).await?;

        let access_token = match self.fresh_access_token(&account).await {
            Ok(token) => token,
            Err(SocialError::TokenExpired) => {
                return Ok(ConnectionHealth {
                    platform,
                    healthy: false,
                    remote_handle: account.remote_handle,
                    detail: Some("Token expired and no refresh token available".to_string()),
                })
            }
            Err(e) => return Err(e),
        };

        let client = self.client(platform)?;
        match client.fetch_profile(&access_token).await {
            Ok(profile) => Ok(ConnectionHealth {
                platform,
                healthy: true,
                remote_handle: profile.handle,
                detail: None,
            }),
            Err(SocialError::PlatformError(msg)) => Ok(ConnectionHealth {
                platform,
                healthy: false,
                remote_handle: account.remote_handle,
                detail: Some(msg),
            }),
            Err(e) => Err(e),
        }
    }

    pub async fn list_accounts(&self, user_id: i64) -> Result<Vec<SocialAccount>, SocialError> {
        let accounts = self
            .account_repo
            .list_for_user(user_id)
            .await
            .map_err(SocialError::InternalError)?;
        Ok(accounts)
    }

    /// Remove a connection. Returns false if none existed.
    pub async fn disconnect(&self, user_id: i64, platform: Platform) -> Result<bool, SocialError> {
        let removed = self
            .account_repo
            .delete(user_id, platform)
            .await
            .map_err(SocialError::InternalError)?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSocialAccountRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};
    use tokio::sync::Mutex;

    struct FakeClient {
        platform: Platform,
        refresh_calls: Mutex<u32>,
    }

    impl FakeClient {
        fn new(platform: Platform) -> Self {
            Self {
                platform,
                refresh_calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl PlatformClient for FakeClient {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn authorize_url(&self, state: &str, redirect_uri: &str) -> String {
            format!(
                "https://example.com/authorize?state={}&redirect_uri={}",
                state, redirect_uri
            )
        }

        async fn exchange_code(
            &self,
            code: &str,
            _redirect_uri: &str,
        ) -> Result<TokenSet, SocialError> {
            Ok(TokenSet {
                access_token: format!("access-{}", code),
                refresh_token: Some("refresh-1".to_string()),
                expires_in: Some(3600),
            })
        }

        async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenSet, SocialError> {
            *self.refresh_calls.lock().await += 1;
            Ok(TokenSet {
                access_token: "refreshed-access".to_string(),
                refresh_token: None,
                expires_in: Some(3600),
            })
        }

        async fn fetch_profile(&self, _access_token: &str) -> Result<RemoteProfile, SocialError> {
            Ok(RemoteProfile {
                id: "remote-1".to_string(),
                handle: "alice".to_string(),
                avatar_url: None,
            })
        }

        async fn publish(
            &self,
            _access_token: &str,
            _content: &PublishContent,
        ) -> Result<String, SocialError> {
            Ok("post-1".to_string())
        }

        async fn fetch_metrics(
            &self,
            _access_token: &str,
            _remote_post_id: &str,
        ) -> Result<PlatformMetrics, SocialError> {
            Ok(PlatformMetrics::default())
        }
    }

    async fn setup() -> (ConnectionManager, i64) {
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

        let mut clients: HashMap<Platform, Arc<dyn PlatformClient>> = HashMap::new();
        clients.insert(
            Platform::Linkedin,
            Arc::new(FakeClient::new(Platform::Linkedin)),
        );

        let manager = ConnectionManager::new(
            clients,
            Arc::new(SqlxSocialAccountRepository::new(pool)),
            StateSigner::new("test-secret"),
            "http://localhost:8080".to_string(),
        );

        (manager, user.id)
    }

    #[tokio::test]
    async fn test_connect_url_embeds_state() {
        let (manager, user_id) = setup().await;
        let start = manager
            .connect_url(user_id, Platform::Linkedin)
            .expect("url");
        assert!(start.authorize_url.contains("state="));
        assert!(start.authorize_url.contains("linkedin/callback"));
        assert!(!start.state.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_platform_rejected() {
        let (manager, user_id) = setup().await;
        let result = manager.connect_url(user_id, Platform::Twitter);
        assert!(matches!(result, Err(SocialError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_callback_persists_account() {
        let (manager, user_id) = setup().await;
        let token = StateToken::new(user_id, Platform::Linkedin);
        let state = manager.signer.sign(&token).expect("sign");

        let account = manager
            .handle_callback(&state, "the-code")
            .await
            .expect("callback");

        assert_eq!(account.user_id, user_id);
        assert_eq!(account.remote_handle, "alice");
        assert_eq!(account.access_token, "access-the-code");
        assert!(account.token_expires_at.is_some());
    }

    #[tokio::test]
    async fn test_invalid_state_rejected() {
        let (manager, _) = setup().await;
        let result = manager.handle_callback("garbage", "code").await;
        assert!(matches!(result, Err(SocialError::InvalidState)));
    }

    #[tokio::test]
    async fn test_fresh_token_skips_refresh_when_far_from_expiry() {
        let (manager, user_id) = setup().await;
        let token = StateToken::new(user_id, Platform::Linkedin);
        let state = manager.signer.sign(&token).expect("sign");
        let account = manager
            .handle_callback(&state, "code")
            .await
            .expect("callback");

        let access = manager
            .fresh_access_token(&account)
            .await
            .expect("fresh token");
        assert_eq!(access, account.access_token);
    }

    #[tokio::test]
    async fn test_fresh_token_refreshes_near_expiry() {
        let (manager, user_id) = setup().await;
        let token = StateToken::new(user_id, Platform::Linkedin);
        let state = manager.signer.sign(&token).expect("sign");
        let mut account = manager
            .handle_callback(&state, "code")
            .await
            .expect("callback");

        // Force the stored expiry inside the skew window
        account.token_expires_at = Some(Utc::now() + Duration::minutes(2));

        let access = manager
            .fresh_access_token(&account)
            .await
            .expect("fresh token");
        assert_eq!(access, "refreshed-access");

        // Refresh that omitted a new refresh_token keeps the old one
        let stored = manager
            .require_account(user_id, Platform::Linkedin)
            .await
            .expect("account");
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_verify_reports_healthy_connection() {
        let (manager, user_id) = setup().await;
        let token = StateToken::new(user_id, Platform::Linkedin);
        let state = manager.signer.sign(&token).expect("sign");
        manager
            .handle_callback(&state, "code")
            .await
            .expect("callback");

        let health = manager
            .verify(user_id, Platform::Linkedin)
            .await
            .expect("verify");
        assert!(health.healthy);
        assert_eq!(health.remote_handle, "alice");
        assert!(health.detail.is_none());
    }

    #[tokio::test]
    async fn test_verify_unconnected_platform() {
        let (manager, user_id) = setup().await;
        let result = manager.verify(user_id, Platform::Linkedin).await;
        assert!(matches!(result, Err(SocialError::NotConnected(_))));
    }

    #[tokio::test]
    async fn test_disconnect() {
        let (manager, user_id) = setup().await;
        let token = StateToken::new(user_id, Platform::Linkedin);
        let state = manager.signer.sign(&token).expect("sign");
        manager
            .handle_callback(&state, "code")
            .await
            .expect("callback");

        assert!(manager
            .disconnect(user_id, Platform::Linkedin)
            .await
            .expect("disconnect"));
        let result = manager.require_account(user_id, Platform::Linkedin).await;
        assert!(matches!(result, Err(SocialError::NotConnected(_))));
    }
}
