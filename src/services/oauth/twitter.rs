//! Twitter/X platform client
//!
//! OAuth 2.0 with PKCE against the v2 API. The code verifier is derived
//! deterministically from the client secret so the callback can rebuild
//! it without per-flow storage.

use super::{PlatformClient, PlatformMetrics, PublishContent, RemoteProfile, SocialError, TokenSet};
use crate::models::Platform;
use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

const AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
const TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
const ME_URL: &str = "https://api.twitter.com/2/users/me";
const TWEETS_URL: &str = "https://api.twitter.com/2/tweets";

const SCOPES: &str = "tweet.read tweet.write users.read offline.access";

pub struct TwitterClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct UserData {
    id: String,
    username: String,
    profile_image_url: Option<String>,
}

#[derive(Deserialize)]
struct UserResponse {
    data: UserData,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
}

#[derive(Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Deserialize, Default)]
struct PublicMetrics {
    #[serde(default)]
    impression_count: i64,
    #[serde(default)]
    like_count: i64,
    #[serde(default)]
    reply_count: i64,
    #[serde(default)]
    retweet_count: i64,
}

#[derive(Deserialize)]
struct TweetMetricsData {
    #[serde(default)]
    public_metrics: PublicMetrics,
}

#[derive(Deserialize)]
struct TweetMetricsResponse {
    data: TweetMetricsData,
}

impl TwitterClient {
    pub fn new(http: reqwest::Client, client_id: String, client_secret: String) -> Self {
        Self {
            http,
            client_id,
            client_secret,
        }
    }

    /// PKCE code verifier: 64 hex characters, stable per application.
    fn code_verifier(&self) -> String {
        let digest = Sha256::digest(self.client_secret.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenSet, SocialError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(params)
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Twitter token request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SocialError::PlatformError(format!(
                "Twitter token request failed with {}: {}",
                status, body
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Twitter token response: {}", e)))?;

        Ok(TokenSet {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
        })
    }
}

#[async_trait]
impl PlatformClient for TwitterClient {
    fn platform(&self) -> Platform {
        Platform::Twitter
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}&scope={}&code_challenge={}&code_challenge_method=plain",
            AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(SCOPES),
            urlencoding::encode(&self.code_verifier())
        )
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet, SocialError> {
        let verifier = self.code_verifier();
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", &verifier),
        ])
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, SocialError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<RemoteProfile, SocialError> {
        let response = self
            .http
            .get(ME_URL)
            .query(&[("user.fields", "profile_image_url")])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Twitter profile: {}", e)))?;

        if !response.status().is_success() {
            return Err(SocialError::PlatformError(format!(
                "Twitter profile failed with {}",
                response.status()
            )));
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Twitter profile body: {}", e)))?;

        Ok(RemoteProfile {
            id: user.data.id,
            handle: user.data.username,
            avatar_url: user.data.profile_image_url,
        })
    }

    async fn publish(
        &self,
        access_token: &str,
        content: &PublishContent,
    ) -> Result<String, SocialError> {
        let response = self
            .http
            .post(TWEETS_URL)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "text": content.text }))
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Twitter publish: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SocialError::PlatformError(format!(
                "Twitter publish failed with {}: {}",
                status, body
            )));
        }

        let tweet: TweetResponse = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Twitter publish body: {}", e)))?;

        Ok(tweet.data.id)
    }

    async fn fetch_metrics(
        &self,
        access_token: &str,
        remote_post_id: &str,
    ) -> Result<PlatformMetrics, SocialError> {
        let url = format!("{}/{}", TWEETS_URL, remote_post_id);

        let response = self
            .http
            .get(&url)
            .query(&[("tweet.fields", "public_metrics")])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Twitter metrics: {}", e)))?;

        if !response.status().is_success() {
            return Err(SocialError::PlatformError(format!(
                "Twitter metrics failed with {}",
                response.status()
            )));
        }

        let body: TweetMetricsResponse = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Twitter metrics body: {}", e)))?;

        let metrics = body.data.public_metrics;
        Ok(PlatformMetrics {
            impressions: metrics.impression_count,
            likes: metrics.like_count,
            comments: metrics.reply_count,
            shares: metrics.retweet_count,
        })
    }
}
