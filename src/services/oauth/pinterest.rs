//! Pinterest platform client
//!
//! OAuth against the v5 API. Pins require an image, so publishing
//! rejects content without media. Pins land on the account's first
//! board.

use super::{PlatformClient, PlatformMetrics, PublishContent, RemoteProfile, SocialError, TokenSet};
use crate::models::Platform;
use async_trait::async_trait;
use serde::Deserialize;

const AUTHORIZE_URL: &str = "https://www.pinterest.com/oauth/";
const TOKEN_URL: &str = "https://api.pinterest.com/v5/oauth/token";
const USER_ACCOUNT_URL: &str = "https://api.pinterest.com/v5/user_account";
const BOARDS_URL: &str = "https://api.pinterest.com/v5/boards";
const PINS_URL: &str = "https://api.pinterest.com/v5/pins";

const SCOPES: &str = "boards:read,pins:read,pins:write,user_accounts:read";

pub struct PinterestClient {
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
struct UserAccount {
    username: String,
    profile_image: Option<String>,
}

#[derive(Deserialize)]
struct Board {
    id: String,
}

#[derive(Deserialize)]
struct BoardList {
    items: Vec<Board>,
}

#[derive(Deserialize)]
struct Pin {
    id: String,
}

#[derive(Deserialize, Default)]
struct PinAnalytics {
    #[serde(default)]
    impression: i64,
    #[serde(default)]
    save: i64,
    #[serde(default)]
    pin_click: i64,
}

impl PinterestClient {
    pub fn new(http: reqwest::Client, client_id: String, client_secret: String) -> Self {
        Self {
            http,
            client_id,
            client_secret,
        }
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenSet, SocialError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(params)
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Pinterest token request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SocialError::PlatformError(format!(
                "Pinterest token request failed with {}: {}",
                status, body
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Pinterest token response: {}", e)))?;

        Ok(TokenSet {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
        })
    }

    async fn first_board_id(&self, access_token: &str) -> Result<String, SocialError> {
        let response = self
            .http
            .get(BOARDS_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Pinterest boards: {}", e)))?;

        if !response.status().is_success() {
            return Err(SocialError::PlatformError(format!(
                "Pinterest boards failed with {}",
                response.status()
            )));
        }

        let boards: BoardList = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Pinterest boards body: {}", e)))?;

        boards
            .items
            .into_iter()
            .next()
            .map(|b| b.id)
            .ok_or_else(|| {
                SocialError::PlatformError("Pinterest account has no boards".to_string())
            })
    }
}

#[async_trait]
impl PlatformClient for PinterestClient {
    fn platform(&self) -> Platform {
        Platform::Pinterest
    }

    fn authorize_url(&self, state: &str, redirect_uri: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&state={}&scope={}",
            AUTHORIZE_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(SCOPES)
        )
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenSet, SocialError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
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
            .get(USER_ACCOUNT_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Pinterest profile: {}", e)))?;

        if !response.status().is_success() {
            return Err(SocialError::PlatformError(format!(
                "Pinterest profile failed with {}",
                response.status()
            )));
        }

        let account: UserAccount = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Pinterest profile body: {}", e)))?;

        Ok(RemoteProfile {
            id: account.username.clone(),
            handle: account.username,
            avatar_url: account.profile_image,
        })
    }

    async fn publish(
        &self,
        access_token: &str,
        content: &PublishContent,
    ) -> Result<String, SocialError> {
        let image_url = content.media_urls.first().ok_or_else(|| {
            SocialError::PlatformError("Pinterest requires at least one image".to_string())
        })?;

        let board_id = self.first_board_id(access_token).await?;
        let payload = build_pin_payload(&board_id, &content.text, image_url);

        let response = self
            .http
            .post(PINS_URL)
            .bearer_auth(access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Pinterest publish: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SocialError::PlatformError(format!(
                "Pinterest publish failed with {}: {}",
                status, body
            )));
        }

        let pin: Pin = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Pinterest publish body: {}", e)))?;

        Ok(pin.id)
    }

    async fn fetch_metrics(
        &self,
        access_token: &str,
        remote_post_id: &str,
    ) -> Result<PlatformMetrics, SocialError> {
        let url = format!("{}/{}/analytics", PINS_URL, remote_post_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Pinterest metrics: {}", e)))?;

        if !response.status().is_success() {
            return Err(SocialError::PlatformError(format!(
                "Pinterest metrics failed with {}",
                response.status()
            )));
        }

        let analytics: PinAnalytics = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Pinterest metrics body: {}", e)))?;

        Ok(PlatformMetrics {
            impressions: analytics.impression,
            likes: analytics.save,
            comments: 0,
            shares: analytics.pin_click,
        })
    }
}

fn build_pin_payload(board_id: &str, text: &str, image_url: &str) -> serde_json::Value {
    // Pinterest caps titles at 100 characters
    let title: String = text.chars().take(100).collect();

    serde_json::json!({
        "board_id": board_id,
        "title": title,
        "description": text,
        "media_source": {
            "source_type": "image_url",
            "url": image_url,
        }
    })
}
