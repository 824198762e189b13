//! Dev.to platform client
//!
//! Dev.to uses long-lived API keys instead of OAuth. The "authorization
//! code" in this flow is the API key itself, validated by fetching the
//! key owner's profile. Keys never expire, so refresh is unsupported.

use super::{PlatformClient, PlatformMetrics, PublishContent, RemoteProfile, SocialError, TokenSet};
use crate::models::Platform;
use async_trait::async_trait;
use serde::Deserialize;

const API_BASE: &str = "https://dev.to/api";
const SETTINGS_URL: &str = "https://dev.to/settings/extensions";

pub struct DevtoClient {
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct DevtoUser {
    id: i64,
    username: String,
    profile_image: Option<String>,
}

#[derive(Deserialize)]
struct DevtoArticle {
    id: i64,
}

#[derive(Deserialize, Default)]
struct DevtoArticleStats {
    #[serde(default)]
    positive_reactions_count: i64,
    #[serde(default)]
    comments_count: i64,
    #[serde(default)]
    page_views_count: i64,
}

impl DevtoClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Split content into a title (first line) and body.
    fn split_title(text: &str) -> (String, String) {
        let mut lines = text.lines();
        let title = lines.next().unwrap_or("Untitled").trim().to_string();
        let body = lines.collect::<Vec<_>>().join("\n").trim().to_string();
        let title = if title.is_empty() {
            "Untitled".to_string()
        } else {
            title
        };
        (title, body)
    }
}

#[async_trait]
impl PlatformClient for DevtoClient {
    fn platform(&self) -> Platform {
        Platform::Devto
    }

    fn authorize_url(&self, _state: &str, _redirect_uri: &str) -> String {
        // No OAuth flow; the user pastes an API key generated here.
        SETTINGS_URL.to_string()
    }

    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<TokenSet, SocialError> {
        // Validate the key before accepting it
        self.fetch_profile(code).await?;

        Ok(TokenSet {
            access_token: code.to_string(),
            refresh_token: None,
            expires_in: None,
        })
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenSet, SocialError> {
        Err(SocialError::PlatformError(
            "Dev.to API keys do not expire and cannot be refreshed".to_string(),
        ))
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<RemoteProfile, SocialError> {
        let response = self
            .http
            .get(format!("{}/users/me", API_BASE))
            .header("api-key", access_token)
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Dev.to profile: {}", e)))?;

        if !response.status().is_success() {
            return Err(SocialError::PlatformError(format!(
                "Dev.to profile failed with {}",
                response.status()
            )));
        }

        let user: DevtoUser = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Dev.to profile body: {}", e)))?;

        Ok(RemoteProfile {
            id: user.id.to_string(),
            handle: user.username,
            avatar_url: user.profile_image,
        })
    }

    async fn publish(
        &self,
        access_token: &str,
        content: &PublishContent,
    ) -> Result<String, SocialError> {
        let (title, body) = Self::split_title(&content.text);

        let mut article = serde_json::json!({
            "title": title,
            "body_markdown": body,
            "published": true,
        });
        if let Some(image) = content.media_urls.first() {
            article["main_image"] = serde_json::Value::String(image.clone());
        }

        let response = self
            .http
            .post(format!("{}/articles", API_BASE))
            .header("api-key", access_token)
            .json(&serde_json::json!({ "article": article }))
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Dev.to publish: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SocialError::PlatformError(format!(
                "Dev.to publish failed with {}: {}",
                status, body
            )));
        }

        let created: DevtoArticle = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Dev.to publish body: {}", e)))?;

        Ok(created.id.to_string())
    }

    async fn fetch_metrics(
        &self,
        access_token: &str,
        remote_post_id: &str,
    ) -> Result<PlatformMetrics, SocialError> {
        let response = self
            .http
            .get(format!("{}/articles/{}", API_BASE, remote_post_id))
            .header("api-key", access_token)
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Dev.to metrics: {}", e)))?;

        if !response.status().is_success() {
            return Err(SocialError::PlatformError(format!(
                "Dev.to metrics failed with {}",
                response.status()
            )));
        }

        let stats: DevtoArticleStats = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("Dev.to metrics body: {}", e)))?;

        Ok(PlatformMetrics {
            impressions: stats.page_views_count,
            likes: stats.positive_reactions_count,
            comments: stats.comments_count,
            shares: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_title_first_line() {
        let (title, body) = DevtoClient::split_title("My Post\n\nThe body text.");
        assert_eq!(title, "My Post");
        assert_eq!(body, "The body text.");
    }

    #[test]
    fn test_split_title_empty_content() {
        let (title, body) = DevtoClient::split_title("");
        assert_eq!(title, "Untitled");
        assert_eq!(body, "");
    }

    #[test]
    fn test_authorize_url_points_to_settings() {
        let client = DevtoClient::new(reqwest::Client::new());
        assert_eq!(client.authorize_url("s", "r"), SETTINGS_URL);
    }

    #[tokio::test]
    async fn test_refresh_unsupported() {
        let client = DevtoClient::new(reqwest::Client::new());
        let result = client.refresh_token("anything").await;
        assert!(matches!(result, Err(SocialError::PlatformError(_))));
    }
}
