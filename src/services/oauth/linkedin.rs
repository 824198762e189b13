//! LinkedIn platform client
//!
//! OAuth flow against the v2 API with OpenID Connect profile data.
//! Publishing uses the ugcPosts endpoint with the member URN.

use super::{PlatformClient, PlatformMetrics, PublishContent, RemoteProfile, SocialError, TokenSet};
use crate::models::Platform;
use async_trait::async_trait;
use serde::Deserialize;

const AUTHORIZE_URL: &str = "https://www.linkedin.com/oauth/v2/authorization";
const TOKEN_URL: &str = "https://www.linkedin.com/oauth/v2/accessToken";
const USERINFO_URL: &str = "https://api.linkedin.com/v2/userinfo";
const UGC_POSTS_URL: &str = "https://api.linkedin.com/v2/ugcPosts";
const SOCIAL_ACTIONS_URL: &str = "https://api.linkedin.com/v2/socialActions";

const SCOPES: &str = "openid profile w_member_social";

pub struct LinkedinClient {
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
struct UserInfo {
    sub: String,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Deserialize)]
struct UgcPostResponse {
    id: String,
}

#[derive(Deserialize, Default)]
struct SummaryCount {
    #[serde(rename = "totalFirstLevelComments", alias = "totalLikes", default)]
    count: i64,
}

#[derive(Deserialize)]
struct SocialActionsResponse {
    #[serde(rename = "likesSummary", default)]
    likes: Option<SummaryCount>,
    #[serde(rename = "commentsSummary", default)]
    comments: Option<SummaryCount>,
}

impl LinkedinClient {
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
            .form(params)
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("LinkedIn token request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SocialError::PlatformError(format!(
                "LinkedIn token request failed with {}: {}",
                status, body
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("LinkedIn token response: {}", e)))?;

        Ok(TokenSet {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_in: tokens.expires_in,
        })
    }
}

#[async_trait]
impl PlatformClient for LinkedinClient {
    fn platform(&self) -> Platform {
        Platform::Linkedin
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
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenSet, SocialError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ])
        .await
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<RemoteProfile, SocialError> {
        let response = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("LinkedIn userinfo: {}", e)))?;

        if !response.status().is_success() {
            return Err(SocialError::PlatformError(format!(
                "LinkedIn userinfo failed with {}",
                response.status()
            )));
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("LinkedIn userinfo body: {}", e)))?;

        Ok(RemoteProfile {
            handle: info.name.unwrap_or_else(|| info.sub.clone()),
            id: info.sub,
            avatar_url: info.picture,
        })
    }

    async fn publish(
        &self,
        access_token: &str,
        content: &PublishContent,
    ) -> Result<String, SocialError> {
        // The author URN needs the member ID, so resolve the profile first.
        let profile = self.fetch_profile(access_token).await?;
        let payload = build_ugc_payload(&profile.id, content);

        let response = self
            .http
            .post(UGC_POSTS_URL)
            .bearer_auth(access_token)
            .header("X-Restli-Protocol-Version", "2.0.0")
            .json(&payload)
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("LinkedIn publish: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SocialError::PlatformError(format!(
                "LinkedIn publish failed with {}: {}",
                status, body
            )));
        }

        let post: UgcPostResponse = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("LinkedIn publish body: {}", e)))?;

        Ok(post.id)
    }

    async fn fetch_metrics(
        &self,
        access_token: &str,
        remote_post_id: &str,
    ) -> Result<PlatformMetrics, SocialError> {
        let url = format!(
            "{}/{}",
            SOCIAL_ACTIONS_URL,
            urlencoding::encode(remote_post_id)
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| SocialError::PlatformError(format!("LinkedIn metrics: {}", e)))?;

        if !response.status().is_success() {
            return Err(SocialError::PlatformError(format!(
                "LinkedIn metrics failed with {}",
                response.status()
            )));
        }

        let actions: SocialActionsResponse = response
            .json()
            .await
            .map_err(|e| SocialError::PlatformError(format!("LinkedIn metrics body: {}", e)))?;

        Ok(PlatformMetrics {
            impressions: 0,
            likes: actions.likes.map(|s| s.count).unwrap_or(0),
            comments: actions.comments.map(|s| s.count).unwrap_or(0),
            shares: 0,
        })
    }
}

fn build_ugc_payload(member_id: &str, content: &PublishContent) -> serde_json::Value {
    let media: Vec<serde_json::Value> = content
        .media_urls
        .iter()
        .map(|url| {
            serde_json::json!({
                "status": "READY",
                "originalUrl": url,
            })
        })
        .collect();

    let category = if media.is_empty() { "NONE" } else { "ARTICLE" };

    serde_json::json!({
        "author": format!("urn:li:person:{}", member_id),
        "lifecycleState": "PUBLISHED",
        "specificContent": {
            "com.linkedin.ugc.ShareContent": {
                "shareCommentary": { "text": content.text },
                "shareMediaCategory": category,
                "media": media,
            }
        },
        "visibility": {
            "com.linkedin.ugc.MemberNetworkVisibility": "PUBLIC"
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url_contains_params() {
        let client = LinkedinClient::new(
            reqwest::Client::new(),
            "client-id".to_string(),
            "secret".to_string(),
        );
        let url = client.authorize_url("the-state", "http://localhost/cb");

        assert!(url.starts_with(AUTHORIZE_URL));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("state=the-state"));
        assert!(url.contains("w_member_social"));
    }

    #[test]
    fn test_ugc_payload_without_media() {
        let payload = build_ugc_payload(
            "abc",
            &PublishContent {
                text: "hello".to_string(),
                media_urls: vec![],
            },
        );

        assert_eq!(payload["author"], "urn:li:person:abc");
        let share = &payload["specificContent"]["com.linkedin.ugc.ShareContent"];
        assert_eq!(share["shareMediaCategory"], "NONE");
        assert_eq!(share["shareCommentary"]["text"], "hello");
    }

    #[test]
    fn test_ugc_payload_with_media() {
        let payload = build_ugc_payload(
            "abc",
            &PublishContent {
                text: "hello".to_string(),
                media_urls: vec!["https://example.com/img.png".to_string()],
            },
        );

        let share = &payload["specificContent"]["com.linkedin.ugc.ShareContent"];
        assert_eq!(share["shareMediaCategory"], "ARTICLE");
        assert_eq!(share["media"][0]["originalUrl"], "https://example.com/img.png");
    }
}
