//! AI content variation
//!
//! Calls an OpenAI-compatible chat completions endpoint to rewrite a
//! draft in a platform-appropriate voice. Generation is metered against
//! the user's monthly plan quota.

use crate::config::AiConfig;
use crate::models::{Platform, User};
use crate::services::quota::{QuotaError, QuotaService};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AiServiceError {
    #[error("AI generation is not configured")]
    NotConfigured,

    #[error("Monthly AI generation limit reached")]
    QuotaExceeded,

    #[error("AI request failed: {0}")]
    RequestFailed(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<QuotaError> for AiServiceError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::AiExceeded | QuotaError::PostExceeded => AiServiceError::QuotaExceeded,
            QuotaError::InternalError(e) => AiServiceError::InternalError(e),
        }
    }
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

pub struct AiService {
    http: reqwest::Client,
    config: AiConfig,
    quota: Arc<QuotaService>,
}

impl AiService {
    pub fn new(http: reqwest::Client, config: AiConfig, quota: Arc<QuotaService>) -> Self {
        Self {
            http,
            config,
            quota,
        }
    }

    /// Rewrite content for a platform, producing `count` alternative
    /// takes. Counts against the user's quota only when generation
    /// succeeds.
    pub async fn generate_variations(
        &self,
        user: &User,
        content: &str,
        platform: Platform,
        count: u32,
    ) -> Result<Vec<String>, AiServiceError> {
        if self.config.api_key.is_empty() {
            return Err(AiServiceError::NotConfigured);
        }

        self.quota.check_ai_quota(user).await?;

        let prompt = variation_prompt(platform);
        let payload = serde_json::json!({
            "model": self.config.model,
            "n": count,
            "messages": [
                { "role": "system", "content": prompt },
                { "role": "user", "content": content },
            ],
        });

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AiServiceError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AiServiceError::RequestFailed(format!(
                "endpoint returned {}: {}",
                status, body
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiServiceError::RequestFailed(format!("invalid response: {}", e)))?;

        let variations: Vec<String> = chat
            .choices
            .into_iter()
            .map(|c| c.message.content)
            .collect();
        if variations.is_empty() {
            return Err(AiServiceError::RequestFailed("empty response".to_string()));
        }

        self.quota.record_ai_generation(user.id).await?;

        Ok(variations)
    }
}

fn variation_prompt(platform: Platform) -> String {
    let style = match platform {
        Platform::Linkedin => {
            "a professional LinkedIn post with a clear hook and line breaks between ideas"
        }
        Platform::Twitter => "a concise post under 280 characters with an engaging opening",
        Platform::Pinterest => "a short, descriptive pin caption that works next to an image",
        Platform::Devto => "a developer-focused article opener in Markdown",
    };
    format!(
        "Rewrite the user's content as {}. Keep the original meaning and do not invent facts.",
        style
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryCache};
    use crate::db::repositories::{
        SqlxAiGenerationRepository, SqlxPostRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::UserRole;

    async fn setup(api_key: &str) -> (AiService, User) {
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

        let quota = Arc::new(QuotaService::new(
            Arc::new(SqlxPostRepository::new(pool.clone())),
            Arc::new(SqlxAiGenerationRepository::new(pool)),
            Arc::new(Cache::Memory(MemoryCache::new())),
        ));

        let config = AiConfig {
            endpoint: "http://localhost:1/v1/chat/completions".to_string(),
            api_key: api_key.to_string(),
            model: "gpt-4o-mini".to_string(),
        };

        (AiService::new(reqwest::Client::new(), config, quota), user)
    }

    #[tokio::test]
    async fn test_missing_api_key_rejected() {
        let (service, user) = setup("").await;
        let result = service
            .generate_variations(&user, "hello", Platform::Twitter, 1)
            .await;
        assert!(matches!(result, Err(AiServiceError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_quota_exceeded_before_request() {
        let (service, user) = setup("key").await;

        // Exhaust the free plan's quota directly
        for _ in 0..10 {
            service
                .quota
                .record_ai_generation(user.id)
                .await
                .expect("record");
        }

        let result = service
            .generate_variations(&user, "hello", Platform::Twitter, 1)
            .await;
        assert!(matches!(result, Err(AiServiceError::QuotaExceeded)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_request_failure() {
        let (service, user) = setup("key").await;
        let result = service
            .generate_variations(&user, "hello", Platform::Linkedin, 3)
            .await;
        assert!(matches!(result, Err(AiServiceError::RequestFailed(_))));
    }

    #[test]
    fn test_prompts_differ_per_platform() {
        let prompts: Vec<String> = Platform::all().iter().map(|p| variation_prompt(*p)).collect();
        for (i, a) in prompts.iter().enumerate() {
            for b in prompts.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
