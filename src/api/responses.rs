//! Shared API response types
//!
//! Common response structures used across multiple endpoints. Model
//! types already skip serializing secrets; these wrappers shape the
//! remaining fields for clients.

use serde::Serialize;

use crate::models::{Plan, Post, SocialAccount, Transaction, User};

/// Public view of a user account
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub plan: String,
    pub subscription_status: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role.to_string(),
            plan: user.plan.to_string(),
            subscription_status: user.subscription_status.to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Connected platform account, tokens omitted
#[derive(Debug, Serialize)]
pub struct SocialAccountResponse {
    pub id: i64,
    pub platform: String,
    pub remote_handle: String,
    pub remote_avatar_url: Option<String>,
    pub connected_at: String,
    pub token_expires_at: Option<String>,
}

impl From<SocialAccount> for SocialAccountResponse {
    fn from(account: SocialAccount) -> Self {
        Self {
            id: account.id,
            platform: account.platform.to_string(),
            remote_handle: account.remote_handle,
            remote_avatar_url: account.remote_avatar_url,
            connected_at: account.connected_at.to_rfc3339(),
            token_expires_at: account.token_expires_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Post with its delivery results
#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub content: String,
    pub media_urls: Vec<String>,
    pub targets: Vec<String>,
    pub status: String,
    pub scheduled_for: Option<String>,
    pub published_at: Option<String>,
    pub platform_results: Vec<PlatformResultResponse>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct PlatformResultResponse {
    pub platform: String,
    pub success: bool,
    pub remote_post_id: Option<String>,
    pub error: Option<String>,
    pub attempted_at: String,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            content: post.content,
            media_urls: post.media_urls,
            targets: post.targets.iter().map(|p| p.to_string()).collect(),
            status: post.status.to_string(),
            scheduled_for: post.scheduled_for.map(|dt| dt.to_rfc3339()),
            published_at: post.published_at.map(|dt| dt.to_rfc3339()),
            platform_results: post
                .platform_results
                .into_iter()
                .map(|r| PlatformResultResponse {
                    platform: r.platform.to_string(),
                    success: r.success,
                    remote_post_id: r.remote_post_id,
                    error: r.error,
                    attempted_at: r.attempted_at.to_rfc3339(),
                })
                .collect(),
            created_at: post.created_at.to_rfc3339(),
            updated_at: post.updated_at.to_rfc3339(),
        }
    }
}

/// Billing history entry
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: i64,
    pub reference: String,
    pub amount_cents: i64,
    pub currency: String,
    pub plan: String,
    pub status: String,
    pub created_at: String,
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            reference: tx.gateway_reference,
            amount_cents: tx.amount_cents,
            currency: tx.currency,
            plan: tx.plan.to_string(),
            status: tx.status.to_string(),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// Plan description for the pricing endpoint
#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub name: String,
    pub price_cents: i64,
    pub ai_generation_quota: Option<u32>,
    pub post_quota: Option<u32>,
}

impl From<Plan> for PlanResponse {
    fn from(plan: Plan) -> Self {
        Self {
            name: plan.to_string(),
            price_cents: plan.price_cents(),
            ai_generation_quota: plan.ai_generation_quota(),
            post_quota: plan.post_quota(),
        }
    }
}
