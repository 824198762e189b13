use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::social_account::Platform;

/// Lifecycle state of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    /// Saved but not sent anywhere
    #[default]
    Draft,
    /// Waiting for its scheduled time
    Scheduled,
    /// Delivered to at least one target platform
    Published,
    /// Every target platform rejected it
    Failed,
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostStatus::Draft => write!(f, "draft"),
            PostStatus::Scheduled => write!(f, "scheduled"),
            PostStatus::Published => write!(f, "published"),
            PostStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(PostStatus::Draft),
            "scheduled" => Ok(PostStatus::Scheduled),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            _ => Err(format!("Invalid post status: {}", s)),
        }
    }
}

/// Outcome of a single platform delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformResult {
    pub platform: Platform,
    pub success: bool,
    /// Remote post identifier when delivery succeeded
    pub remote_post_id: Option<String>,
    /// Error description when delivery failed
    pub error: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// A composed post, fanned out to one or more platforms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    /// Image/video URLs attached to the post
    pub media_urls: Vec<String>,
    /// Platforms this post targets
    pub targets: Vec<Platform>,
    pub status: PostStatus,
    /// When a scheduled post should go out
    pub scheduled_for: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    /// Per-platform delivery outcomes from the last publish attempt
    pub platform_results: Vec<PlatformResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// A scheduled post is due once its scheduled time has passed
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PostStatus::Scheduled
            && self.scheduled_for.map(|at| at <= now).unwrap_or(false)
    }

    /// Remote post id on the given platform, if delivery succeeded there
    pub fn remote_post_id(&self, platform: Platform) -> Option<&str> {
        self.platform_results
            .iter()
            .find(|r| r.platform == platform && r.success)
            .and_then(|r| r.remote_post_id.as_deref())
    }
}

/// Per-post per-platform engagement counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMetric {
    pub id: i64,
    pub post_id: i64,
    pub platform: Platform,
    pub impressions: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub fetched_at: DateTime<Utc>,
}

/// Input for creating a post
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostInput {
    pub content: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub targets: Vec<Platform>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Input for updating a draft or scheduled post
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePostInput {
    pub content: Option<String>,
    pub media_urls: Option<Vec<String>>,
    pub targets: Option<Vec<Platform>>,
    pub scheduled_for: Option<Option<DateTime<Utc>>>,
}
