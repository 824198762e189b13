use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Marketing blog post, authored by admins, rendered from markdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: i64,
    /// URL slug, unique
    pub slug: String,
    pub title: String,
    /// Markdown source
    pub content: String,
    /// Rendered HTML, regenerated on every save
    pub rendered_html: String,
    /// Only published posts appear on the public endpoints
    pub published: bool,
    pub author_id: i64,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment on a blog post by an authenticated user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogComment {
    pub id: i64,
    pub blog_post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Direction of a blog vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Up,
    Down,
}

impl std::fmt::Display for VoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoteKind::Up => write!(f, "up"),
            VoteKind::Down => write!(f, "down"),
        }
    }
}

impl std::str::FromStr for VoteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(VoteKind::Up),
            "down" => Ok(VoteKind::Down),
            _ => Err(format!("Invalid vote kind: {}", s)),
        }
    }
}

/// One user's vote on one post, unique per (post, user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogVote {
    pub id: i64,
    pub blog_post_id: i64,
    pub user_id: i64,
    pub kind: VoteKind,
    pub created_at: DateTime<Utc>,
}
