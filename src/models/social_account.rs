use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported social platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linkedin,
    Twitter,
    Pinterest,
    Devto,
}

impl Platform {
    /// All platforms, in display order
    pub fn all() -> [Platform; 4] {
        [
            Platform::Linkedin,
            Platform::Twitter,
            Platform::Pinterest,
            Platform::Devto,
        ]
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Linkedin => write!(f, "linkedin"),
            Platform::Twitter => write!(f, "twitter"),
            Platform::Pinterest => write!(f, "pinterest"),
            Platform::Devto => write!(f, "devto"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linkedin" => Ok(Platform::Linkedin),
            "twitter" => Ok(Platform::Twitter),
            "pinterest" => Ok(Platform::Pinterest),
            "devto" => Ok(Platform::Devto),
            _ => Err(format!("Invalid platform: {}", s)),
        }
    }
}

/// A user's connection to one social platform
///
/// Unique per (user, platform); reconnecting replaces the stored tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialAccount {
    pub id: i64,
    pub user_id: i64,
    pub platform: Platform,
    /// Access token or API key (never serialized)
    #[serde(skip_serializing)]
    pub access_token: String,
    /// Refresh token, absent for key-based platforms (never serialized)
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    /// When the access token expires, absent for non-expiring credentials
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Account identifier on the remote platform
    pub remote_id: String,
    /// Handle or display name snapshot
    pub remote_handle: String,
    /// Avatar URL snapshot
    pub remote_avatar_url: Option<String>,
    pub connected_at: DateTime<Utc>,
    /// Last token refresh, if any
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl SocialAccount {
    /// Token is treated as expiring when within the skew window, so a
    /// publish right at the boundary doesn't race the remote clock.
    pub fn token_expires_within(&self, skew: chrono::Duration) -> bool {
        match self.token_expires_at {
            Some(expires_at) => expires_at <= Utc::now() + skew,
            None => false,
        }
    }
}
