use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session entity for opaque-token authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session token (UUID)
    pub id: String,
    /// User this session belongs to
    pub user_id: i64,
    /// When this session expires
    pub expires_at: DateTime<Utc>,
    /// When this session was created
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_not_expired() {
        let session = Session {
            id: "test-token".to_string(),
            user_id: 1,
            expires_at: Utc::now() + Duration::hours(1),
            created_at: Utc::now(),
        };
        assert!(!session.is_expired());
    }

    #[test]
    fn test_session_expired() {
        let session = Session {
            id: "test-token".to_string(),
            user_id: 1,
            expires_at: Utc::now() - Duration::hours(1),
            created_at: Utc::now(),
        };
        assert!(session.is_expired());
    }
}
