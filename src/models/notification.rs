use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// In-app notification delivered to one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    /// Machine-readable kind, e.g. "post.failed", "invite.received",
    /// "payment.settled"
    pub kind: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
