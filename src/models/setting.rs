use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key-value application setting
///
/// Used for admin-tunable state: the maintenance flag, SMTP parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Well-known setting keys
pub mod keys {
    pub const MAINTENANCE_MODE: &str = "maintenance_mode";
    pub const SMTP_HOST: &str = "smtp_host";
    pub const SMTP_PORT: &str = "smtp_port";
    pub const SMTP_USERNAME: &str = "smtp_username";
    pub const SMTP_PASSWORD: &str = "smtp_password";
    pub const SMTP_FROM: &str = "smtp_from";
}
