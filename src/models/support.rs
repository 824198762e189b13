use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Triage state of a bug report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BugReportStatus {
    #[default]
    Open,
    Resolved,
}

impl std::fmt::Display for BugReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BugReportStatus::Open => write!(f, "open"),
            BugReportStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl std::str::FromStr for BugReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(BugReportStatus::Open),
            "resolved" => Ok(BugReportStatus::Resolved),
            _ => Err(format!("Invalid bug report status: {}", s)),
        }
    }
}

/// Bug report filed by an authenticated user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugReport {
    pub id: i64,
    pub user_id: i64,
    pub subject: String,
    pub body: String,
    pub status: BugReportStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
