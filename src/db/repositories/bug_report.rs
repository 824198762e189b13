//! Bug report repository

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{BugReport, BugReportStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Bug report repository trait
#[async_trait]
pub trait BugReportRepository: Send + Sync {
    /// File a bug report
    async fn create(&self, report: &BugReport) -> Result<BugReport>;

    /// Get by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<BugReport>>;

    /// All reports, newest first (admin)
    async fn list(&self) -> Result<Vec<BugReport>>;

    /// A user's own reports, newest first
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<BugReport>>;

    /// Change report status. Returns false if the report does not exist.
    async fn update_status(&self, id: i64, status: BugReportStatus) -> Result<bool>;

    /// Count of open reports
    async fn count_open(&self) -> Result<i64>;
}

/// SQLx-based bug report repository implementation
pub struct SqlxBugReportRepository {
    pool: DynDatabasePool,
}

impl SqlxBugReportRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BugReportRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl BugReportRepository for SqlxBugReportRepository {
    async fn create(&self, report: &BugReport) -> Result<BugReport> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.as_sqlite().unwrap(), report).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.as_mysql().unwrap(), report).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<BugReport>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.as_sqlite().unwrap(), id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.as_mysql().unwrap(), id).await,
        }
    }

    async fn list(&self) -> Result<Vec<BugReport>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => list_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<BugReport>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_for_user_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => {
                list_for_user_mysql(self.pool.as_mysql().unwrap(), user_id).await
            }
        }
    }

    async fn update_status(&self, id: i64, status: BugReportStatus) -> Result<bool> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_status_sqlite(self.pool.as_sqlite().unwrap(), id, status).await
            }
            DatabaseDriver::Mysql => {
                update_status_mysql(self.pool.as_mysql().unwrap(), id, status).await
            }
        }
    }

    async fn count_open(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_open_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => count_open_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }
}

const REPORT_COLUMNS: &str = "id, user_id, subject, body, status, created_at, updated_at";

fn row_to_report(
    id: i64,
    user_id: i64,
    subject: String,
    body: String,
    status: String,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
) -> Result<BugReport> {
    let status = BugReportStatus::from_str(&status)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid bug report status in database: {}", status))?;
    Ok(BugReport {
        id,
        user_id,
        subject,
        body,
        status,
        created_at,
        updated_at,
    })
}

// SQLite implementation functions

async fn create_sqlite(pool: &SqlitePool, report: &BugReport) -> Result<BugReport> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO bug_reports (user_id, subject, body, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(report.user_id)
    .bind(&report.subject)
    .bind(&report.body)
    .bind(BugReportStatus::Open.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create bug report")?;

    Ok(BugReport {
        id: result.last_insert_rowid(),
        status: BugReportStatus::Open,
        created_at: now,
        updated_at: now,
        ..report.clone()
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<BugReport>> {
    let row = sqlx::query(&format!("SELECT {} FROM bug_reports WHERE id = ?", REPORT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get bug report")?;

    row.map(|row| {
        row_to_report(
            row.get("id"),
            row.get("user_id"),
            row.get("subject"),
            row.get("body"),
            row.get("status"),
            row.get("created_at"),
            row.get("updated_at"),
        )
    })
    .transpose()
}

async fn list_sqlite(pool: &SqlitePool) -> Result<Vec<BugReport>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM bug_reports ORDER BY created_at DESC",
        REPORT_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list bug reports")?;

    rows.iter()
        .map(|row| {
            row_to_report(
                row.get("id"),
                row.get("user_id"),
                row.get("subject"),
                row.get("body"),
                row.get("status"),
                row.get("created_at"),
                row.get("updated_at"),
            )
        })
        .collect()
}

async fn list_for_user_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<BugReport>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM bug_reports WHERE user_id = ? ORDER BY created_at DESC",
        REPORT_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list bug reports")?;

    rows.iter()
        .map(|row| {
            row_to_report(
                row.get("id"),
                row.get("user_id"),
                row.get("subject"),
                row.get("body"),
                row.get("status"),
                row.get("created_at"),
                row.get("updated_at"),
            )
        })
        .collect()
}

async fn update_status_sqlite(
    pool: &SqlitePool,
    id: i64,
    status: BugReportStatus,
) -> Result<bool> {
    let result = sqlx::query("UPDATE bug_reports SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update bug report status")?;
    Ok(result.rows_affected() > 0)
}

async fn count_open_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM bug_reports WHERE status = 'open'")
        .fetch_one(pool)
        .await
        .context("Failed to count open bug reports")?;
    Ok(row.get("count"))
}

// MySQL implementation functions

async fn create_mysql(pool: &MySqlPool, report: &BugReport) -> Result<BugReport> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO bug_reports (user_id, subject, body, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(report.user_id)
    .bind(&report.subject)
    .bind(&report.body)
    .bind(BugReportStatus::Open.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create bug report")?;

    Ok(BugReport {
        id: result.last_insert_id() as i64,
        status: BugReportStatus::Open,
        created_at: now,
        updated_at: now,
        ..report.clone()
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<BugReport>> {
    let row = sqlx::query(&format!("SELECT {} FROM bug_reports WHERE id = ?", REPORT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get bug report")?;

    row.map(|row| {
        row_to_report(
            row.get("id"),
            row.get("user_id"),
            row.get("subject"),
            row.get("body"),
            row.get("status"),
            row.get("created_at"),
            row.get("updated_at"),
        )
    })
    .transpose()
}

async fn list_mysql(pool: &MySqlPool) -> Result<Vec<BugReport>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM bug_reports ORDER BY created_at DESC",
        REPORT_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list bug reports")?;

    rows.iter()
        .map(|row| {
            row_to_report(
                row.get("id"),
                row.get("user_id"),
                row.get("subject"),
                row.get("body"),
                row.get("status"),
                row.get("created_at"),
                row.get("updated_at"),
            )
        })
        .collect()
}

async fn list_for_user_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<BugReport>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM bug_reports WHERE user_id = ? ORDER BY created_at DESC",
        REPORT_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list bug reports")?;

    rows.iter()
        .map(|row| {
            row_to_report(
                row.get("id"),
                row.get("user_id"),
                row.get("subject"),
                row.get("body"),
                row.get("status"),
                row.get("created_at"),
                row.get("updated_at"),
            )
        })
        .collect()
}

async fn update_status_mysql(pool: &MySqlPool, id: i64, status: BugReportStatus) -> Result<bool> {
    let result = sqlx::query("UPDATE bug_reports SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update bug report status")?;
    Ok(result.rows_affected() > 0)
}

async fn count_open_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM bug_reports WHERE status = 'open'")
        .fetch_one(pool)
        .await
        .context("Failed to count open bug reports")?;
    Ok(row.get("count"))
}
