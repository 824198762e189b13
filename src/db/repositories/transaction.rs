//! Transaction repository
//!
//! Plan purchases recorded against the billing gateway.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Plan, Transaction, TransactionStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Transaction repository trait
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Record a new pending transaction
    async fn create(&self, tx: &Transaction) -> Result<Transaction>;

    /// Look up by the gateway's reference (webhook correlation)
    async fn get_by_reference(&self, reference: &str) -> Result<Option<Transaction>>;

    /// Update the payment status
    async fn update_status(&self, id: i64, status: TransactionStatus) -> Result<()>;

    /// List a user's transactions, newest first
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Transaction>>;

    /// Count all transactions
    async fn count(&self) -> Result<i64>;

    /// Sum of paid amounts in cents
    async fn revenue_cents(&self) -> Result<i64>;
}

/// SQLx-based transaction repository implementation
pub struct SqlxTransactionRepository {
    pool: DynDatabasePool,
}

impl SqlxTransactionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TransactionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TransactionRepository for SqlxTransactionRepository {
    async fn create(&self, tx: &Transaction) -> Result<Transaction> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_tx_sqlite(self.pool.as_sqlite().unwrap(), tx).await,
            DatabaseDriver::Mysql => create_tx_mysql(self.pool.as_mysql().unwrap(), tx).await,
        }
    }

    async fn get_by_reference(&self, reference: &str) -> Result<Option<Transaction>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_tx_by_reference_sqlite(self.pool.as_sqlite().unwrap(), reference).await
            }
            DatabaseDriver::Mysql => {
                get_tx_by_reference_mysql(self.pool.as_mysql().unwrap(), reference).await
            }
        }
    }

    async fn update_status(&self, id: i64, status: TransactionStatus) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_tx_status_sqlite(self.pool.as_sqlite().unwrap(), id, status).await
            }
            DatabaseDriver::Mysql => {
                update_tx_status_mysql(self.pool.as_mysql().unwrap(), id, status).await
            }
        }
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Transaction>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_tx_for_user_sqlite(self.pool.as_sqlite().unwrap(), user_id).await
            }
            DatabaseDriver::Mysql => {
                list_tx_for_user_mysql(self.pool.as_mysql().unwrap(), user_id).await
            }
        }
    }

    async fn count(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_tx_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => count_tx_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }

    async fn revenue_cents(&self) -> Result<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => revenue_sqlite(self.pool.as_sqlite().unwrap()).await,
            DatabaseDriver::Mysql => revenue_mysql(self.pool.as_mysql().unwrap()).await,
        }
    }
}

const TX_COLUMNS: &str =
    "id, user_id, gateway_reference, amount_cents, currency, plan, status, created_at, updated_at";

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_tx_sqlite(pool: &SqlitePool, tx: &Transaction) -> Result<Transaction> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO transactions
            (user_id, gateway_reference, amount_cents, currency, plan, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(tx.user_id)
    .bind(&tx.gateway_reference)
    .bind(tx.amount_cents)
    .bind(&tx.currency)
    .bind(tx.plan.to_string())
    .bind(tx.status.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create transaction")?;

    Ok(Transaction {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..tx.clone()
    })
}

async fn get_tx_by_reference_sqlite(
    pool: &SqlitePool,
    reference: &str,
) -> Result<Option<Transaction>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM transactions WHERE gateway_reference = ?",
        TX_COLUMNS
    ))
    .bind(reference)
    .fetch_optional(pool)
    .await
    .context("Failed to get transaction by reference")?;

    match row {
        Some(row) => Ok(Some(row_to_tx_sqlite(&row)?)),
        None => Ok(None),
    }
}

async fn update_tx_status_sqlite(
    pool: &SqlitePool,
    id: i64,
    status: TransactionStatus,
) -> Result<()> {
    sqlx::query("UPDATE transactions SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update transaction status")?;
    Ok(())
}

async fn list_tx_for_user_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<Transaction>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM transactions WHERE user_id = ? ORDER BY created_at DESC",
        TX_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list transactions")?;

    let mut txs = Vec::new();
    for row in rows {
        txs.push(row_to_tx_sqlite(&row)?);
    }
    Ok(txs)
}

async fn count_tx_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM transactions")
        .fetch_one(pool)
        .await
        .context("Failed to count transactions")?;
    Ok(row.get("count"))
}

async fn revenue_sqlite(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COALESCE(SUM(amount_cents), 0) as total FROM transactions WHERE status = 'paid'",
    )
    .fetch_one(pool)
    .await
    .context("Failed to sum revenue")?;
    Ok(row.get("total"))
}

fn row_to_tx_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction> {
    let plan_str: String = row.get("plan");
    let plan = Plan::from_str(&plan_str)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid plan in database: {}", plan_str))?;

    let status_str: String = row.get("status");
    let status = TransactionStatus::from_str(&status_str)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid transaction status in database: {}", status_str))?;

    Ok(Transaction {
        id: row.get("id"),
        user_id: row.get("user_id"),
        gateway_reference: row.get("gateway_reference"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        plan,
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_tx_mysql(pool: &MySqlPool, tx: &Transaction) -> Result<Transaction> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO transactions
            (user_id, gateway_reference, amount_cents, currency, plan, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(tx.user_id)
    .bind(&tx.gateway_reference)
    .bind(tx.amount_cents)
    .bind(&tx.currency)
    .bind(tx.plan.to_string())
    .bind(tx.status.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create transaction")?;

    Ok(Transaction {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..tx.clone()
    })
}

async fn get_tx_by_reference_mysql(
    pool: &MySqlPool,
    reference: &str,
) -> Result<Option<Transaction>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM transactions WHERE gateway_reference = ?",
        TX_COLUMNS
    ))
    .bind(reference)
    .fetch_optional(pool)
    .await
    .context("Failed to get transaction by reference")?;

    match row {
        Some(row) => Ok(Some(row_to_tx_mysql(&row)?)),
        None => Ok(None),
    }
}

async fn update_tx_status_mysql(
    pool: &MySqlPool,
    id: i64,
    status: TransactionStatus,
) -> Result<()> {
    sqlx::query("UPDATE transactions SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update transaction status")?;
    Ok(())
}

async fn list_tx_for_user_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<Transaction>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM transactions WHERE user_id = ? ORDER BY created_at DESC",
        TX_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list transactions")?;

    let mut txs = Vec::new();
    for row in rows {
        txs.push(row_to_tx_mysql(&row)?);
    }
    Ok(txs)
}

async fn count_tx_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM transactions")
        .fetch_one(pool)
        .await
        .context("Failed to count transactions")?;
    Ok(row.get("count"))
}

async fn revenue_mysql(pool: &MySqlPool) -> Result<i64> {
    let row = sqlx::query(
        "SELECT COALESCE(SUM(amount_cents), 0) as total FROM transactions WHERE status = 'paid'",
    )
    .fetch_one(pool)
    .await
    .context("Failed to sum revenue")?;
    Ok(row.get("total"))
}

fn row_to_tx_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Transaction> {
    let plan_str: String = row.get("plan");
    let plan = Plan::from_str(&plan_str)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid plan in database: {}", plan_str))?;

    let status_str: String = row.get("status");
    let status = TransactionStatus::from_str(&status_str)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid transaction status in database: {}", status_str))?;

    Ok(Transaction {
        id: row.get("id"),
        user_id: row.get("user_id"),
        gateway_reference: row.get("gateway_reference"),
        amount_cents: row.get("amount_cents"),
        currency: row.get("currency"),
        plan,
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::user::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};

    async fn setup() -> (SqlxTransactionRepository, i64) {
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

        (SqlxTransactionRepository::new(pool), user.id)
    }

    fn pending(user_id: i64, reference: &str, cents: i64) -> Transaction {
        Transaction {
            id: 0,
            user_id,
            gateway_reference: reference.to_string(),
            amount_cents: cents,
            currency: "USD".to_string(),
            plan: Plan::Creator,
            status: TransactionStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup_by_reference() {
        let (repo, user_id) = setup().await;
        let created = repo
            .create(&pending(user_id, "order-1", 900))
            .await
            .expect("create");
        assert!(created.id > 0);

        let found = repo
            .get_by_reference("order-1")
            .await
            .expect("get")
            .expect("found");
        assert_eq!(found.amount_cents, 900);
        assert_eq!(found.status, TransactionStatus::Pending);
    }

    #[tokio::test]
    async fn test_update_status_and_revenue() {
        let (repo, user_id) = setup().await;
        let a = repo
            .create(&pending(user_id, "order-1", 900))
            .await
            .expect("create");
        let b = repo
            .create(&pending(user_id, "order-2", 2900))
            .await
            .expect("create");

        repo.update_status(a.id, TransactionStatus::Paid)
            .await
            .expect("update");
        repo.update_status(b.id, TransactionStatus::Failed)
            .await
            .expect("update");

        // Only paid transactions count toward revenue
        assert_eq!(repo.revenue_cents().await.expect("revenue"), 900);
        assert_eq!(repo.count().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn test_list_for_user_newest_first() {
        let (repo, user_id) = setup().await;
        repo.create(&pending(user_id, "order-1", 900))
            .await
            .expect("create");
        repo.create(&pending(user_id, "order-2", 2900))
            .await
            .expect("create");

        let txs = repo.list_for_user(user_id).await.expect("list");
        assert_eq!(txs.len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let (repo, user_id) = setup().await;
        repo.create(&pending(user_id, "order-1", 900))
            .await
            .expect("create");
        let dup = repo.create(&pending(user_id, "order-1", 900)).await;
        assert!(dup.is_err());
    }
}
