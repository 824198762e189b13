//! Billing service
//!
//! Checkout sessions are created through an external payment gateway;
//! plan changes arrive back as signed webhooks. Webhook signatures are
//! HMAC-SHA256 over the raw body, hex encoded.

use crate::config::BillingConfig;
use crate::db::repositories::{TransactionRepository, UserRepository};
use crate::models::{Plan, SubscriptionStatus, Transaction, TransactionStatus, User};
use crate::services::notification::{kinds, NotificationService};
use anyhow::Context;
use chrono::Utc;
use data_encoding::HEXLOWER_PERMISSIVE;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("Billing is not configured")]
    NotConfigured,

    #[error("Free plan does not require checkout")]
    NoCheckoutNeeded,

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("Unknown user for webhook")]
    UnknownUser,

    #[error("Gateway request failed: {0}")]
    GatewayError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Webhook event shape from the payment gateway
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub reference: String,
    pub user_id: i64,
    pub plan: Plan,
    pub amount_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "USD".to_string()
}

#[derive(Deserialize)]
struct CheckoutResponse {
    url: String,
    reference: String,
}

pub struct BillingService {
    http: reqwest::Client,
    config: BillingConfig,
    transaction_repo: Arc<dyn TransactionRepository>,
    user_repo: Arc<dyn UserRepository>,
    notifications: Arc<NotificationService>,
}

impl BillingService {
    pub fn new(
        http: reqwest::Client,
        config: BillingConfig,
        transaction_repo: Arc<dyn TransactionRepository>,
        user_repo: Arc<dyn UserRepository>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            http,
            config,
            transaction_repo,
            user_repo,
            notifications,
        }
    }

    /// Create a gateway checkout session for a paid plan upgrade and
    /// record a pending transaction under the gateway's reference.
    /// Returns the hosted checkout URL.
    pub async fn create_checkout(&self, user: &User, plan: Plan) -> Result<String, BillingError> {
        if self.config.api_secret.is_empty() {
            return Err(BillingError::NotConfigured);
        }
        if plan == Plan::Free {
            return Err(BillingError::NoCheckoutNeeded);
        }

        let payload = serde_json::json!({
            "custom": {
                "user_id": user.id.to_string(),
                "plan": plan.to_string(),
            },
            "email": user.email,
            "amount_cents": plan.price_cents(),
        });

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_secret)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BillingError::GatewayError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BillingError::GatewayError(format!(
                "checkout failed with {}: {}",
                status, body
            )));
        }

        let checkout: CheckoutResponse = response
            .json()
            .await
            .map_err(|e| BillingError::GatewayError(format!("invalid response: {}", e)))?;

        // The webhook later flips this record to paid or failed.
        let now = Utc::now();
        self.transaction_repo
            .create(&Transaction {
                id: 0,
                user_id: user.id,
                gateway_reference: checkout.reference,
                amount_cents: plan.price_cents(),
                currency: "USD".to_string(),
                plan,
                status: TransactionStatus::Pending,
                created_at: now,
                updated_at: now,
            })
            .await
            .context("Failed to record pending transaction")?;

        Ok(checkout.url)
    }

    /// Verify a webhook signature against the raw request body.
    pub fn verify_signature(&self, body: &[u8], signature: &str) -> Result<(), BillingError> {
        if self.config.webhook_secret.is_empty() {
            return Err(BillingError::NotConfigured);
        }

        let supplied = HEXLOWER_PERMISSIVE
            .decode(signature.as_bytes())
            .map_err(|_| BillingError::InvalidSignature)?;

        let mut mac = HmacSha256::new_from_slice(self.config.webhook_secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid webhook secret: {}", e))?;
        mac.update(body);
        mac.verify_slice(&supplied)
            .map_err(|_| BillingError::InvalidSignature)?;
        Ok(())
    }

    /// Process a verified webhook: record the transaction and apply the
    /// plan change. Replayed references update the existing transaction
    /// instead of inserting a duplicate.
    pub async fn handle_webhook(
        &self,
        body: &[u8],
        signature: &str,
    ) -> Result<Transaction, BillingError> {
        self.verify_signature(body, signature)?;

        let event: WebhookEvent = serde_json::from_slice(body)
            .map_err(|e| BillingError::MalformedPayload(e.to_string()))?;

        let mut user = self
            .user_repo
            .get_by_id(event.user_id)
            .await
            .context("Failed to load user")?
            .ok_or(BillingError::UnknownUser)?;

        let status = match event.event.as_str() {
            "payment_success" | "subscription_payment_success" => TransactionStatus::Paid,
            "payment_failed" | "subscription_payment_failed" => TransactionStatus::Failed,
            "refund" => TransactionStatus::Refunded,
            other => {
                return Err(BillingError::MalformedPayload(format!(
                    "unknown event type '{}'",
                    other
                )))
            }
        };

        let transaction = match self
            .transaction_repo
            .get_by_reference(&event.reference)
            .await
            .context("Failed to look up transaction")?
        {
            Some(existing) => {
                self.transaction_repo
                    .update_status(existing.id, status)
                    .await
                    .context("Failed to update transaction")?;
                Transaction { status, ..existing }
            }
            None => {
                let now = Utc::now();
                self.transaction_repo
                    .create(&Transaction {
                        id: 0,
                        user_id: event.user_id,
                        gateway_reference: event.reference.clone(),
                        amount_cents: event.amount_cents,
                        currency: event.currency.clone(),
                        plan: event.plan,
                        status,
                        created_at: now,
                        updated_at: now,
                    })
                    .await
                    .context("Failed to create transaction")?
            }
        };

        match status {
            TransactionStatus::Paid => {
                user.plan = event.plan;
                user.subscription_status = SubscriptionStatus::Active;
                self.user_repo
                    .update(&user)
                    .await
                    .context("Failed to apply plan change")?;

                let _ = self
                    .notifications
                    .notify(
                        user.id,
                        kinds::PAYMENT_RECEIVED,
                        "Payment received",
                        &format!("Your {} plan is active", event.plan),
                    )
                    .await;
            }
            TransactionStatus::Failed => {
                user.subscription_status = SubscriptionStatus::PastDue;
                self.user_repo
                    .update(&user)
                    .await
                    .context("Failed to mark subscription past due")?;
            }
            TransactionStatus::Refunded => {
                user.plan = Plan::Free;
                user.subscription_status = SubscriptionStatus::Canceled;
                self.user_repo
                    .update(&user)
                    .await
                    .context("Failed to downgrade refunded user")?;

                let _ = self
                    .notifications
                    .notify(
                        user.id,
                        kinds::PLAN_CHANGED,
                        "Plan changed",
                        "Your subscription was refunded and your account moved to the Free plan",
                    )
                    .await;
            }
            TransactionStatus::Pending => {}
        }

        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxNotificationRepository, SqlxTransactionRepository, SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::UserRole;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        mac.finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    async fn setup() -> (BillingService, User, Arc<SqlxUserRepository>) {
        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");

        let user_repo = Arc::new(SqlxUserRepository::new(pool.clone()));
        let user = user_repo
            .create(&User::new(
                "alice".to_string(),
                "alice@example.com".to_string(),
                "hash".to_string(),
                UserRole::User,
            ))
            .await
            .expect("create user");

        let service = BillingService::new(
            reqwest::Client::new(),
            BillingConfig {
                endpoint: "http://localhost:1/checkouts".to_string(),
                api_secret: "api-secret".to_string(),
                webhook_secret: "hook-secret".to_string(),
            },
            Arc::new(SqlxTransactionRepository::new(pool.clone())),
            user_repo.clone(),
            Arc::new(NotificationService::new(Arc::new(
                SqlxNotificationRepository::new(pool),
            ))),
        );

        (service, user, user_repo)
    }

    fn payment_body(user_id: i64, reference: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "event": "payment_success",
            "reference": reference,
            "user_id": user_id,
            "plan": "creator",
            "amount_cents": 900,
            "currency": "USD",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_valid_webhook_upgrades_plan() {
        let (service, user, user_repo) = setup().await;
        let body = payment_body(user.id, "order-1");
        let signature = sign("hook-secret", &body);

        let tx = service
            .handle_webhook(&body, &signature)
            .await
            .expect("webhook");
        assert_eq!(tx.status, TransactionStatus::Paid);

        let updated = user_repo
            .get_by_id(user.id)
            .await
            .expect("get")
            .expect("user");
        assert_eq!(updated.plan, Plan::Creator);
        assert_eq!(updated.subscription_status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let (service, user, _) = setup().await;
        let body = payment_body(user.id, "order-1");

        let result = service.handle_webhook(&body, "deadbeef").await;
        assert!(matches!(result, Err(BillingError::InvalidSignature)));
    }

    #[tokio::test]
    async fn test_signature_decoding() {
        let (service, user, _) = setup().await;
        let body = payment_body(user.id, "order-1");
        let signature = sign("hook-secret", &body);

        // Gateways differ on hex casing
        service
            .handle_webhook(&body, &signature.to_uppercase())
            .await
            .expect("uppercase hex accepted");

        let result = service.handle_webhook(&body, "not-hex!").await;
        assert!(matches!(result, Err(BillingError::InvalidSignature)));
    }

    #[tokio::test]
    async fn test_replayed_reference_does_not_duplicate() {
        let (service, user, _) = setup().await;
        let body = payment_body(user.id, "order-1");
        let signature = sign("hook-secret", &body);

        let first = service
            .handle_webhook(&body, &signature)
            .await
            .expect("webhook");
        let second = service
            .handle_webhook(&body, &signature)
            .await
            .expect("webhook");
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_refund_downgrades_to_free() {
        let (service, user, user_repo) = setup().await;

        let body = payment_body(user.id, "order-1");
        let signature = sign("hook-secret", &body);
        service
            .handle_webhook(&body, &signature)
            .await
            .expect("payment");

        let refund = serde_json::to_vec(&serde_json::json!({
            "event": "refund",
            "reference": "order-1",
            "user_id": user.id,
            "plan": "creator",
            "amount_cents": 900,
        }))
        .unwrap();
        let signature = sign("hook-secret", &refund);
        service
            .handle_webhook(&refund, &signature)
            .await
            .expect("refund");

        let updated = user_repo
            .get_by_id(user.id)
            .await
            .expect("get")
            .expect("user");
        assert_eq!(updated.plan, Plan::Free);
        assert_eq!(updated.subscription_status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn test_unknown_event_rejected() {
        let (service, user, _) = setup().await;
        let body = serde_json::to_vec(&serde_json::json!({
            "event": "mystery",
            "reference": "order-2",
            "user_id": user.id,
            "plan": "creator",
            "amount_cents": 900,
        }))
        .unwrap();
        let signature = sign("hook-secret", &body);

        let result = service.handle_webhook(&body, &signature).await;
        assert!(matches!(result, Err(BillingError::MalformedPayload(_))));
    }

    #[tokio::test]
    async fn test_checkout_free_plan_rejected() {
        let (service, user, _) = setup().await;
        let result = service.create_checkout(&user, Plan::Free).await;
        assert!(matches!(result, Err(BillingError::NoCheckoutNeeded)));
    }
}
