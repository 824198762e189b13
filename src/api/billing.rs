//! Billing API endpoints
//!
//! - GET  /api/billing/plans
//! - POST /api/billing/checkout
//! - GET  /api/billing/transactions
//! - POST /api/billing/webhook  (called by the payment gateway)

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{PlanResponse, TransactionResponse};
use crate::models::Plan;
use crate::services::billing::BillingError;

/// Build public billing routes
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/webhook", post(webhook))
}

/// Build protected billing routes
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/transactions", get(list_transactions))
}

fn map_billing_error(e: BillingError) -> ApiError {
    match e {
        BillingError::NotConfigured => {
            ApiError::validation_error("Billing is not configured on this server")
        }
        BillingError::NoCheckoutNeeded => {
            ApiError::validation_error("The free plan does not require checkout")
        }
        BillingError::InvalidSignature => ApiError::unauthorized("Invalid webhook signature"),
        BillingError::MalformedPayload(msg) => ApiError::validation_error(msg),
        BillingError::UnknownUser => ApiError::not_found("Unknown user"),
        BillingError::GatewayError(msg) => ApiError::new("PLATFORM_ERROR", msg),
        BillingError::InternalError(err) => ApiError::internal_error(err.to_string()),
    }
}

/// GET /api/billing/plans
async fn list_plans() -> Json<Vec<PlanResponse>> {
    Json(
        [Plan::Free, Plan::Creator, Plan::Studio]
            .into_iter()
            .map(Into::into)
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    plan: Plan,
}

/// POST /api/billing/checkout
///
/// Returns the hosted checkout URL for a plan upgrade.
async fn create_checkout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let url = state
        .billing_service
        .create_checkout(&user.0, body.plan)
        .await
        .map_err(map_billing_error)?;

    Ok(Json(serde_json::json!({ "checkout_url": url })))
}

/// GET /api/billing/transactions
async fn list_transactions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<TransactionResponse>>, ApiError> {
    let transactions = state
        .transaction_repo
        .list_for_user(user.0.id)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(transactions.into_iter().map(Into::into).collect()))
}

/// POST /api/billing/webhook
///
/// Signature comes from the X-Webhook-Signature header, HMAC-SHA256 of
/// the raw body in hex.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let signature = headers
        .get("x-webhook-signature")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing webhook signature"))?;

    let transaction = state
        .billing_service
        .handle_webhook(&body, signature)
        .await
        .map_err(map_billing_error)?;

    Ok(Json(serde_json::json!({
        "reference": transaction.gateway_reference,
        "status": transaction.status.to_string(),
    })))
}
