//! Bug report API endpoints
//!
//! Users file reports; triage happens in the admin back-office.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{BugReport, BugReportStatus};

const MAX_SUBJECT_LENGTH: usize = 200;

/// Build protected support routes
pub fn protected_router() -> Router<AppState> {
    Router::new().route("/bug-reports", get(list_my_reports).post(create_report))
}

#[derive(Debug, Deserialize)]
struct BugReportRequest {
    subject: String,
    body: String,
}

/// POST /api/support/bug-reports
async fn create_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<BugReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let subject = request.subject.trim();
    if subject.is_empty() {
        return Err(ApiError::validation_error("Subject cannot be empty"));
    }
    if subject.len() > MAX_SUBJECT_LENGTH {
        return Err(ApiError::validation_error(format!(
            "Subject must be at most {} characters",
            MAX_SUBJECT_LENGTH
        )));
    }
    if request.body.trim().is_empty() {
        return Err(ApiError::validation_error("Description cannot be empty"));
    }

    let now = Utc::now();
    let report = state
        .bug_report_repo
        .create(&BugReport {
            id: 0,
            user_id: user.0.id,
            subject: subject.to_string(),
            body: request.body.trim().to_string(),
            status: BugReportStatus::Open,
            created_at: now,
            updated_at: now,
        })
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok((StatusCode::CREATED, Json(report)))
}

/// GET /api/support/bug-reports
async fn list_my_reports(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<BugReport>>, ApiError> {
    let reports = state
        .bug_report_repo
        .list_for_user(user.0.id)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(reports))
}
