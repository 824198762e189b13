//! Admin API endpoints
//!
//! Back-office surface: dashboard stats, system resource stats, user
//! management, bug report triage, maintenance mode, SMTP settings, and
//! blog authoring. Every route here sits behind the admin guard.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::process;
use sysinfo::{Pid, System};

use crate::api::blog::map_blog_error;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::UserResponse;
use crate::models::{BlogPost, BugReport, BugReportStatus, Plan, Setting, UserRole};
use crate::services::blog::BlogPostInput;

/// App version constant - update when releasing
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        // Dashboard
        .route("/dashboard", get(get_dashboard))
        .route("/stats", get(get_system_stats))
        // User management
        .route("/users", get(list_users))
        .route("/users/{id}/plan", put(change_user_plan))
        .route("/users/{id}/role", put(change_user_role))
        // Bug report triage
        .route("/bug-reports", get(list_bug_reports))
        .route("/bug-reports/{id}/status", put(update_bug_report_status))
        // Maintenance mode
        .route("/maintenance", get(get_maintenance).put(set_maintenance))
        // Settings
        .route("/settings", get(get_settings).put(update_settings))
        .route("/settings/test-email", post(send_test_email))
        // Blog authoring
        .route("/blog", get(list_blog_posts).post(create_blog_post))
        .route("/blog/{id}", put(update_blog_post))
        .route("/blog/{id}", delete(delete_blog_post))
}

/// Response for dashboard stats
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub total_users: i64,
    pub users_by_plan: Vec<PlanCount>,
    pub total_posts: i64,
    pub total_transactions: i64,
    pub revenue_cents: i64,
    pub open_bug_reports: i64,
}

#[derive(Debug, Serialize)]
pub struct PlanCount {
    pub plan: String,
    pub count: i64,
}

/// GET /api/admin/dashboard - Get dashboard stats
///
/// Requires admin authentication.
async fn get_dashboard(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<DashboardResponse>, ApiError> {
    let (total_users, users_by_plan, total_posts, total_transactions, revenue_cents, open_bugs) =
        futures::join!(
            state.user_repo.count(),
            state.user_repo.count_by_plan(),
            state.post_repo.count(),
            state.transaction_repo.count(),
            state.transaction_repo.revenue_cents(),
            state.bug_report_repo.count_open(),
        );

    let users_by_plan = users_by_plan
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .into_iter()
        .map(|(plan, count)| PlanCount {
            plan: plan.to_string(),
            count,
        })
        .collect();

    Ok(Json(DashboardResponse {
        total_users: total_users.map_err(|e| ApiError::internal_error(e.to_string()))?,
        users_by_plan,
        total_posts: total_posts.map_err(|e| ApiError::internal_error(e.to_string()))?,
        total_transactions: total_transactions
            .map_err(|e| ApiError::internal_error(e.to_string()))?,
        revenue_cents: revenue_cents.map_err(|e| ApiError::internal_error(e.to_string()))?,
        open_bug_reports: open_bugs.map_err(|e| ApiError::internal_error(e.to_string()))?,
    }))
}

/// Response for system stats (CPU, memory usage)
#[derive(Debug, Serialize)]
pub struct SystemStatsResponse {
    /// App version
    pub version: String,
    /// Process memory usage in bytes
    pub memory_bytes: u64,
    /// Process memory usage formatted (e.g., "45.2 MB")
    pub memory_formatted: String,
    /// System total memory in bytes
    pub system_total_memory: u64,
    /// System used memory in bytes
    pub system_used_memory: u64,
    /// Operating system name
    pub os_name: String,
    /// Process uptime in seconds
    pub uptime_seconds: u64,
    /// Uptime formatted (e.g., "2h 15m")
    pub uptime_formatted: String,
    /// Total requests processed
    pub total_requests: u64,
    /// Average response time in milliseconds
    pub avg_response_time_ms: f64,
}

/// GET /api/admin/stats - Get system resource stats
///
/// Returns memory usage and request statistics for the current process.
async fn get_system_stats(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<SystemStatsResponse>, ApiError> {
    let mut sys = System::new_all();
    sys.refresh_all();

    let pid = Pid::from_u32(process::id());

    let memory_bytes = if let Some(proc) = sys.process(pid) {
        proc.memory()
    } else {
        0
    };

    let memory_formatted = format_bytes(memory_bytes);

    let system_total_memory = sys.total_memory();
    let system_used_memory = sys.used_memory();

    let os_name = System::name().unwrap_or_else(|| "Unknown".to_string());

    // Request stats from middleware
    let uptime_seconds = state.request_stats.uptime_seconds();
    let uptime_formatted = format_uptime(uptime_seconds);
    let total_requests = state.request_stats.total_requests();
    let avg_response_time_ms = state.request_stats.avg_response_time_us() / 1000.0;

    Ok(Json(SystemStatsResponse {
        version: APP_VERSION.to_string(),
        memory_bytes,
        memory_formatted,
        system_total_memory,
        system_used_memory,
        os_name,
        uptime_seconds,
        uptime_formatted,
        total_requests,
        avg_response_time_ms,
    }))
}

/// Format uptime to human readable string
fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", seconds)
    }
}

/// Format bytes to human readable string
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[derive(Debug, Deserialize)]
struct UserListQuery {
    #[serde(default = "default_page")]
    page: i64,
    #[serde(default = "default_per_page")]
    per_page: i64,
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    50
}

#[derive(Debug, Serialize)]
struct UserListResponse {
    users: Vec<UserResponse>,
    total: i64,
    page: i64,
    per_page: i64,
}

/// GET /api/admin/users - List users (paginated)
async fn list_users(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<UserListQuery>,
) -> Result<Json<UserListResponse>, ApiError> {
    let page = query.page.max(1);
    let per_page = query.per_page.clamp(1, 200);

    let (users, total) = state
        .user_repo
        .list(page, per_page)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(UserListResponse {
        users: users.into_iter().map(Into::into).collect(),
        total,
        page,
        per_page,
    }))
}

#[derive(Debug, Deserialize)]
struct ChangePlanRequest {
    plan: Plan,
}

/// PUT /api/admin/users/{id}/plan - Manually set a user's plan
///
/// Bypasses billing; used for comps and support escalations.
async fn change_user_plan(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ChangePlanRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut target = state
        .user_repo
        .get_by_id(id)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    target.plan = body.plan;
    let updated = state
        .user_repo
        .update(&target)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(updated.into()))
}

#[derive(Debug, Deserialize)]
struct ChangeRoleRequest {
    role: UserRole,
}

/// PUT /api/admin/users/{id}/role - Promote or demote a user
///
/// An admin cannot demote themselves; that would leave the back office
/// one mistake away from having no admins.
async fn change_user_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<ChangeRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    if id == user.0.id && body.role != UserRole::Admin {
        return Err(ApiError::validation_error(
            "You cannot remove your own admin role",
        ));
    }

    let mut target = state
        .user_repo
        .get_by_id(id)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    target.role = body.role;
    let updated = state
        .user_repo
        .update(&target)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(updated.into()))
}

/// GET /api/admin/bug-reports - List all bug reports
async fn list_bug_reports(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<BugReport>>, ApiError> {
    let reports = state
        .bug_report_repo
        .list()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(reports))
}

#[derive(Debug, Deserialize)]
struct BugStatusRequest {
    status: BugReportStatus,
}

/// PUT /api/admin/bug-reports/{id}/status - Triage a bug report
async fn update_bug_report_status(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<BugStatusRequest>,
) -> Result<StatusCode, ApiError> {
    let updated = state
        .bug_report_repo
        .update_status(id, body.status)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    if !updated {
        return Err(ApiError::not_found("Bug report not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, Deserialize)]
struct MaintenanceBody {
    enabled: bool,
}

/// GET /api/admin/maintenance - Current maintenance flag
async fn get_maintenance(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<MaintenanceBody>, ApiError> {
    let enabled = state
        .settings_service
        .maintenance_mode()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(MaintenanceBody { enabled }))
}

/// PUT /api/admin/maintenance - Toggle maintenance mode
///
/// While enabled, non-admin traffic gets 503 except auth and health.
async fn set_maintenance(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(body): Json<MaintenanceBody>,
) -> Result<StatusCode, ApiError> {
    state
        .settings_service
        .set_maintenance_mode(body.enabled)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    tracing::info!(enabled = body.enabled, "Maintenance mode changed");

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/settings - All settings
async fn get_settings(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<Setting>>, ApiError> {
    let settings = state
        .settings_service
        .get_all()
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(Json(settings))
}

#[derive(Debug, Deserialize)]
struct UpdateSettingsRequest {
    settings: Vec<SettingEntry>,
}

#[derive(Debug, Deserialize)]
struct SettingEntry {
    key: String,
    value: String,
}

/// PUT /api/admin/settings - Upsert settings in bulk
async fn update_settings(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<StatusCode, ApiError> {
    for entry in &body.settings {
        if entry.key.trim().is_empty() {
            return Err(ApiError::validation_error("Setting key cannot be empty"));
        }
    }

    for entry in body.settings {
        state
            .settings_service
            .set(&entry.key, &entry.value)
            .await
            .map_err(|e| ApiError::internal_error(e.to_string()))?;
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct TestEmailRequest {
    to: String,
}

/// POST /api/admin/settings/test-email - Verify SMTP configuration
async fn send_test_email(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(body): Json<TestEmailRequest>,
) -> Result<StatusCode, ApiError> {
    if !state.email_service.is_configured().await {
        return Err(ApiError::validation_error("SMTP is not configured"));
    }

    state
        .email_service
        .send_test_email(&body.to)
        .await
        .map_err(|e| ApiError::internal_error(e.to_string()))?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/blog - All blog posts, drafts included
async fn list_blog_posts(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<BlogPost>>, ApiError> {
    let posts = state.blog_service.list_all().await.map_err(map_blog_error)?;

    Ok(Json(posts))
}

/// POST /api/admin/blog - Create a blog post
async fn create_blog_post(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<BlogPostInput>,
) -> Result<(StatusCode, Json<BlogPost>), ApiError> {
    let post = state
        .blog_service
        .create_post(&user.0, body)
        .await
        .map_err(map_blog_error)?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// PUT /api/admin/blog/{id} - Update a blog post
async fn update_blog_post(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<BlogPostInput>,
) -> Result<Json<BlogPost>, ApiError> {
    let post = state
        .blog_service
        .update_post(id, body)
        .await
        .map_err(map_blog_error)?;

    Ok(Json(post))
}

/// DELETE /api/admin/blog/{id} - Delete a blog post
async fn delete_blog_post(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .blog_service
        .delete_post(id)
        .await
        .map_err(map_blog_error)?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(30), "30s");
        assert_eq!(format_uptime(90), "1m");
        assert_eq!(format_uptime(3700), "1h 1m");
        assert_eq!(format_uptime(90061), "1d 1h 1m");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }
}
