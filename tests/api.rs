//! End-to-end HTTP tests against the full router.
//!
//! Each test gets its own in-memory database and a real listening
//! server, so the middleware stack (auth, rate limiting, maintenance
//! gate) is exercised exactly as in production.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use zyvarin::api::{build_router, middleware::RequestStats, AppState};
use zyvarin::cache::create_cache;
use zyvarin::config::{AiConfig, BillingConfig, CacheConfig};
use zyvarin::db::repositories::{
    SqlxAiGenerationRepository, SqlxBlogRepository, SqlxBugReportRepository,
    SqlxLoginLogRepository, SqlxNotificationRepository, SqlxPostRepository,
    SqlxSessionRepository, SqlxSettingsRepository, SqlxSocialAccountRepository,
    SqlxTeamRepository, SqlxTransactionRepository, SqlxUserRepository,
};
use zyvarin::db::{create_test_pool, migrations};
use zyvarin::services::{
    AiService, BillingService, BlogService, ConnectionManager, EmailService, LoginRateLimiter,
    NotificationService, PostService, QuotaService, SettingsService, StateSigner, TeamService,
    UserService,
};

async fn spawn_server() -> TestServer {
    let pool = create_test_pool().await.expect("Failed to create pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let cache = create_cache(&CacheConfig::default())
        .await
        .expect("Failed to create cache");
    let http = reqwest::Client::new();

    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let login_log_repo = SqlxLoginLogRepository::boxed(pool.clone());
    let post_repo = SqlxPostRepository::boxed(pool.clone());
    let account_repo = SqlxSocialAccountRepository::boxed(pool.clone());
    let ai_repo = SqlxAiGenerationRepository::boxed(pool.clone());
    let transaction_repo = SqlxTransactionRepository::boxed(pool.clone());
    let team_repo = SqlxTeamRepository::boxed(pool.clone());
    let blog_repo = SqlxBlogRepository::boxed(pool.clone());
    let notification_repo = SqlxNotificationRepository::boxed(pool.clone());
    let settings_repo = SqlxSettingsRepository::boxed(pool.clone());
    let bug_report_repo = SqlxBugReportRepository::boxed(pool.clone());

    let user_service = Arc::new(UserService::new(
        user_repo.clone(),
        session_repo,
        login_log_repo,
    ));
    let notification_service = Arc::new(NotificationService::new(notification_repo));
    let quota_service = Arc::new(QuotaService::new(
        post_repo.clone(),
        ai_repo,
        cache.clone(),
    ));
    // No platforms configured: connection attempts should 400
    let connections = Arc::new(ConnectionManager::new(
        HashMap::new(),
        account_repo,
        StateSigner::new("test-state-secret"),
        "http://localhost:8080".to_string(),
    ));
    let post_service = Arc::new(PostService::new(
        post_repo.clone(),
        user_repo.clone(),
        connections.clone(),
        quota_service.clone(),
        notification_service.clone(),
    ));
    let ai_service = Arc::new(AiService::new(
        http.clone(),
        AiConfig::default(),
        quota_service.clone(),
    ));
    let billing_service = Arc::new(BillingService::new(
        http,
        BillingConfig::default(),
        transaction_repo.clone(),
        user_repo.clone(),
        notification_service.clone(),
    ));
    let settings_service = Arc::new(SettingsService::new(settings_repo.clone(), cache));
    let email_service = Arc::new(EmailService::new(settings_repo));
    let team_service = Arc::new(TeamService::new(
        team_repo,
        user_repo.clone(),
        notification_service.clone(),
        email_service.clone(),
        "http://localhost:3000".to_string(),
    ));
    let blog_service = Arc::new(BlogService::new(blog_repo));

    let state = AppState {
        pool,
        user_service,
        user_repo,
        post_service,
        post_repo,
        connections,
        ai_service,
        quota_service,
        billing_service,
        team_service,
        blog_service,
        notification_service,
        settings_service,
        email_service,
        bug_report_repo,
        transaction_repo,
        rate_limiter: Arc::new(LoginRateLimiter::new()),
        request_stats: Arc::new(RequestStats::new()),
    };

    let app = build_router(state, "http://localhost:3000");

    // A real listening socket so ConnectInfo-based rate limiting works
    let config = TestServer::builder().http_transport().into_config();
    TestServer::new_with_config(
        app.into_make_service_with_connect_info::<SocketAddr>(),
        config,
    )
    .expect("Failed to start test server")
}

/// Register a user and return (body, session token).
async fn register(server: &TestServer, username: &str, email: &str) -> (Value, String) {
    let response = server
        .post("/api/auth/register")
        .json(&json!({
            "username": username,
            "email": email,
            "password": "correct-horse-battery",
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    let token = body["token"].as_str().expect("token missing").to_string();
    (body, token)
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", token)).expect("valid header value")
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = spawn_server().await;

    let response = server.get("/api/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_login_and_me() {
    let server = spawn_server().await;

    let (body, token) = register(&server, "alice", "alice@example.com").await;
    assert_eq!(body["user"]["username"], "alice");

    let response = server
        .get("/api/auth/me")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;
    response.assert_status_ok();
    let me: Value = response.json();
    assert_eq!(me["username"], "alice");
    assert_eq!(me["email"], "alice@example.com");

    // Login again with the password
    let response = server
        .post("/api/auth/login")
        .json(&json!({
            "username_or_email": "alice@example.com",
            "password": "correct-horse-battery",
        }))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let server = spawn_server().await;

    register(&server, "alice", "alice@example.com").await;

    let response = server
        .post("/api/auth/register")
        .json(&json!({
            "username": "alice2",
            "email": "alice@example.com",
            "password": "correct-horse-battery",
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_protected_routes_require_auth() {
    let server = spawn_server().await;

    for path in ["/api/auth/me", "/api/posts", "/api/notifications"] {
        let response = server.get(path).await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let server = spawn_server().await;

    register(&server, "alice", "alice@example.com").await;

    let response = server
        .post("/api/auth/login")
        .json(&json!({
            "username_or_email": "alice",
            "password": "not-the-password",
        }))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let server = spawn_server().await;

    // First registered user becomes admin
    let (_, admin_token) = register(&server, "alice", "alice@example.com").await;
    let (_, user_token) = register(&server, "bob", "bob@example.com").await;

    let response = server
        .get("/api/admin/dashboard")
        .add_header(header::AUTHORIZATION, bearer(&user_token))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    let response = server
        .get("/api/admin/dashboard")
        .add_header(header::AUTHORIZATION, bearer(&admin_token))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["total_users"], 2);
}

#[tokio::test]
async fn test_blog_vote_toggle_is_idempotent() {
    let server = spawn_server().await;

    let (_, admin_token) = register(&server, "alice", "alice@example.com").await;
    let (_, user_token) = register(&server, "bob", "bob@example.com").await;

    let response = server
        .post("/api/admin/blog")
        .add_header(header::AUTHORIZATION, bearer(&admin_token))
        .json(&json!({
            "title": "Hello World",
            "content": "# Welcome\n\nFirst post.",
            "published": true,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let post: Value = response.json();
    assert_eq!(post["slug"], "hello-world");

    // First upvote counts
    let response = server
        .post("/api/blog/hello-world/vote")
        .add_header(header::AUTHORIZATION, bearer(&user_token))
        .json(&json!({ "kind": "up" }))
        .await;
    response.assert_status_ok();
    let counts: Value = response.json();
    assert_eq!(counts["upvotes"], 1);

    // Same vote again removes it
    let response = server
        .post("/api/blog/hello-world/vote")
        .add_header(header::AUTHORIZATION, bearer(&user_token))
        .json(&json!({ "kind": "up" }))
        .await;
    response.assert_status_ok();
    let counts: Value = response.json();
    assert_eq!(counts["upvotes"], 0);
    assert_eq!(counts["downvotes"], 0);
}

#[tokio::test]
async fn test_draft_posts_hidden_from_public() {
    let server = spawn_server().await;

    let (_, admin_token) = register(&server, "alice", "alice@example.com").await;

    let response = server
        .post("/api/admin/blog")
        .add_header(header::AUTHORIZATION, bearer(&admin_token))
        .json(&json!({
            "title": "Work In Progress",
            "content": "draft",
            "published": false,
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let response = server.get("/api/blog/work-in-progress").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server.get("/api/blog").await;
    response.assert_status_ok();
    let posts: Value = response.json();
    assert_eq!(posts.as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_maintenance_mode_gates_public_traffic() {
    let server = spawn_server().await;

    let (_, admin_token) = register(&server, "alice", "alice@example.com").await;

    let response = server
        .put("/api/admin/maintenance")
        .add_header(header::AUTHORIZATION, bearer(&admin_token))
        .json(&json!({ "enabled": true }))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    // Public routes are blocked
    let response = server.get("/api/blog").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    // Health, auth, and admin stay reachable
    server.get("/api/health").await.assert_status_ok();
    let response = server
        .get("/api/admin/dashboard")
        .add_header(header::AUTHORIZATION, bearer(&admin_token))
        .await;
    response.assert_status_ok();

    // Turn it back off
    let response = server
        .put("/api/admin/maintenance")
        .add_header(header::AUTHORIZATION, bearer(&admin_token))
        .json(&json!({ "enabled": false }))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    server.get("/api/blog").await.assert_status_ok();
}

#[tokio::test]
async fn test_social_connect_without_credentials() {
    let server = spawn_server().await;

    let (_, token) = register(&server, "alice", "alice@example.com").await;

    let response = server
        .get("/api/social/linkedin/connect")
        .add_header(header::AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_billing_plans_are_public() {
    let server = spawn_server().await;

    let response = server.get("/api/billing/plans").await;

    response.assert_status_ok();
    let plans: Value = response.json();
    assert_eq!(plans.as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let server = spawn_server().await;

    let response = server
        .post("/api/billing/webhook")
        .add_header(
            HeaderName::from_static("x-webhook-signature"),
            HeaderValue::from_static("deadbeef"),
        )
        .json(&json!({
            "event": "payment_success",
            "reference": "ref-1",
            "user_id": 1,
            "plan": "creator",
            "amount_cents": 900,
        }))
        .await;

    // Unsigned or misconfigured webhooks never create transactions
    assert_ne!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_team_invite_flow() {
    let server = spawn_server().await;

    let (_, owner_token) = register(&server, "alice", "alice@example.com").await;
    let (_, bob_token) = register(&server, "bob", "bob@example.com").await;

    let response = server
        .post("/api/teams")
        .add_header(header::AUTHORIZATION, bearer(&owner_token))
        .json(&json!({ "name": "Content Squad" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let team: Value = response.json();
    let team_id = team["id"].as_i64().expect("team id");

    let response = server
        .post(&format!("/api/teams/{}/invites", team_id))
        .add_header(header::AUTHORIZATION, bearer(&owner_token))
        .json(&json!({ "email": "bob@example.com", "role": "admin" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let invite: Value = response.json();
    let invite_token = invite["token"].as_str().expect("invite token");

    let response = server
        .post("/api/teams/invites/accept")
        .add_header(header::AUTHORIZATION, bearer(&bob_token))
        .json(&json!({ "token": invite_token }))
        .await;
    response.assert_status_ok();

    // Bob can now see the team
    let response = server
        .get(&format!("/api/teams/{}", team_id))
        .add_header(header::AUTHORIZATION, bearer(&bob_token))
        .await;
    response.assert_status_ok();
    let detail: Value = response.json();
    assert_eq!(detail["my_role"], "admin");
}
