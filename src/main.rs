//! Zyvarin - compose once, publish everywhere

use anyhow::Result;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zyvarin::{
    api::{self, middleware::RequestStats, AppState},
    cache::create_cache,
    config::Config,
    db::{
        self,
        repositories::{
            SqlxAiGenerationRepository, SqlxBlogRepository, SqlxBugReportRepository,
            SqlxLoginLogRepository, SqlxNotificationRepository, SqlxPostRepository,
            SqlxSessionRepository, SqlxSettingsRepository, SqlxSocialAccountRepository,
            SqlxTeamRepository, SqlxTransactionRepository, SqlxUserRepository,
        },
    },
    models::Platform,
    services::{
        oauth::{
            devto::DevtoClient, linkedin::LinkedinClient, pinterest::PinterestClient,
            twitter::TwitterClient, PlatformClient,
        },
        AiService, BillingService, BlogService, ConnectionManager, EmailService,
        LoginRateLimiter, NotificationService, PostService, QuotaService, Scheduler,
        SettingsService, StateSigner, TeamService, UserService,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zyvarin=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Zyvarin backend...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Initialize cache
    let cache = create_cache(&config.cache).await?;
    tracing::info!("Cache initialized");

    // Shared HTTP client for all outbound calls
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    // Create repositories
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

    // Platform clients: only configured platforms get a client. Dev.to
    // uses API keys, so it is always available.
    let mut clients: HashMap<Platform, Arc<dyn PlatformClient>> = HashMap::new();
    if config.platforms.linkedin.is_configured() {
        clients.insert(
            Platform::Linkedin,
            Arc::new(LinkedinClient::new(
                http.clone(),
                config.platforms.linkedin.client_id.clone(),
                config.platforms.linkedin.client_secret.clone(),
            )),
        );
    }
    if config.platforms.twitter.is_configured() {
        clients.insert(
            Platform::Twitter,
            Arc::new(TwitterClient::new(
                http.clone(),
                config.platforms.twitter.client_id.clone(),
                config.platforms.twitter.client_secret.clone(),
            )),
        );
    }
    if config.platforms.pinterest.is_configured() {
        clients.insert(
            Platform::Pinterest,
            Arc::new(PinterestClient::new(
                http.clone(),
                config.platforms.pinterest.client_id.clone(),
                config.platforms.pinterest.client_secret.clone(),
            )),
        );
    }
    clients.insert(Platform::Devto, Arc::new(DevtoClient::new(http.clone())));
    tracing::info!(platforms = clients.len(), "Platform clients initialized");

    // Initialize services
    let user_service = Arc::new(UserService::new(
        user_repo.clone(),
        session_repo.clone(),
        login_log_repo,
    ));
    let notification_service = Arc::new(NotificationService::new(notification_repo));
    let quota_service = Arc::new(QuotaService::new(
        post_repo.clone(),
        ai_repo.clone(),
        cache.clone(),
    ));
    let connections = Arc::new(ConnectionManager::new(
        clients,
        account_repo,
        StateSigner::new(&config.platforms.state_secret),
        config.server.public_url.clone(),
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
        config.ai.clone(),
        quota_service.clone(),
    ));
    let billing_service = Arc::new(BillingService::new(
        http.clone(),
        config.billing.clone(),
        transaction_repo.clone(),
        user_repo.clone(),
        notification_service.clone(),
    ));
    let settings_service = Arc::new(SettingsService::new(settings_repo.clone(), cache.clone()));
    let email_service = Arc::new(EmailService::new(settings_repo));
    let team_service = Arc::new(TeamService::new(
        team_repo,
        user_repo.clone(),
        notification_service.clone(),
        email_service.clone(),
        config.server.public_url.clone(),
    ));
    let blog_service = Arc::new(BlogService::new(blog_repo));

    // Build application state
    let request_stats = Arc::new(RequestStats::new());
    let rate_limiter = Arc::new(LoginRateLimiter::new());

    let state = AppState {
        pool: pool.clone(),
        user_service: user_service.clone(),
        user_repo,
        post_service: post_service.clone(),
        post_repo: post_repo.clone(),
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
        rate_limiter: rate_limiter.clone(),
        request_stats,
    };

    // Start the scheduled-post publisher
    let scheduler = Scheduler::new(post_repo, post_service);
    tokio::spawn(scheduler.run());
    tracing::info!("Scheduler started");

    // Rate limiter cleanup task (runs every 5 minutes)
    {
        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup().await;
            }
        });
    }

    // Expired session cleanup task (runs hourly)
    {
        let users = user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(3600));
            loop {
                interval.tick().await;
                match users.cleanup_expired_sessions().await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!(deleted = n, "Cleaned up expired sessions"),
                    Err(err) => tracing::warn!("Session cleanup failed: {}", err),
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server. ConnectInfo is needed for per-IP rate limiting.
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
