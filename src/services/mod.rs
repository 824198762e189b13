//! Services layer - Business logic
//!
//! Business rules live here, between the HTTP handlers and the
//! repositories. Services are responsible for:
//! - Validation and authorization
//! - Coordinating repositories, cache, and outbound platform calls
//! - Mapping failures into typed errors

pub mod ai;
pub mod billing;
pub mod blog;
pub mod email;
pub mod notification;
pub mod oauth;
pub mod password;
pub mod post;
pub mod quota;
pub mod rate_limiter;
pub mod scheduler;
pub mod settings;
pub mod team;
pub mod user;

pub use ai::{AiService, AiServiceError};
pub use billing::{BillingError, BillingService, WebhookEvent};
pub use blog::{render_markdown, slugify, BlogPostInput, BlogService, BlogServiceError};
pub use email::EmailService;
pub use notification::NotificationService;
pub use oauth::{ConnectionManager, PlatformClient, SocialError, StateSigner};
pub use password::{hash_password, verify_password};
pub use post::{PostService, PostServiceError};
pub use quota::{QuotaError, QuotaService, QuotaUsage};
pub use rate_limiter::LoginRateLimiter;
pub use scheduler::Scheduler;
pub use settings::SettingsService;
pub use team::{TeamService, TeamServiceError};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
