//! Repository layer
//!
//! Each repository is a trait with a SQLx-backed implementation that
//! dispatches on the configured database driver.

pub mod ai_generation;
pub mod blog;
pub mod bug_report;
pub mod login_log;
pub mod notification;
pub mod post;
pub mod session;
pub mod settings;
pub mod social_account;
pub mod team;
pub mod transaction;
pub mod user;

pub use ai_generation::{AiGenerationRepository, SqlxAiGenerationRepository};
pub use blog::{BlogRepository, SqlxBlogRepository};
pub use bug_report::{BugReportRepository, SqlxBugReportRepository};
pub use login_log::{LoginLogRepository, SqlxLoginLogRepository};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use settings::{SettingsRepository, SqlxSettingsRepository};
pub use social_account::{SocialAccountRepository, SqlxSocialAccountRepository};
pub use team::{SqlxTeamRepository, TeamRepository};
pub use transaction::{SqlxTransactionRepository, TransactionRepository};
pub use user::{SqlxUserRepository, UserRepository};
