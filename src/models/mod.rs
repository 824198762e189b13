//! Domain models
//!
//! Entities stored in the database plus the enums and input structs the
//! services accept. Enums serialize as lowercase strings and round-trip
//! through `Display`/`FromStr` for the database text columns.

pub mod billing;
pub mod blog;
pub mod notification;
pub mod post;
pub mod session;
pub mod setting;
pub mod social_account;
pub mod support;
pub mod team;
pub mod user;

pub use billing::{Transaction, TransactionStatus};
pub use blog::{BlogComment, BlogPost, BlogVote, VoteKind};
pub use notification::Notification;
pub use post::{CreatePostInput, PlatformResult, Post, PostMetric, PostStatus, UpdatePostInput};
pub use session::Session;
pub use setting::Setting;
pub use social_account::{Platform, SocialAccount};
pub use support::{BugReport, BugReportStatus};
pub use team::{InviteStatus, Team, TeamAuditLog, TeamInvite, TeamMember, TeamRole};
pub use user::{Plan, SubscriptionStatus, User, UserRole};
