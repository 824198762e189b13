use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User entity representing an account in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: i64,
    /// Unique username for login
    pub username: String,
    /// Unique email address
    pub email: String,
    /// Argon2 hashed password (never serialized)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// User role
    pub role: UserRole,
    /// Subscription plan
    pub plan: Plan,
    /// Subscription payment state
    pub subscription_status: SubscriptionStatus,
    /// Timestamp when the user was created
    pub created_at: DateTime<Utc>,
    /// Timestamp when the user was last updated
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with the given credentials
    ///
    /// The ID will be set by the database upon insertion.
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // Will be set by database
            username,
            email,
            password_hash,
            role,
            plan: Plan::Free,
            subscription_status: SubscriptionStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the user has admin privileges
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Paid features stay on while the gateway retries a past-due charge
    pub fn has_active_subscription(&self) -> bool {
        matches!(
            self.subscription_status,
            SubscriptionStatus::Active | SubscriptionStatus::PastDue
        )
    }
}

/// User roles for access control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Administrator with full access
    Admin,
    /// Regular user
    #[default]
    User,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Admin => write!(f, "admin"),
            UserRole::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "user" => Ok(UserRole::User),
            _ => Err(format!("Invalid user role: {}", s)),
        }
    }
}

/// Subscription plan tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// Free tier
    #[default]
    Free,
    /// Creator tier
    Creator,
    /// Studio tier
    Studio,
}

impl Plan {
    /// Monthly AI generation ceiling, `None` means unlimited
    pub fn ai_generation_quota(&self) -> Option<u32> {
        match self {
            Plan::Free => Some(10),
            Plan::Creator => Some(200),
            Plan::Studio => Some(2000),
        }
    }

    /// Monthly published-post ceiling, `None` means unlimited
    pub fn post_quota(&self) -> Option<u32> {
        match self {
            Plan::Free => Some(15),
            Plan::Creator => Some(300),
            Plan::Studio => None,
        }
    }

    /// Monthly price in cents
    pub fn price_cents(&self) -> i64 {
        match self {
            Plan::Free => 0,
            Plan::Creator => 900,
            Plan::Studio => 2900,
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Plan::Free => write!(f, "free"),
            Plan::Creator => write!(f, "creator"),
            Plan::Studio => write!(f, "studio"),
        }
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "creator" => Ok(Plan::Creator),
            "studio" => Ok(Plan::Studio),
            _ => Err(format!("Invalid plan: {}", s)),
        }
    }
}

/// Subscription payment state as reported by the billing gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid up (or on the free plan)
    #[default]
    Active,
    /// Last charge failed, gateway is retrying
    PastDue,
    /// Subscription ended, user reverts to free quotas at period end
    Canceled,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::Active => write!(f, "active"),
            SubscriptionStatus::PastDue => write!(f, "past_due"),
            SubscriptionStatus::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(SubscriptionStatus::Active),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            _ => Err(format!("Invalid subscription status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_new() {
        let user = User::new(
            "alice".to_string(),
            "alice@example.com".to_string(),
            "hashed".to_string(),
            UserRole::User,
        );

        assert_eq!(user.id, 0);
        assert_eq!(user.username, "alice");
        assert_eq!(user.email, "alice@example.com");
        assert_eq!(user.plan, Plan::Free);
        assert_eq!(user.subscription_status, SubscriptionStatus::Active);
        assert!(!user.is_admin());
    }

    #[test]
    fn test_is_admin() {
        let admin = User::new(
            "admin".to_string(),
            "admin@example.com".to_string(),
            "hashed".to_string(),
            UserRole::Admin,
        );
        assert!(admin.is_admin());
    }

    #[test]
    fn test_has_active_subscription() {
        let mut user = User::new(
            "bob".to_string(),
            "bob@example.com".to_string(),
            "hashed".to_string(),
            UserRole::User,
        );
        assert!(user.has_active_subscription());

        user.subscription_status = SubscriptionStatus::PastDue;
        assert!(user.has_active_subscription());

        user.subscription_status = SubscriptionStatus::Canceled;
        assert!(!user.has_active_subscription());
    }

    #[test]
    fn test_role_parse_roundtrip() {
        for role in [UserRole::Admin, UserRole::User] {
            let parsed: UserRole = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("moderator".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_plan_quotas() {
        assert_eq!(Plan::Free.ai_generation_quota(), Some(10));
        assert_eq!(Plan::Creator.ai_generation_quota(), Some(200));
        assert_eq!(Plan::Studio.ai_generation_quota(), Some(2000));

        assert_eq!(Plan::Free.post_quota(), Some(15));
        assert_eq!(Plan::Creator.post_quota(), Some(300));
        assert_eq!(Plan::Studio.post_quota(), None);
    }

    #[test]
    fn test_plan_parse_roundtrip() {
        for plan in [Plan::Free, Plan::Creator, Plan::Studio] {
            let parsed: Plan = plan.to_string().parse().unwrap();
            assert_eq!(parsed, plan);
        }
        assert!("enterprise".parse::<Plan>().is_err());
    }

    #[test]
    fn test_subscription_status_parse_roundtrip() {
        for status in [
            SubscriptionStatus::Active,
            SubscriptionStatus::PastDue,
            SubscriptionStatus::Canceled,
        ] {
            let parsed: SubscriptionStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }
}
