use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A collaboration workspace owned by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    /// User who created the team
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Role of a member within a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    /// Creator of the team, exactly one per team
    Owner,
    /// Can manage members and read the audit log
    Admin,
    /// Regular member
    #[default]
    Member,
}

impl TeamRole {
    /// Owners and admins can manage membership and read the audit log
    pub fn can_manage(&self) -> bool {
        matches!(self, TeamRole::Owner | TeamRole::Admin)
    }
}

impl std::fmt::Display for TeamRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TeamRole::Owner => write!(f, "owner"),
            TeamRole::Admin => write!(f, "admin"),
            TeamRole::Member => write!(f, "member"),
        }
    }
}

impl std::str::FromStr for TeamRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(TeamRole::Owner),
            "admin" => Ok(TeamRole::Admin),
            "member" => Ok(TeamRole::Member),
            _ => Err(format!("Invalid team role: {}", s)),
        }
    }
}

/// Membership of one user in one team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub id: i64,
    pub team_id: i64,
    pub user_id: i64,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

/// State of a pending invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    #[default]
    Pending,
    Accepted,
    Revoked,
    Expired,
}

impl std::fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InviteStatus::Pending => write!(f, "pending"),
            InviteStatus::Accepted => write!(f, "accepted"),
            InviteStatus::Revoked => write!(f, "revoked"),
            InviteStatus::Expired => write!(f, "expired"),
        }
    }
}

impl std::str::FromStr for InviteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(InviteStatus::Pending),
            "accepted" => Ok(InviteStatus::Accepted),
            "revoked" => Ok(InviteStatus::Revoked),
            "expired" => Ok(InviteStatus::Expired),
            _ => Err(format!("Invalid invite status: {}", s)),
        }
    }
}

/// Email invitation to join a team
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamInvite {
    pub id: i64,
    pub team_id: i64,
    /// Opaque UUID token sent in the invite link (never serialized)
    #[serde(skip_serializing)]
    pub token: String,
    pub email: String,
    /// Role the invitee receives on acceptance
    pub role: TeamRole,
    pub status: InviteStatus,
    pub invited_by: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TeamInvite {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Record of a team mutation, readable by owner/admin members
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamAuditLog {
    pub id: i64,
    pub team_id: i64,
    /// User who performed the action
    pub actor_id: i64,
    /// Machine-readable action name, e.g. "member.removed"
    pub action: String,
    /// Human-readable detail
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_role_parse_roundtrip() {
        for role in [TeamRole::Owner, TeamRole::Admin, TeamRole::Member] {
            let parsed: TeamRole = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn test_can_manage() {
        assert!(TeamRole::Owner.can_manage());
        assert!(TeamRole::Admin.can_manage());
        assert!(!TeamRole::Member.can_manage());
    }

    #[test]
    fn test_invite_expiry() {
        let invite = TeamInvite {
            id: 1,
            team_id: 1,
            token: "tok".to_string(),
            email: "new@example.com".to_string(),
            role: TeamRole::Member,
            status: InviteStatus::Pending,
            invited_by: 1,
            expires_at: Utc::now() - Duration::days(1),
            created_at: Utc::now() - Duration::days(8),
        };
        assert!(invite.is_expired());
    }
}
