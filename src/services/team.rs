//! Team service
//!
//! Collaboration workspaces: membership, email invites, and an audit
//! trail of every mutation. Authorization rules live here, on top of
//! the repository primitives.

use crate::db::repositories::{TeamRepository, UserRepository};
use crate::models::{
    InviteStatus, Team, TeamAuditLog, TeamInvite, TeamMember, TeamRole, User,
};
use crate::services::email::EmailService;
use crate::services::notification::{kinds, NotificationService};
use anyhow::Context;
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

const INVITE_TTL_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum TeamServiceError {
    #[error("Team not found")]
    NotFound,

    #[error("You do not have permission to do that")]
    Forbidden,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invite is not valid: {0}")]
    InvalidInvite(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct TeamService {
    team_repo: Arc<dyn TeamRepository>,
    user_repo: Arc<dyn UserRepository>,
    notifications: Arc<NotificationService>,
    email: Arc<EmailService>,
    public_url: String,
}

impl TeamService {
    pub fn new(
        team_repo: Arc<dyn TeamRepository>,
        user_repo: Arc<dyn UserRepository>,
        notifications: Arc<NotificationService>,
        email: Arc<EmailService>,
        public_url: String,
    ) -> Self {
        Self {
            team_repo,
            user_repo,
            notifications,
            email,
            public_url,
        }
    }

    /// Create a team. The creator becomes its owner member.
    pub async fn create_team(&self, owner: &User, name: &str) -> Result<Team, TeamServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TeamServiceError::ValidationError(
                "Team name cannot be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let team = self
            .team_repo
            .create_team(&Team {
                id: 0,
                name: name.to_string(),
                owner_id: owner.id,
                created_at: now,
                updated_at: now,
            })
            .await
            .context("Failed to create team")?;

        self.team_repo
            .add_member(&TeamMember {
                id: 0,
                team_id: team.id,
                user_id: owner.id,
                role: TeamRole::Owner,
                joined_at: now,
            })
            .await
            .context("Failed to add owner membership")?;

        self.audit(team.id, owner.id, "team.created", &team.name).await;

        Ok(team)
    }

    /// Teams the user belongs to.
    pub async fn list_teams(&self, user_id: i64) -> Result<Vec<Team>, TeamServiceError> {
        Ok(self
            .team_repo
            .list_teams_for_user(user_id)
            .await
            .context("Failed to list teams")?)
    }

    /// Load a team the user is a member of, along with their role.
    pub async fn get_team(
        &self,
        user_id: i64,
        team_id: i64,
    ) -> Result<(Team, TeamRole), TeamServiceError> {
        let team = self
            .team_repo
            .get_team(team_id)
            .await
            .context("Failed to get team")?
            .ok_or(TeamServiceError::NotFound)?;

        let member = self
            .require_member(team_id, user_id)
            .await?;

        Ok((team, member.role))
    }

    pub async fn list_members(
        &self,
        user_id: i64,
        team_id: i64,
    ) -> Result<Vec<TeamMember>, TeamServiceError> {
        self.require_member(team_id, user_id).await?;
        Ok(self
            .team_repo
            .list_members(team_id)
            .await
            .context("Failed to list members")?)
    }

    /// Invite someone by email. Requires a managing role. Owner cannot
    /// be granted through an invite.
    pub async fn invite_member(
        &self,
        actor: &User,
        team_id: i64,
        email: &str,
        role: TeamRole,
    ) -> Result<TeamInvite, TeamServiceError> {
        let team = self
            .team_repo
            .get_team(team_id)
            .await
            .context("Failed to get team")?
            .ok_or(TeamServiceError::NotFound)?;
        self.require_manager(team_id, actor.id).await?;

        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(TeamServiceError::ValidationError(
                "A valid email address is required".to_string(),
            ));
        }
        if role == TeamRole::Owner {
            return Err(TeamServiceError::ValidationError(
                "Invites cannot grant the owner role".to_string(),
            ));
        }

        // Existing members do not need an invite
        if let Some(invitee) = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to look up invitee")?
        {
            if self
                .team_repo
                .get_member(team_id, invitee.id)
                .await
                .context("Failed to check membership")?
                .is_some()
            {
                return Err(TeamServiceError::ValidationError(
                    "That user is already a member".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let invite = self
            .team_repo
            .create_invite(&TeamInvite {
                id: 0,
                team_id,
                token: Uuid::new_v4().to_string(),
                email: email.clone(),
                role,
                status: InviteStatus::Pending,
                invited_by: actor.id,
                expires_at: now + Duration::days(INVITE_TTL_DAYS),
                created_at: now,
            })
            .await
            .context("Failed to create invite")?;

        self.audit(team_id, actor.id, "member.invited", &email).await;

        // Mail delivery is best effort; a failed send never fails the invite
        if self.email.is_configured().await {
            let invite_url = format!(
                "{}/teams/invites/{}",
                self.public_url.trim_end_matches('/'),
                invite.token
            );
            if let Err(err) = self
                .email
                .send_team_invite(&email, &team.name, &invite_url)
                .await
            {
                tracing::warn!(team_id, "Failed to send invite email: {:#}", err);
            }
        }

        // Notify in-app when the invitee already has an account
        if let Ok(Some(invitee)) = self.user_repo.get_by_email(&email).await {
            let _ = self
                .notifications
                .notify(
                    invitee.id,
                    kinds::TEAM_INVITE,
                    "Team invitation",
                    &format!("{} invited you to join a team", actor.username),
                )
                .await;
        }

        Ok(invite)
    }

    /// Accept an invite by token. Accepting the same invite twice is a
    /// no-op when the user is already a member.
    pub async fn accept_invite(
        &self,
        user: &User,
        token: &str,
    ) -> Result<TeamMember, TeamServiceError> {
        let invite = self
            .team_repo
            .get_invite_by_token(token)
            .await
            .context("Failed to look up invite")?
            .ok_or_else(|| TeamServiceError::InvalidInvite("unknown token".to_string()))?;

        if !invite.email.eq_ignore_ascii_case(&user.email) {
            return Err(TeamServiceError::InvalidInvite(
                "invite was sent to a different email address".to_string(),
            ));
        }

        match invite.status {
            InviteStatus::Pending => {}
            InviteStatus::Accepted => {
                // Idempotent accept
                if let Some(member) = self
                    .team_repo
                    .get_member(invite.team_id, user.id)
                    .await
                    .context("Failed to check membership")?
                {
                    return Ok(member);
                }
                return Err(TeamServiceError::InvalidInvite(
                    "invite was already used".to_string(),
                ));
            }
            InviteStatus::Revoked => {
                return Err(TeamServiceError::InvalidInvite(
                    "invite was revoked".to_string(),
                ))
            }
            InviteStatus::Expired => {
                return Err(TeamServiceError::InvalidInvite(
                    "invite has expired".to_string(),
                ))
            }
        }

        if invite.is_expired() {
            self.team_repo
                .update_invite_status(invite.id, InviteStatus::Expired)
                .await
                .context("Failed to expire invite")?;
            return Err(TeamServiceError::InvalidInvite(
                "invite has expired".to_string(),
            ));
        }

        let member = self
            .team_repo
            .add_member(&TeamMember {
                id: 0,
                team_id: invite.team_id,
                user_id: user.id,
                role: invite.role,
                joined_at: Utc::now(),
            })
            .await
            .context("Failed to add member")?;

        self.team_repo
            .update_invite_status(invite.id, InviteStatus::Accepted)
            .await
            .context("Failed to mark invite accepted")?;

        self.audit(invite.team_id, user.id, "invite.accepted", &user.username)
            .await;

        Ok(member)
    }

    /// Revoke a pending invite. Requires a managing role.
    pub async fn revoke_invite(
        &self,
        actor: &User,
        team_id: i64,
        invite_id: i64,
    ) -> Result<(), TeamServiceError> {
        self.require_manager(team_id, actor.id).await?;

        let invites = self
            .team_repo
            .list_invites(team_id)
            .await
            .context("Failed to list invites")?;
        let invite = invites
            .into_iter()
            .find(|i| i.id == invite_id)
            .ok_or(TeamServiceError::NotFound)?;

        if invite.status != InviteStatus::Pending {
            return Err(TeamServiceError::InvalidInvite(
                "only pending invites can be revoked".to_string(),
            ));
        }

        self.team_repo
            .update_invite_status(invite.id, InviteStatus::Revoked)
            .await
            .context("Failed to revoke invite")?;

        self.audit(team_id, actor.id, "invite.revoked", &invite.email)
            .await;

        Ok(())
    }

    pub async fn list_invites(
        &self,
        actor: &User,
        team_id: i64,
    ) -> Result<Vec<TeamInvite>, TeamServiceError> {
        self.require_manager(team_id, actor.id).await?;
        Ok(self
            .team_repo
            .list_invites(team_id)
            .await
            .context("Failed to list invites")?)
    }

    /// Change a member's role. Only the team owner may do this, and the
    /// owner's own role is fixed.
    pub async fn change_role(
        &self,
        actor: &User,
        team_id: i64,
        user_id: i64,
        role: TeamRole,
    ) -> Result<(), TeamServiceError> {
        let team = self
            .team_repo
            .get_team(team_id)
            .await
            .context("Failed to get team")?
            .ok_or(TeamServiceError::NotFound)?;
        if team.owner_id != actor.id {
            return Err(TeamServiceError::Forbidden);
        }
        if user_id == team.owner_id {
            return Err(TeamServiceError::ValidationError(
                "The owner's role cannot be changed".to_string(),
            ));
        }
        if role == TeamRole::Owner {
            return Err(TeamServiceError::ValidationError(
                "Ownership cannot be transferred through a role change".to_string(),
            ));
        }

        self.require_member(team_id, user_id).await?;

        self.team_repo
            .update_member_role(team_id, user_id, role)
            .await
            .context("Failed to update role")?;

        self.audit(
            team_id,
            actor.id,
            "member.role_changed",
            &format!("user {} is now {}", user_id, role),
        )
        .await;

        Ok(())
    }

    /// Remove a member. Managers can remove anyone but the owner;
    /// members can remove themselves (leave).
    pub async fn remove_member(
        &self,
        actor: &User,
        team_id: i64,
        user_id: i64,
    ) -> Result<(), TeamServiceError> {
        let team = self
            .team_repo
            .get_team(team_id)
            .await
            .context("Failed to get team")?
            .ok_or(TeamServiceError::NotFound)?;

        if user_id == team.owner_id {
            return Err(TeamServiceError::ValidationError(
                "The owner cannot be removed from the team".to_string(),
            ));
        }

        if actor.id != user_id {
            self.require_manager(team_id, actor.id).await?;
        }

        let removed = self
            .team_repo
            .remove_member(team_id, user_id)
            .await
            .context("Failed to remove member")?;
        if !removed {
            return Err(TeamServiceError::NotFound);
        }

        let action = if actor.id == user_id {
            "member.left"
        } else {
            "member.removed"
        };
        self.audit(team_id, actor.id, action, &format!("user {}", user_id))
            .await;

        Ok(())
    }

    /// Audit trail, newest first. Requires a managing role.
    pub async fn audit_logs(
        &self,
        actor: &User,
        team_id: i64,
    ) -> Result<Vec<TeamAuditLog>, TeamServiceError> {
        self.require_manager(team_id, actor.id).await?;
        Ok(self
            .team_repo
            .list_audit_logs(team_id)
            .await
            .context("Failed to list audit logs")?)
    }

    async fn require_member(
        &self,
        team_id: i64,
        user_id: i64,
    ) -> Result<TeamMember, TeamServiceError> {
        self.team_repo
            .get_member(team_id, user_id)
            .await
            .context("Failed to check membership")?
            .ok_or(TeamServiceError::Forbidden)
    }

    async fn require_manager(
        &self,
        team_id: i64,
        user_id: i64,
    ) -> Result<TeamMember, TeamServiceError> {
        let member = self.require_member(team_id, user_id).await?;
        if !member.role.can_manage() {
            return Err(TeamServiceError::Forbidden);
        }
        Ok(member)
    }

    // Audit writes are best-effort; a failed log never fails the action
    async fn audit(&self, team_id: i64, actor_id: i64, action: &str, detail: &str) {
        let log = TeamAuditLog {
            id: 0,
            team_id,
            actor_id,
            action: action.to_string(),
            detail: detail.to_string(),
            created_at: Utc::now(),
        };
        if let Err(err) = self.team_repo.add_audit_log(&log).await {
            tracing::warn!(team_id, action, "Failed to write audit log: {:#}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SettingsRepository, SqlxNotificationRepository, SqlxSettingsRepository, SqlxTeamRepository,
        SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::setting::keys;
    use crate::models::UserRole;

    async fn setup() -> (TeamService, User, User) {
        let (service, owner, member, _) = setup_with_settings().await;
        (service, owner, member)
    }

    async fn setup_with_settings() -> (TeamService, User, User, Arc<SqlxSettingsRepository>) {
        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");

        let user_repo = Arc::new(SqlxUserRepository::new(pool.clone()));
        let owner = user_repo
            .create(&User::new(
                "owner".to_string(),
                "owner@example.com".to_string(),
                "hash".to_string(),
                UserRole::User,
            ))
            .await
            .expect("create owner");
        let member = user_repo
            .create(&User::new(
                "casey".to_string(),
                "casey@example.com".to_string(),
                "hash".to_string(),
                UserRole::User,
            ))
            .await
            .expect("create member");

        let settings_repo = Arc::new(SqlxSettingsRepository::new(pool.clone()));
        let service = TeamService::new(
            Arc::new(SqlxTeamRepository::new(pool.clone())),
            user_repo,
            Arc::new(NotificationService::new(Arc::new(
                SqlxNotificationRepository::new(pool),
            ))),
            Arc::new(EmailService::new(settings_repo.clone())),
            "http://localhost:3000".to_string(),
        );

        (service, owner, member, settings_repo)
    }

    #[tokio::test]
    async fn test_creator_becomes_owner_member() {
        let (service, owner, _) = setup().await;
        let team = service.create_team(&owner, "Crew").await.expect("create");

        let (_, role) = service.get_team(owner.id, team.id).await.expect("get");
        assert_eq!(role, TeamRole::Owner);

        let logs = service.audit_logs(&owner, team.id).await.expect("logs");
        assert_eq!(logs[0].action, "team.created");
    }

    #[tokio::test]
    async fn test_invite_and_accept_flow() {
        let (service, owner, member) = setup().await;
        let team = service.create_team(&owner, "Crew").await.expect("create");

        let invite = service
            .invite_member(&owner, team.id, "casey@example.com", TeamRole::Member)
            .await
            .expect("invite");

        let joined = service
            .accept_invite(&member, &invite.token)
            .await
            .expect("accept");
        assert_eq!(joined.role, TeamRole::Member);

        // Accepting again is a no-op for an existing member
        let again = service
            .accept_invite(&member, &invite.token)
            .await
            .expect("accept again");
        assert_eq!(again.id, joined.id);
    }

    #[tokio::test]
    async fn test_invite_succeeds_without_smtp() {
        let (service, owner, _, _) = setup_with_settings().await;
        let team = service.create_team(&owner, "Crew").await.expect("create");

        // No SMTP settings at all: the mail branch is skipped entirely
        let invite = service
            .invite_member(&owner, team.id, "new@example.com", TeamRole::Member)
            .await
            .expect("invite");
        assert_eq!(invite.status, InviteStatus::Pending);
    }

    #[tokio::test]
    async fn test_invite_survives_broken_smtp() {
        let (service, owner, _, settings) = setup_with_settings().await;
        let team = service.create_team(&owner, "Crew").await.expect("create");

        // Host set but credentials missing: the send fails and is logged,
        // the invite still lands
        settings
            .set(keys::SMTP_HOST, "smtp.example.com")
            .await
            .expect("set");

        let invite = service
            .invite_member(&owner, team.id, "new@example.com", TeamRole::Member)
            .await
            .expect("invite");
        assert_eq!(invite.status, InviteStatus::Pending);
    }

    #[tokio::test]
    async fn test_invite_wrong_email_rejected() {
        let (service, owner, member) = setup().await;
        let team = service.create_team(&owner, "Crew").await.expect("create");

        let invite = service
            .invite_member(&owner, team.id, "someone-else@example.com", TeamRole::Member)
            .await
            .expect("invite");

        let result = service.accept_invite(&member, &invite.token).await;
        assert!(matches!(result, Err(TeamServiceError::InvalidInvite(_))));
    }

    #[tokio::test]
    async fn test_non_manager_cannot_invite() {
        let (service, owner, member) = setup().await;
        let team = service.create_team(&owner, "Crew").await.expect("create");

        let invite = service
            .invite_member(&owner, team.id, "casey@example.com", TeamRole::Member)
            .await
            .expect("invite");
        service
            .accept_invite(&member, &invite.token)
            .await
            .expect("accept");

        let result = service
            .invite_member(&member, team.id, "third@example.com", TeamRole::Member)
            .await;
        assert!(matches!(result, Err(TeamServiceError::Forbidden)));
    }

    #[tokio::test]
    async fn test_only_owner_changes_roles() {
        let (service, owner, member) = setup().await;
        let team = service.create_team(&owner, "Crew").await.expect("create");

        let invite = service
            .invite_member(&owner, team.id, "casey@example.com", TeamRole::Admin)
            .await
            .expect("invite");
        service
            .accept_invite(&member, &invite.token)
            .await
            .expect("accept");

        // Admins can manage membership but not roles
        let result = service
            .change_role(&member, team.id, owner.id, TeamRole::Member)
            .await;
        assert!(matches!(result, Err(TeamServiceError::Forbidden)));

        service
            .change_role(&owner, team.id, member.id, TeamRole::Member)
            .await
            .expect("owner changes role");
    }

    #[tokio::test]
    async fn test_owner_cannot_be_removed() {
        let (service, owner, _) = setup().await;
        let team = service.create_team(&owner, "Crew").await.expect("create");

        let result = service.remove_member(&owner, team.id, owner.id).await;
        assert!(matches!(result, Err(TeamServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_member_can_leave() {
        let (service, owner, member) = setup().await;
        let team = service.create_team(&owner, "Crew").await.expect("create");

        let invite = service
            .invite_member(&owner, team.id, "casey@example.com", TeamRole::Member)
            .await
            .expect("invite");
        service
            .accept_invite(&member, &invite.token)
            .await
            .expect("accept");

        service
            .remove_member(&member, team.id, member.id)
            .await
            .expect("leave");

        let result = service.get_team(member.id, team.id).await;
        assert!(matches!(result, Err(TeamServiceError::Forbidden)));
    }

    #[tokio::test]
    async fn test_revoked_invite_rejected() {
        let (service, owner, member) = setup().await;
        let team = service.create_team(&owner, "Crew").await.expect("create");

        let invite = service
            .invite_member(&owner, team.id, "casey@example.com", TeamRole::Member)
            .await
            .expect("invite");
        service
            .revoke_invite(&owner, team.id, invite.id)
            .await
            .expect("revoke");

        let result = service.accept_invite(&member, &invite.token).await;
        assert!(matches!(result, Err(TeamServiceError::InvalidInvite(_))));
    }
}
