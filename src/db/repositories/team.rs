//! Team repository
//!
//! Teams with their members, invites, and audit trail. One trait covers the
//! whole aggregate since the rows only ever change together.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{InviteStatus, Team, TeamAuditLog, TeamInvite, TeamMember, TeamRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Team repository trait
#[async_trait]
pub trait TeamRepository: Send + Sync {
    /// Create a team
    async fn create_team(&self, team: &Team) -> Result<Team>;

    /// Get team by ID
    async fn get_team(&self, id: i64) -> Result<Option<Team>>;

    /// Teams the user belongs to
    async fn list_teams_for_user(&self, user_id: i64) -> Result<Vec<Team>>;

    /// Add a member
    async fn add_member(&self, member: &TeamMember) -> Result<TeamMember>;

    /// Get one membership row
    async fn get_member(&self, team_id: i64, user_id: i64) -> Result<Option<TeamMember>>;

    /// All members of a team
    async fn list_members(&self, team_id: i64) -> Result<Vec<TeamMember>>;

    /// Change a member's role
    async fn update_member_role(&self, team_id: i64, user_id: i64, role: TeamRole) -> Result<()>;

    /// Remove a member, returning whether a row was deleted
    async fn remove_member(&self, team_id: i64, user_id: i64) -> Result<bool>;

    /// Record an invite
    async fn create_invite(&self, invite: &TeamInvite) -> Result<TeamInvite>;

    /// Look up an invite by its token
    async fn get_invite_by_token(&self, token: &str) -> Result<Option<TeamInvite>>;

    /// Move an invite through its lifecycle
    async fn update_invite_status(&self, id: i64, status: InviteStatus) -> Result<()>;

    /// Pending and past invites for a team
    async fn list_invites(&self, team_id: i64) -> Result<Vec<TeamInvite>>;

    /// Append to the audit trail
    async fn add_audit_log(&self, log: &TeamAuditLog) -> Result<()>;

    /// Audit trail, newest first
    async fn list_audit_logs(&self, team_id: i64) -> Result<Vec<TeamAuditLog>>;
}

/// SQLx-based team repository implementation
pub struct SqlxTeamRepository {
    pool: DynDatabasePool,
}

impl SqlxTeamRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TeamRepository> {
        Arc::new(Self::new(pool))
    }
}

macro_rules! dispatch {
    ($self:ident, $sqlite_fn:ident, $mysql_fn:ident $(, $arg:expr)*) => {
        match $self.pool.driver() {
            DatabaseDriver::Sqlite => $sqlite_fn($self.pool.as_sqlite().unwrap() $(, $arg)*).await,
            DatabaseDriver::Mysql => $mysql_fn($self.pool.as_mysql().unwrap() $(, $arg)*).await,
        }
    };
}

#[async_trait]
impl TeamRepository for SqlxTeamRepository {
    async fn create_team(&self, team: &Team) -> Result<Team> {
        dispatch!(self, create_team_sqlite, create_team_mysql, team)
    }

    async fn get_team(&self, id: i64) -> Result<Option<Team>> {
        dispatch!(self, get_team_sqlite, get_team_mysql, id)
    }

    async fn list_teams_for_user(&self, user_id: i64) -> Result<Vec<Team>> {
        dispatch!(self, list_teams_sqlite, list_teams_mysql, user_id)
    }

    async fn add_member(&self, member: &TeamMember) -> Result<TeamMember> {
        dispatch!(self, add_member_sqlite, add_member_mysql, member)
    }

    async fn get_member(&self, team_id: i64, user_id: i64) -> Result<Option<TeamMember>> {
        dispatch!(self, get_member_sqlite, get_member_mysql, team_id, user_id)
    }

    async fn list_members(&self, team_id: i64) -> Result<Vec<TeamMember>> {
        dispatch!(self, list_members_sqlite, list_members_mysql, team_id)
    }

    async fn update_member_role(&self, team_id: i64, user_id: i64, role: TeamRole) -> Result<()> {
        dispatch!(
            self,
            update_member_role_sqlite,
            update_member_role_mysql,
            team_id,
            user_id,
            role
        )
    }

    async fn remove_member(&self, team_id: i64, user_id: i64) -> Result<bool> {
        dispatch!(
            self,
            remove_member_sqlite,
            remove_member_mysql,
            team_id,
            user_id
        )
    }

    async fn create_invite(&self, invite: &TeamInvite) -> Result<TeamInvite> {
        dispatch!(self, create_invite_sqlite, create_invite_mysql, invite)
    }

    async fn get_invite_by_token(&self, token: &str) -> Result<Option<TeamInvite>> {
        dispatch!(self, get_invite_sqlite, get_invite_mysql, token)
    }

    async fn update_invite_status(&self, id: i64, status: InviteStatus) -> Result<()> {
        dispatch!(
            self,
            update_invite_status_sqlite,
            update_invite_status_mysql,
            id,
            status
        )
    }

    async fn list_invites(&self, team_id: i64) -> Result<Vec<TeamInvite>> {
        dispatch!(self, list_invites_sqlite, list_invites_mysql, team_id)
    }

    async fn add_audit_log(&self, log: &TeamAuditLog) -> Result<()> {
        dispatch!(self, add_audit_log_sqlite, add_audit_log_mysql, log)
    }

    async fn list_audit_logs(&self, team_id: i64) -> Result<Vec<TeamAuditLog>> {
        dispatch!(self, list_audit_logs_sqlite, list_audit_logs_mysql, team_id)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_team_sqlite(pool: &SqlitePool, team: &Team) -> Result<Team> {
    let now = Utc::now();
    let result =
        sqlx::query("INSERT INTO teams (name, owner_id, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(&team.name)
            .bind(team.owner_id)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create team")?;

    Ok(Team {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..team.clone()
    })
}

async fn get_team_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<Team>> {
    let row = sqlx::query(
        "SELECT id, name, owner_id, created_at, updated_at FROM teams WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get team")?;

    Ok(row.map(|row| Team {
        id: row.get("id"),
        name: row.get("name"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

async fn list_teams_sqlite(pool: &SqlitePool, user_id: i64) -> Result<Vec<Team>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, t.owner_id, t.created_at, t.updated_at
        FROM teams t
        JOIN team_members m ON m.team_id = t.id
        WHERE m.user_id = ?
        ORDER BY t.created_at
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list teams")?;

    Ok(rows
        .iter()
        .map(|row| Team {
            id: row.get("id"),
            name: row.get("name"),
            owner_id: row.get("owner_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
        .collect())
}

async fn add_member_sqlite(pool: &SqlitePool, member: &TeamMember) -> Result<TeamMember> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO team_members (team_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
    )
    .bind(member.team_id)
    .bind(member.user_id)
    .bind(member.role.to_string())
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to add team member")?;

    Ok(TeamMember {
        id: result.last_insert_rowid(),
        joined_at: now,
        ..member.clone()
    })
}

async fn get_member_sqlite(
    pool: &SqlitePool,
    team_id: i64,
    user_id: i64,
) -> Result<Option<TeamMember>> {
    let row = sqlx::query(
        "SELECT id, team_id, user_id, role, joined_at FROM team_members \
         WHERE team_id = ? AND user_id = ?",
    )
    .bind(team_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get team member")?;

    match row {
        Some(row) => Ok(Some(row_to_member(
            row.get("id"),
            row.get("team_id"),
            row.get("user_id"),
            row.get("role"),
            row.get("joined_at"),
        )?)),
        None => Ok(None),
    }
}

async fn list_members_sqlite(pool: &SqlitePool, team_id: i64) -> Result<Vec<TeamMember>> {
    let rows = sqlx::query(
        "SELECT id, team_id, user_id, role, joined_at FROM team_members \
         WHERE team_id = ? ORDER BY joined_at",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await
    .context("Failed to list team members")?;

    let mut members = Vec::new();
    for row in rows {
        members.push(row_to_member(
            row.get("id"),
            row.get("team_id"),
            row.get("user_id"),
            row.get("role"),
            row.get("joined_at"),
        )?);
    }
    Ok(members)
}

async fn update_member_role_sqlite(
    pool: &SqlitePool,
    team_id: i64,
    user_id: i64,
    role: TeamRole,
) -> Result<()> {
    sqlx::query("UPDATE team_members SET role = ? WHERE team_id = ? AND user_id = ?")
        .bind(role.to_string())
        .bind(team_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update member role")?;
    Ok(())
}

async fn remove_member_sqlite(pool: &SqlitePool, team_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM team_members WHERE team_id = ? AND user_id = ?")
        .bind(team_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to remove team member")?;
    Ok(result.rows_affected() > 0)
}

async fn create_invite_sqlite(pool: &SqlitePool, invite: &TeamInvite) -> Result<TeamInvite> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO team_invites (team_id, token, email, role, status, invited_by, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(invite.team_id)
    .bind(&invite.token)
    .bind(&invite.email)
    .bind(invite.role.to_string())
    .bind(invite.status.to_string())
    .bind(invite.invited_by)
    .bind(invite.expires_at)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create invite")?;

    Ok(TeamInvite {
        id: result.last_insert_rowid(),
        created_at: now,
        ..invite.clone()
    })
}

async fn get_invite_sqlite(pool: &SqlitePool, token: &str) -> Result<Option<TeamInvite>> {
    let row = sqlx::query(
        "SELECT id, team_id, token, email, role, status, invited_by, expires_at, created_at \
         FROM team_invites WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to get invite")?;

    match row {
        Some(row) => Ok(Some(sqlite_row_to_invite(&row)?)),
        None => Ok(None),
    }
}

async fn update_invite_status_sqlite(
    pool: &SqlitePool,
    id: i64,
    status: InviteStatus,
) -> Result<()> {
    sqlx::query("UPDATE team_invites SET status = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update invite status")?;
    Ok(())
}

async fn list_invites_sqlite(pool: &SqlitePool, team_id: i64) -> Result<Vec<TeamInvite>> {
    let rows = sqlx::query(
        "SELECT id, team_id, token, email, role, status, invited_by, expires_at, created_at \
         FROM team_invites WHERE team_id = ? ORDER BY created_at DESC",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await
    .context("Failed to list invites")?;

    let mut invites = Vec::new();
    for row in rows {
        invites.push(sqlite_row_to_invite(&row)?);
    }
    Ok(invites)
}

async fn add_audit_log_sqlite(pool: &SqlitePool, log: &TeamAuditLog) -> Result<()> {
    sqlx::query(
        "INSERT INTO team_audit_logs (team_id, actor_id, action, detail, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(log.team_id)
    .bind(log.actor_id)
    .bind(&log.action)
    .bind(&log.detail)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to add audit log")?;
    Ok(())
}

async fn list_audit_logs_sqlite(pool: &SqlitePool, team_id: i64) -> Result<Vec<TeamAuditLog>> {
    let rows = sqlx::query(
        "SELECT id, team_id, actor_id, action, detail, created_at \
         FROM team_audit_logs WHERE team_id = ? ORDER BY created_at DESC",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await
    .context("Failed to list audit logs")?;

    Ok(rows
        .iter()
        .map(|row| TeamAuditLog {
            id: row.get("id"),
            team_id: row.get("team_id"),
            actor_id: row.get("actor_id"),
            action: row.get("action"),
            detail: row.get("detail"),
            created_at: row.get("created_at"),
        })
        .collect())
}

fn sqlite_row_to_invite(row: &sqlx::sqlite::SqliteRow) -> Result<TeamInvite> {
    row_to_invite(
        row.get("id"),
        row.get("team_id"),
        row.get("token"),
        row.get("email"),
        row.get("role"),
        row.get("status"),
        row.get("invited_by"),
        row.get("expires_at"),
        row.get("created_at"),
    )
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_team_mysql(pool: &MySqlPool, team: &Team) -> Result<Team> {
    let now = Utc::now();
    let result =
        sqlx::query("INSERT INTO teams (name, owner_id, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(&team.name)
            .bind(team.owner_id)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create team")?;

    Ok(Team {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..team.clone()
    })
}

async fn get_team_mysql(pool: &MySqlPool, id: i64) -> Result<Option<Team>> {
    let row = sqlx::query(
        "SELECT id, name, owner_id, created_at, updated_at FROM teams WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get team")?;

    Ok(row.map(|row| Team {
        id: row.get("id"),
        name: row.get("name"),
        owner_id: row.get("owner_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }))
}

async fn list_teams_mysql(pool: &MySqlPool, user_id: i64) -> Result<Vec<Team>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id, t.name, t.owner_id, t.created_at, t.updated_at
        FROM teams t
        JOIN team_members m ON m.team_id = t.id
        WHERE m.user_id = ?
        ORDER BY t.created_at
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .context("Failed to list teams")?;

    Ok(rows
        .iter()
        .map(|row| Team {
            id: row.get("id"),
            name: row.get("name"),
            owner_id: row.get("owner_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
        .collect())
}

async fn add_member_mysql(pool: &MySqlPool, member: &TeamMember) -> Result<TeamMember> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO team_members (team_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)",
    )
    .bind(member.team_id)
    .bind(member.user_id)
    .bind(member.role.to_string())
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to add team member")?;

    Ok(TeamMember {
        id: result.last_insert_id() as i64,
        joined_at: now,
        ..member.clone()
    })
}

async fn get_member_mysql(
    pool: &MySqlPool,
    team_id: i64,
    user_id: i64,
) -> Result<Option<TeamMember>> {
    let row = sqlx::query(
        "SELECT id, team_id, user_id, role, joined_at FROM team_members \
         WHERE team_id = ? AND user_id = ?",
    )
    .bind(team_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("Failed to get team member")?;

    match row {
        Some(row) => Ok(Some(row_to_member(
            row.get("id"),
            row.get("team_id"),
            row.get("user_id"),
            row.get("role"),
            row.get("joined_at"),
        )?)),
        None => Ok(None),
    }
}

async fn list_members_mysql(pool: &MySqlPool, team_id: i64) -> Result<Vec<TeamMember>> {
    let rows = sqlx::query(
        "SELECT id, team_id, user_id, role, joined_at FROM team_members \
         WHERE team_id = ? ORDER BY joined_at",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await
    .context("Failed to list team members")?;

    let mut members = Vec::new();
    for row in rows {
        members.push(row_to_member(
            row.get("id"),
            row.get("team_id"),
            row.get("user_id"),
            row.get("role"),
            row.get("joined_at"),
        )?);
    }
    Ok(members)
}

async fn update_member_role_mysql(
    pool: &MySqlPool,
    team_id: i64,
    user_id: i64,
    role: TeamRole,
) -> Result<()> {
    sqlx::query("UPDATE team_members SET role = ? WHERE team_id = ? AND user_id = ?")
        .bind(role.to_string())
        .bind(team_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to update member role")?;
    Ok(())
}

async fn remove_member_mysql(pool: &MySqlPool, team_id: i64, user_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM team_members WHERE team_id = ? AND user_id = ?")
        .bind(team_id)
        .bind(user_id)
        .execute(pool)
        .await
        .context("Failed to remove team member")?;
    Ok(result.rows_affected() > 0)
}

async fn create_invite_mysql(pool: &MySqlPool, invite: &TeamInvite) -> Result<TeamInvite> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO team_invites (team_id, token, email, role, status, invited_by, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(invite.team_id)
    .bind(&invite.token)
    .bind(&invite.email)
    .bind(invite.role.to_string())
    .bind(invite.status.to_string())
    .bind(invite.invited_by)
    .bind(invite.expires_at)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create invite")?;

    Ok(TeamInvite {
        id: result.last_insert_id() as i64,
        created_at: now,
        ..invite.clone()
    })
}

async fn get_invite_mysql(pool: &MySqlPool, token: &str) -> Result<Option<TeamInvite>> {
    let row = sqlx::query(
        "SELECT id, team_id, token, email, role, status, invited_by, expires_at, created_at \
         FROM team_invites WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .context("Failed to get invite")?;

    match row {
        Some(row) => Ok(Some(mysql_row_to_invite(&row)?)),
        None => Ok(None),
    }
}

async fn update_invite_status_mysql(
    pool: &MySqlPool,
    id: i64,
    status: InviteStatus,
) -> Result<()> {
    sqlx::query("UPDATE team_invites SET status = ? WHERE id = ?")
        .bind(status.to_string())
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update invite status")?;
    Ok(())
}

async fn list_invites_mysql(pool: &MySqlPool, team_id: i64) -> Result<Vec<TeamInvite>> {
    let rows = sqlx::query(
        "SELECT id, team_id, token, email, role, status, invited_by, expires_at, created_at \
         FROM team_invites WHERE team_id = ? ORDER BY created_at DESC",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await
    .context("Failed to list invites")?;

    let mut invites = Vec::new();
    for row in rows {
        invites.push(mysql_row_to_invite(&row)?);
    }
    Ok(invites)
}

async fn add_audit_log_mysql(pool: &MySqlPool, log: &TeamAuditLog) -> Result<()> {
    sqlx::query(
        "INSERT INTO team_audit_logs (team_id, actor_id, action, detail, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(log.team_id)
    .bind(log.actor_id)
    .bind(&log.action)
    .bind(&log.detail)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to add audit log")?;
    Ok(())
}

async fn list_audit_logs_mysql(pool: &MySqlPool, team_id: i64) -> Result<Vec<TeamAuditLog>> {
    let rows = sqlx::query(
        "SELECT id, team_id, actor_id, action, detail, created_at \
         FROM team_audit_logs WHERE team_id = ? ORDER BY created_at DESC",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await
    .context("Failed to list audit logs")?;

    Ok(rows
        .iter()
        .map(|row| TeamAuditLog {
            id: row.get("id"),
            team_id: row.get("team_id"),
            actor_id: row.get("actor_id"),
            action: row.get("action"),
            detail: row.get("detail"),
            created_at: row.get("created_at"),
        })
        .collect())
}

fn mysql_row_to_invite(row: &sqlx::mysql::MySqlRow) -> Result<TeamInvite> {
    row_to_invite(
        row.get("id"),
        row.get("team_id"),
        row.get("token"),
        row.get("email"),
        row.get("role"),
        row.get("status"),
        row.get("invited_by"),
        row.get("expires_at"),
        row.get("created_at"),
    )
}

// ============================================================================
// Shared row mapping
// ============================================================================

fn row_to_member(
    id: i64,
    team_id: i64,
    user_id: i64,
    role_str: String,
    joined_at: chrono::DateTime<Utc>,
) -> Result<TeamMember> {
    let role = TeamRole::from_str(&role_str)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid team role in database: {}", role_str))?;
    Ok(TeamMember {
        id,
        team_id,
        user_id,
        role,
        joined_at,
    })
}

#[allow(clippy::too_many_arguments)]
fn row_to_invite(
    id: i64,
    team_id: i64,
    token: String,
    email: String,
    role_str: String,
    status_str: String,
    invited_by: i64,
    expires_at: chrono::DateTime<Utc>,
    created_at: chrono::DateTime<Utc>,
) -> Result<TeamInvite> {
    let role = TeamRole::from_str(&role_str)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid team role in database: {}", role_str))?;
    let status = InviteStatus::from_str(&status_str)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Invalid invite status in database: {}", status_str))?;
    Ok(TeamInvite {
        id,
        team_id,
        token,
        email,
        role,
        status,
        invited_by,
        expires_at,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::user::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{User, UserRole};
    use chrono::Duration;

    async fn setup() -> (SqlxTeamRepository, i64, i64) {
        let pool = create_test_pool().await.expect("pool");
        migrations::run_migrations(&pool).await.expect("migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let owner = users
            .create(&User::new(
                "owner".to_string(),
                "owner@example.com".to_string(),
                "hash".to_string(),
                UserRole::User,
            ))
            .await
            .expect("create user");
        let other = users
            .create(&User::new(
                "member".to_string(),
                "member@example.com".to_string(),
                "hash".to_string(),
                UserRole::User,
            ))
            .await
            .expect("create user");

        (SqlxTeamRepository::new(pool), owner.id, other.id)
    }

    fn team(owner_id: i64) -> Team {
        Team {
            id: 0,
            name: "Crew".to_string(),
            owner_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn member(team_id: i64, user_id: i64, role: TeamRole) -> TeamMember {
        TeamMember {
            id: 0,
            team_id,
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_team_and_members() {
        let (repo, owner_id, other_id) = setup().await;
        let t = repo.create_team(&team(owner_id)).await.expect("create_team");
        assert!(t.id > 0);

        repo.add_member(&member(t.id, owner_id, TeamRole::Owner))
            .await
            .expect("add owner");
        repo.add_member(&member(t.id, other_id, TeamRole::Member))
            .await
            .expect("add member");

        let members = repo.list_members(t.id).await.expect("list_members");
        assert_eq!(members.len(), 2);

        let teams = repo.list_teams_for_user(other_id).await.expect("list_teams");
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].name, "Crew");
    }

    #[tokio::test]
    async fn test_duplicate_membership_rejected() {
        let (repo, owner_id, _) = setup().await;
        let t = repo.create_team(&team(owner_id)).await.expect("create_team");

        repo.add_member(&member(t.id, owner_id, TeamRole::Owner))
            .await
            .expect("add");
        let dup = repo.add_member(&member(t.id, owner_id, TeamRole::Member)).await;
        assert!(dup.is_err());
    }

    #[tokio::test]
    async fn test_role_update_and_removal() {
        let (repo, owner_id, other_id) = setup().await;
        let t = repo.create_team(&team(owner_id)).await.expect("create_team");
        repo.add_member(&member(t.id, other_id, TeamRole::Member))
            .await
            .expect("add");

        repo.update_member_role(t.id, other_id, TeamRole::Admin)
            .await
            .expect("update role");
        let m = repo
            .get_member(t.id, other_id)
            .await
            .expect("get")
            .expect("found");
        assert_eq!(m.role, TeamRole::Admin);

        assert!(repo.remove_member(t.id, other_id).await.expect("remove"));
        assert!(!repo.remove_member(t.id, other_id).await.expect("remove"));
    }

    #[tokio::test]
    async fn test_invite_lifecycle() {
        let (repo, owner_id, _) = setup().await;
        let t = repo.create_team(&team(owner_id)).await.expect("create_team");

        let invite = repo
            .create_invite(&TeamInvite {
                id: 0,
                team_id: t.id,
                token: "invite-token".to_string(),
                email: "new@example.com".to_string(),
                role: TeamRole::Member,
                status: InviteStatus::Pending,
                invited_by: owner_id,
                expires_at: Utc::now() + Duration::days(7),
                created_at: Utc::now(),
            })
            .await
            .expect("create_invite");

        let found = repo
            .get_invite_by_token("invite-token")
            .await
            .expect("get")
            .expect("found");
        assert_eq!(found.status, InviteStatus::Pending);

        repo.update_invite_status(invite.id, InviteStatus::Accepted)
            .await
            .expect("update");
        let found = repo
            .get_invite_by_token("invite-token")
            .await
            .expect("get")
            .expect("found");
        assert_eq!(found.status, InviteStatus::Accepted);

        assert_eq!(repo.list_invites(t.id).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_audit_trail() {
        let (repo, owner_id, other_id) = setup().await;
        let t = repo.create_team(&team(owner_id)).await.expect("create_team");

        repo.add_audit_log(&TeamAuditLog {
            id: 0,
            team_id: t.id,
            actor_id: owner_id,
            action: "member.invited".to_string(),
            detail: format!("invited user {}", other_id),
            created_at: Utc::now(),
        })
        .await
        .expect("audit");

        let logs = repo.list_audit_logs(t.id).await.expect("list");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, "member.invited");
    }
}
