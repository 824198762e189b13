//! Team API endpoints
//!
//! Workspaces, membership, invites, and the audit trail.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Team, TeamAuditLog, TeamInvite, TeamMember, TeamRole};
use crate::services::team::TeamServiceError;

/// Build protected team routes
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_teams).post(create_team))
        .route("/{id}", get(get_team))
        .route("/{id}/members", get(list_members))
        .route("/{id}/members/{user_id}", delete(remove_member))
        .route("/{id}/members/{user_id}/role", put(change_role))
        .route("/{id}/invites", get(list_invites).post(invite_member))
        .route("/{id}/invites/{invite_id}", delete(revoke_invite))
        .route("/{id}/audit", get(audit_logs))
        .route("/invites/accept", post(accept_invite))
}

fn map_team_error(e: TeamServiceError) -> ApiError {
    match e {
        TeamServiceError::NotFound => ApiError::not_found("Team not found"),
        TeamServiceError::Forbidden => {
            ApiError::forbidden("You do not have permission to do that")
        }
        TeamServiceError::ValidationError(msg) => ApiError::validation_error(msg),
        TeamServiceError::InvalidInvite(msg) => {
            ApiError::validation_error(format!("Invite is not valid: {}", msg))
        }
        TeamServiceError::InternalError(err) => ApiError::internal_error(err.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct CreateTeamRequest {
    name: String,
}

/// POST /api/teams
async fn create_team(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateTeamRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let team = state
        .team_service
        .create_team(&user.0, &body.name)
        .await
        .map_err(map_team_error)?;

    Ok((StatusCode::CREATED, Json(team)))
}

/// GET /api/teams
async fn list_teams(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Team>>, ApiError> {
    let teams = state
        .team_service
        .list_teams(user.0.id)
        .await
        .map_err(map_team_error)?;

    Ok(Json(teams))
}

#[derive(Debug, Serialize)]
struct TeamDetailResponse {
    #[serde(flatten)]
    team: Team,
    my_role: String,
}

/// GET /api/teams/{id}
async fn get_team(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<TeamDetailResponse>, ApiError> {
    let (team, role) = state
        .team_service
        .get_team(user.0.id, id)
        .await
        .map_err(map_team_error)?;

    Ok(Json(TeamDetailResponse {
        team,
        my_role: role.to_string(),
    }))
}

/// GET /api/teams/{id}/members
async fn list_members(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<TeamMember>>, ApiError> {
    let members = state
        .team_service
        .list_members(user.0.id, id)
        .await
        .map_err(map_team_error)?;

    Ok(Json(members))
}

#[derive(Debug, Deserialize)]
struct InviteRequest {
    email: String,
    #[serde(default)]
    role: TeamRole,
}

/// POST /api/teams/{id}/invites
async fn invite_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<InviteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let invite = state
        .team_service
        .invite_member(&user.0, id, &body.email, body.role)
        .await
        .map_err(map_team_error)?;

    // The token travels by email only; echo it here for the inviter to
    // share out of band when email is not configured.
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": invite.id,
            "email": invite.email,
            "role": invite.role.to_string(),
            "token": invite.token,
            "expires_at": invite.expires_at.to_rfc3339(),
        })),
    ))
}

/// GET /api/teams/{id}/invites
async fn list_invites(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<TeamInvite>>, ApiError> {
    let invites = state
        .team_service
        .list_invites(&user.0, id)
        .await
        .map_err(map_team_error)?;

    Ok(Json(invites))
}

/// DELETE /api/teams/{id}/invites/{invite_id}
async fn revoke_invite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, invite_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .team_service
        .revoke_invite(&user.0, id, invite_id)
        .await
        .map_err(map_team_error)?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct AcceptInviteRequest {
    token: String,
}

/// POST /api/teams/invites/accept
async fn accept_invite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<AcceptInviteRequest>,
) -> Result<Json<TeamMember>, ApiError> {
    let member = state
        .team_service
        .accept_invite(&user.0, &body.token)
        .await
        .map_err(map_team_error)?;

    Ok(Json(member))
}

#[derive(Debug, Deserialize)]
struct ChangeRoleRequest {
    role: TeamRole,
}

/// PUT /api/teams/{id}/members/{user_id}/role
async fn change_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, member_user_id)): Path<(i64, i64)>,
    Json(body): Json<ChangeRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .team_service
        .change_role(&user.0, id, member_user_id, body.role)
        .await
        .map_err(map_team_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/teams/{id}/members/{user_id}
async fn remove_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, member_user_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .team_service
        .remove_member(&user.0, id, member_user_id)
        .await
        .map_err(map_team_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/teams/{id}/audit
async fn audit_logs(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<TeamAuditLog>>, ApiError> {
    let logs = state
        .team_service
        .audit_logs(&user.0, id)
        .await
        .map_err(map_team_error)?;

    Ok(Json(logs))
}
