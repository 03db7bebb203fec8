/// User endpoints
///
/// - `GET /api/v1/user`               - The caller's profile
/// - `GET /api/v1/user/team/projects` - Projects the caller is a team member of

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    response::ApiResponse,
};
use axum::{extract::State, Extension};
use crewboard_shared::{
    auth::middleware::AuthContext,
    models::{project::Project, user::User},
};

pub async fn current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<User>> {
    let user = state
        .users
        .fetch_by_id(auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("A user with the given ID does not exist".to_string()))?;

    Ok(ApiResponse::success(user))
}

/// Includes projects the caller owns, since the owner is always on the team
pub async fn team_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<Vec<Project>>> {
    let projects = state.projects.fetch_projects_by_user_id(auth.user_id).await?;
    Ok(ApiResponse::success(projects))
}
