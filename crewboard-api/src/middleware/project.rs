/// Project guard layers
///
/// Applied with `route_layer` to every route that addresses one project, in
/// this order:
///
/// 1. [`load_project`]: 404 if the `:id` project does not exist, otherwise
///    the resolved [`Project`] is inserted into the request extensions
/// 2. [`require_owner`] or [`require_member`]: 403 unless the caller owns the
///    project or is on its team
///
/// Handlers behind these layers read the project with `Extension<Project>`
/// instead of fetching it again.

use crate::app::AppState;
use crate::error::ApiError;
use crate::routes::projects::PROJECT_NOT_FOUND;
use axum::{
    extract::{Extension, Path, Request, State},
    middleware::Next,
    response::Response,
};
use crewboard_shared::auth::{authorization, middleware::AuthContext};
use crewboard_shared::models::project::Project;
use std::collections::HashMap;
use uuid::Uuid;

/// Loads the `:id` project into the request extensions
///
/// An id that is not a UUID cannot name a project and is reported as 404.
pub async fn load_project(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let not_found = || ApiError::NotFound(PROJECT_NOT_FOUND.to_string());

    let id = params
        .get("id")
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(not_found)?;

    let project = state.projects.fetch_by_id(id).await?.ok_or_else(not_found)?;

    request.extensions_mut().insert(project);
    Ok(next.run(request).await)
}

/// Rejects callers who do not own the loaded project
pub async fn require_owner(
    Extension(auth): Extension<AuthContext>,
    Extension(project): Extension<Project>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(err) = authorization::require_ownership(&project, auth.user_id) {
        tracing::debug!(project_id = %project.id, user_id = %auth.user_id, "Owner check failed");
        return Err(err.into());
    }
    Ok(next.run(request).await)
}

/// Rejects callers who are not on the loaded project's team
pub async fn require_member(
    Extension(auth): Extension<AuthContext>,
    Extension(project): Extension<Project>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    authorization::require_team_member(&project, auth.user_id)?;
    Ok(next.run(request).await)
}
