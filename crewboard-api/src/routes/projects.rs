/// Project endpoints
///
/// Every route requires authentication. Routes addressing a single project
/// run behind the project guards (see [`crate::middleware::project`]), which
/// load the project into the request extensions and check ownership or team
/// membership before the handler runs.
///
/// # Endpoints
///
/// - `POST   /api/v1/project`                      - Create a project (201)
/// - `GET    /api/v1/project`                      - List projects owned by the caller
/// - `GET    /api/v1/project/:id`                  - Read a project (team members)
/// - `PUT    /api/v1/project/:id`                  - Update title/description (owner)
/// - `DELETE /api/v1/project/:id`                  - Delete a project (owner, 204)
/// - `PATCH  /api/v1/project/:id/team`             - Add team members by email (owner)
/// - `PATCH  /api/v1/project/:id/team/:member_id`  - Remove a team member (owner)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{Payload, ValidJson},
    response::ApiResponse,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension,
};
use crewboard_shared::{
    auth::{authorization, middleware::AuthContext},
    models::project::{NewProject, Project, ProjectUpdate},
    team::{resolve_team, TeamInput},
};
use serde::Deserialize;
use std::borrow::Cow;
use std::collections::HashMap;
use uuid::Uuid;
use validator::{Validate, ValidateEmail, ValidationError};

pub(crate) const PROJECT_NOT_FOUND: &str = "A project with the given ID does not exist";

/// Create project request
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_create_team"))]
pub struct CreateProjectRequest {
    #[validate(
        required(message = "A title is required and must be between 3-25 characters long"),
        length(min = 3, max = 25, message = "A title is required and must be between 3-25 characters long")
    )]
    pub title: Option<String>,

    #[validate(
        required(message = "A description is required and must be between 3-100 characters long"),
        length(min = 3, max = 100, message = "A description is required and must be between 3-100 characters long")
    )]
    pub description: Option<String>,

    /// One email or a list of emails
    pub team: Option<TeamInput>,
}

impl Payload for CreateProjectRequest {
    const FIELDS: &'static [&'static str] = &["title", "description", "__all__"];
}

/// Update project request
///
/// Unknown fields (owner, team) are rejected rather than ignored.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
#[validate(schema(function = "validate_update_present"))]
pub struct UpdateProjectRequest {
    #[validate(length(min = 3, max = 25, message = "A title is required and must be between 3-25 characters long"))]
    pub title: Option<String>,

    #[validate(length(min = 3, max = 100, message = "A description is required and must be between 3-100 characters long"))]
    pub description: Option<String>,
}

impl Payload for UpdateProjectRequest {
    const FIELDS: &'static [&'static str] = &["title", "description", "__all__"];
}

/// Team add request
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_team_add"))]
pub struct TeamRequest {
    pub team: Option<TeamInput>,
}

impl Payload for TeamRequest {
    const FIELDS: &'static [&'static str] = &["__all__"];
}

fn schema_error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn all_emails(team: &TeamInput) -> bool {
    match team {
        TeamInput::One(email) => email.validate_email(),
        TeamInput::Many(emails) => emails.iter().all(|email| email.validate_email()),
    }
}

fn validate_create_team(req: &CreateProjectRequest) -> Result<(), ValidationError> {
    match &req.team {
        Some(team) if !all_emails(team) => Err(schema_error(
            "team",
            "A team should be a list of existing users' emails",
        )),
        _ => Ok(()),
    }
}

fn validate_update_present(req: &UpdateProjectRequest) -> Result<(), ValidationError> {
    if req.title.is_none() && req.description.is_none() {
        return Err(schema_error(
            "title",
            "At least a title or a description must be provided with 3-25 or 3-100 characters respectively",
        ));
    }
    Ok(())
}

fn validate_team_add(req: &TeamRequest) -> Result<(), ValidationError> {
    let valid = match &req.team {
        Some(TeamInput::Many(emails)) if emails.is_empty() => false,
        Some(team) => all_emails(team),
        None => false,
    };

    if !valid {
        return Err(schema_error(
            "team",
            "An email address or array of emails of existing users is required",
        ));
    }
    Ok(())
}

/// Creates a project owned by the caller
///
/// Team emails are resolved to user ids first; one unregistered email fails
/// the whole request and nothing is written.
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidJson(req): ValidJson<CreateProjectRequest>,
) -> ApiResult<(StatusCode, ApiResponse<Project>)> {
    let emails = TeamInput::normalize(req.team);
    let team = resolve_team(&state.users, &emails).await?;

    let project = state
        .projects
        .create(NewProject {
            title: req.title.unwrap_or_default(),
            description: req.description.unwrap_or_default(),
            owner: auth.user_id,
            team,
        })
        .await?;

    tracing::info!(project_id = %project.id, owner = %auth.user_id, "Project created");
    Ok(ApiResponse::with_status(StatusCode::CREATED, project))
}

/// Lists the caller's own projects
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<Vec<Project>>> {
    let projects = state.projects.fetch_by_owner_id(auth.user_id).await?;
    Ok(ApiResponse::success(projects))
}

/// Returns the project loaded by the guards
pub async fn get_project(Extension(project): Extension<Project>) -> ApiResponse<Project> {
    ApiResponse::success(project)
}

/// Merges a new title and/or description into the project
pub async fn update_project(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    ValidJson(req): ValidJson<UpdateProjectRequest>,
) -> ApiResult<ApiResponse<Project>> {
    let updated = state
        .projects
        .update_by_id(
            project.id,
            ProjectUpdate {
                title: req.title,
                description: req.description,
            },
        )
        .await?
        .ok_or_else(|| ApiError::NotFound(PROJECT_NOT_FOUND.to_string()))?;

    Ok(ApiResponse::success(updated))
}

/// Deletes the project and every index entry pointing at it
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
) -> ApiResult<StatusCode> {
    state
        .projects
        .delete_by_id(project.id, project.owner.id)
        .await?;

    tracing::info!(project_id = %project.id, "Project deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Adds registered users to the team
///
/// Fails with 400 if any email is unregistered or any resolved user is
/// already on the team; the team is left unchanged in both cases.
pub async fn add_team_members(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    ValidJson(req): ValidJson<TeamRequest>,
) -> ApiResult<ApiResponse<Project>> {
    let emails = TeamInput::normalize(req.team);
    let members = resolve_team(&state.users, &emails).await?;

    authorization::reject_existing_members(&project, &members)?;

    let updated = state
        .projects
        .add_to_team(project.id, &members)
        .await?
        .ok_or_else(|| ApiError::NotFound(PROJECT_NOT_FOUND.to_string()))?;

    Ok(ApiResponse::success(updated))
}

/// Removes one member from the team
///
/// The owner cannot be removed.
pub async fn remove_team_member(
    State(state): State<AppState>,
    Extension(project): Extension<Project>,
    Path(params): Path<HashMap<String, String>>,
) -> ApiResult<ApiResponse<Project>> {
    let member = params
        .get("member_id")
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or_else(|| ApiError::BadRequest("A valid user ID is required".to_string()))?;

    authorization::require_target_member(&project, member)?;
    authorization::reject_owner_removal(&project, member)?;

    let updated = state
        .projects
        .remove_from_team(project.id, member)
        .await?
        .ok_or_else(|| ApiError::NotFound(PROJECT_NOT_FOUND.to_string()))?;

    Ok(ApiResponse::success(updated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_message<T: Payload>(payload: &T) -> Option<String> {
        match payload.validate() {
            Ok(()) => None,
            Err(errors) => match crate::extract::violations(&errors, T::FIELDS) {
                ApiError::Validation { message, .. } => Some(message),
                _ => None,
            },
        }
    }

    #[test]
    fn test_create_requires_title_first() {
        let req: CreateProjectRequest =
            serde_json::from_value(serde_json::json!({ "description": "x" })).unwrap();
        assert_eq!(
            first_message(&req).as_deref(),
            Some("A title is required and must be between 3-25 characters long")
        );
    }

    #[test]
    fn test_create_accepts_string_or_array_team() {
        let one: CreateProjectRequest = serde_json::from_value(serde_json::json!({
            "title": "Sprint", "description": "Q1 work", "team": "b@x.com"
        }))
        .unwrap();
        assert!(first_message(&one).is_none());

        let bad: CreateProjectRequest = serde_json::from_value(serde_json::json!({
            "title": "Sprint", "description": "Q1 work", "team": ["b@x.com", "nope"]
        }))
        .unwrap();
        assert_eq!(
            first_message(&bad).as_deref(),
            Some("A team should be a list of existing users' emails")
        );
    }

    #[test]
    fn test_update_needs_a_field() {
        let empty: UpdateProjectRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(first_message(&empty)
            .unwrap()
            .starts_with("At least a title or a description"));

        let title: UpdateProjectRequest =
            serde_json::from_value(serde_json::json!({ "title": "Renamed" })).unwrap();
        assert!(first_message(&title).is_none());
    }

    #[test]
    fn test_update_rejects_owner_field() {
        let result: Result<UpdateProjectRequest, _> =
            serde_json::from_value(serde_json::json!({ "title": "Renamed", "owner": "x" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_team_add_requires_team() {
        let missing: TeamRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        let empty: TeamRequest = serde_json::from_value(serde_json::json!({ "team": [] })).unwrap();
        let one: TeamRequest =
            serde_json::from_value(serde_json::json!({ "team": "b@x.com" })).unwrap();

        let expected = "An email address or array of emails of existing users is required";
        assert_eq!(first_message(&missing).as_deref(), Some(expected));
        assert_eq!(first_message(&empty).as_deref(), Some(expected));
        assert!(first_message(&one).is_none());
    }
}
