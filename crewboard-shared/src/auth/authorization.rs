/// Project authorization guards
///
/// Each guard is a pure predicate over an already-loaded [`Project`] and the
/// caller's identity. The API runs them as a chain in front of project routes;
/// the first failing guard short-circuits the request.
///
/// | guard                     | used by                 | failure |
/// |---------------------------|-------------------------|---------|
/// | [`require_ownership`]     | update, delete, team    | 403     |
/// | [`require_team_member`]   | read one project        | 403     |
/// | [`reject_existing_members`] | team add              | 400     |
/// | [`require_target_member`] | team remove             | 400     |
/// | [`reject_owner_removal`]  | team remove             | 400     |
///
/// # Example
///
/// ```no_run
/// use crewboard_shared::auth::authorization::{require_ownership, AuthzError};
/// use crewboard_shared::models::project::Project;
/// use uuid::Uuid;
///
/// fn can_edit(project: &Project, caller: Uuid) -> Result<(), AuthzError> {
///     require_ownership(project, caller)
/// }
/// ```

use uuid::Uuid;

use crate::models::project::Project;

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Caller does not own the project
    #[error("Only the project owner is authorized to perform this action")]
    NotOwner,

    /// Caller is not on the team
    #[error("You are not authorized to access a project if you are not a team member")]
    NotTeamMember,

    /// Proposed members are already on the team
    ///
    /// `proposed` is how many members the request tried to add.
    #[error("{}", already_on_team_message(*proposed))]
    AlreadyOnTeam { proposed: usize },

    /// Removal target is not on the team
    #[error("The user with the ID provided is not a member of the team on this project")]
    TargetNotOnTeam,

    #[error("The project owner cannot be removed from the team")]
    OwnerRemoval,
}

impl AuthzError {
    /// Whether the failure is a permission failure (403) rather than a bad request
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AuthzError::NotOwner | AuthzError::NotTeamMember)
    }
}

fn already_on_team_message(proposed: usize) -> &'static str {
    if proposed > 1 {
        "One or more of the users to be added is already on the team"
    } else {
        "The user to be added is already on the team"
    }
}

/// Requires `user_id` to be the project owner
pub fn require_ownership(project: &Project, user_id: Uuid) -> Result<(), AuthzError> {
    if !project.is_owner(user_id) {
        return Err(AuthzError::NotOwner);
    }
    Ok(())
}

/// Requires `user_id` to be on the project team
pub fn require_team_member(project: &Project, user_id: Uuid) -> Result<(), AuthzError> {
    if !project.has_member(user_id) {
        return Err(AuthzError::NotTeamMember);
    }
    Ok(())
}

/// Rejects a team add if any proposed member is already on the team
///
/// The message is singular or plural depending on how many members were
/// proposed, not on how many collided.
pub fn reject_existing_members(project: &Project, proposed: &[Uuid]) -> Result<(), AuthzError> {
    if proposed.iter().any(|id| project.has_member(*id)) {
        return Err(AuthzError::AlreadyOnTeam {
            proposed: proposed.len(),
        });
    }
    Ok(())
}

/// Requires the removal target to be on the team
pub fn require_target_member(project: &Project, target: Uuid) -> Result<(), AuthzError> {
    if !project.has_member(target) {
        return Err(AuthzError::TargetNotOnTeam);
    }
    Ok(())
}

/// Rejects removing the owner from their own team
pub fn reject_owner_removal(project: &Project, target: Uuid) -> Result<(), AuthzError> {
    if project.is_owner(target) {
        return Err(AuthzError::OwnerRemoval);
    }
    Ok(())
}
