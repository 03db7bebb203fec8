/// Key naming for the denormalized project/user layout
///
/// ```text
/// user:{id}               hash   profile
/// users                   set    all user ids
/// email:{email}           hash   credential projection (id, password)
/// project:{id}            hash   project record
/// project:{id}:team       set    member ids
/// project:{id}:stories    set    story ids
/// projects                set    global project index
/// user:{id}:projects      set    projects owned by the user
/// user:{id}:member-of     set    projects the user is a team member of
/// ```

use uuid::Uuid;

/// Global set of user ids
pub const USERS: &str = "users";

/// Global project index
pub const PROJECTS: &str = "projects";

pub fn user_key(id: Uuid) -> String {
    format!("user:{}", id)
}

/// Credential key. Emails are lower-cased so lookups are case-insensitive.
pub fn credential_key(email: &str) -> String {
    format!("email:{}", email.trim().to_lowercase())
}

pub fn project_key(id: Uuid) -> String {
    format!("project:{}", id)
}

pub fn project_team_key(id: Uuid) -> String {
    format!("project:{}:team", id)
}

pub fn project_stories_key(id: Uuid) -> String {
    format!("project:{}:stories", id)
}

pub fn owned_projects_key(user_id: Uuid) -> String {
    format!("user:{}:projects", user_id)
}

pub fn member_of_key(user_id: Uuid) -> String {
    format!("user:{}:member-of", user_id)
}
