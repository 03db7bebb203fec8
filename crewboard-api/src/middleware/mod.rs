/// Middleware modules for the API server
///
/// - `auth`: Token authentication for every protected route
/// - `project`: Project existence, ownership and team-membership guards

pub mod auth;
pub mod project;
