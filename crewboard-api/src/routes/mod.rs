/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Signup, signin and logout
/// - `projects`: Project CRUD and team management
/// - `users`: The caller's profile and team projects

pub mod auth;
pub mod health;
pub mod projects;
pub mod users;
