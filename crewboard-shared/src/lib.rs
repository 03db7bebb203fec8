//! # Crewboard Shared Library
//!
//! Domain types, persistence and auth primitives used by the Crewboard API.
//!
//! ## Module Organization
//!
//! - `store`: Key-value store contract, Redis and in-memory implementations
//! - `models`: User Directory and Project Repository
//! - `team`: Resolution of team emails into user ids
//! - `auth`: Password hashing, tokens, request authentication and guards

pub mod auth;
pub mod models;
pub mod store;
pub mod team;

/// Current version of the Crewboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
