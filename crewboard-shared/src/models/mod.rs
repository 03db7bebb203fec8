/// Domain models for Crewboard
///
/// Each model owns the keys it is stored under and keeps its derived indexes
/// consistent through the [`crate::store`] adapter.
///
/// # Models
///
/// - `user`: User profiles, credentials and the User Directory
/// - `project`: Projects, their teams and the Project Repository
///
/// # Example
///
/// ```no_run
/// use crewboard_shared::models::user::{NewUser, UserDirectory};
/// use crewboard_shared::store::MemoryStore;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), crewboard_shared::store::StorageError> {
/// let users = UserDirectory::new(Arc::new(MemoryStore::new()));
///
/// let user = users
///     .create(NewUser {
///         first_name: "Ada".to_string(),
///         last_name: "Lovelace".to_string(),
///         email: "ada@example.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///     })
///     .await?;
/// assert!(user.is_some());
/// # Ok(())
/// # }
/// ```

pub mod project;
mod record;
pub mod user;
