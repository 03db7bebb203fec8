/// Team Resolution
///
/// Turns the team emails supplied by a client into verified user ids. The
/// payload field may be a single email or a list of emails; it is normalized
/// into a `Vec<String>` as soon as it is deserialized, and only ids are ever
/// handed to the Project Repository.
///
/// # Example
///
/// ```no_run
/// use crewboard_shared::models::user::UserDirectory;
/// use crewboard_shared::store::MemoryStore;
/// use crewboard_shared::team::{resolve_team, TeamInput};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), crewboard_shared::team::TeamError> {
/// let directory = UserDirectory::new(Arc::new(MemoryStore::new()));
///
/// let input: TeamInput = serde_json::from_str(r#""b@x.com""#).unwrap();
/// let ids = resolve_team(&directory, &input.into_emails()).await?;
/// # Ok(())
/// # }
/// ```

use crate::models::user::UserDirectory;
use crate::store::StorageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Raw team field: one email or many
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TeamInput {
    One(String),
    Many(Vec<String>),
}

impl TeamInput {
    /// Canonical list of emails, in input order
    pub fn into_emails(self) -> Vec<String> {
        match self {
            TeamInput::One(email) => vec![email],
            TeamInput::Many(emails) => emails,
        }
    }

    /// Normalizes an optional team field (absent means no members)
    pub fn normalize(input: Option<TeamInput>) -> Vec<String> {
        input.map(TeamInput::into_emails).unwrap_or_default()
    }
}

/// Team resolution errors
#[derive(Error, Debug)]
pub enum TeamError {
    /// At least one email has no registered user
    ///
    /// `count` is the number of emails that were submitted.
    #[error("{}", unregistered_message(*count))]
    Unregistered { count: usize },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn unregistered_message(count: usize) -> &'static str {
    if count > 1 {
        "One or more of the users you intend to add is not registered"
    } else {
        "The user you intend to add to your team is not registered"
    }
}

/// Resolves emails to user ids
///
/// Every email is looked up concurrently. If any is unregistered the whole
/// resolution fails; ids are returned in input order.
pub async fn resolve_team(directory: &UserDirectory, emails: &[String]) -> Result<Vec<Uuid>, TeamError> {
    if emails.is_empty() {
        return Ok(Vec::new());
    }

    let registration = directory.check_registered(emails).await?;
    if !registration.all_registered {
        tracing::debug!(submitted = emails.len(), "Team contains unregistered emails");
        return Err(TeamError::Unregistered {
            count: emails.len(),
        });
    }

    Ok(registration.user_ids())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::NewUser;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    async fn seeded() -> (MemoryStore, UserDirectory, Uuid, Uuid) {
        let store = MemoryStore::new();
        let directory = UserDirectory::new(Arc::new(store.clone()));
        let mut ids = Vec::new();
        for email in ["a@x.com", "b@x.com"] {
            let user = directory
                .create(NewUser {
                    first_name: "Test".to_string(),
                    last_name: "User".to_string(),
                    email: email.to_string(),
                    password_hash: "hash".to_string(),
                })
                .await
                .unwrap()
                .unwrap();
            ids.push(user.id);
        }
        (store, directory, ids[0], ids[1])
    }

    #[test]
    fn test_team_input_accepts_string_or_array() {
        let one: TeamInput = serde_json::from_str(r#""b@x.com""#).unwrap();
        assert_eq!(one.into_emails(), vec!["b@x.com".to_string()]);

        let many: TeamInput = serde_json::from_str(r#"["a@x.com","b@x.com"]"#).unwrap();
        assert_eq!(many.into_emails().len(), 2);

        assert!(serde_json::from_str::<TeamInput>("42").is_err());
    }

    #[test]
    fn test_normalize_absent_is_empty() {
        assert!(TeamInput::normalize(None).is_empty());
        assert_eq!(
            TeamInput::normalize(Some(TeamInput::One("a@x.com".to_string()))),
            vec!["a@x.com".to_string()]
        );
    }

    #[test]
    fn test_unregistered_message_cardinality() {
        assert_eq!(
            TeamError::Unregistered { count: 1 }.to_string(),
            "The user you intend to add to your team is not registered"
        );
        assert_eq!(
            TeamError::Unregistered { count: 3 }.to_string(),
            "One or more of the users you intend to add is not registered"
        );
    }

    #[tokio::test]
    async fn test_resolve_in_input_order() {
        let (_, directory, a, b) = seeded().await;
        let emails = vec!["B@x.com".to_string(), "a@x.com".to_string()];

        let ids = resolve_team(&directory, &emails).await.unwrap();
        assert_eq!(ids, vec![b, a]);
    }

    #[tokio::test]
    async fn test_one_unregistered_fails_everything() {
        let (_, directory, _, _) = seeded().await;
        let emails = vec!["a@x.com".to_string(), "ghost@x.com".to_string()];

        let err = resolve_team(&directory, &emails).await.unwrap_err();
        assert!(matches!(err, TeamError::Unregistered { count: 2 }));
    }

    #[tokio::test]
    async fn test_empty_team_skips_store() {
        let (store, directory, _, _) = seeded().await;
        store.fail_reads(true);

        assert!(resolve_team(&directory, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let (store, directory, _, _) = seeded().await;
        store.fail_reads(true);

        let err = resolve_team(&directory, &["a@x.com".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, TeamError::Storage(_)));
    }
}
