/// User model and the User Directory
///
/// A user is stored as two records so login can look up a password hash by
/// email without scanning users:
///
/// ```text
/// user:{id}        hash  id, firstName, lastName, email, createdAt
/// email:{email}    hash  id, password        (credential projection)
/// users            set   every user id
/// ```
///
/// Emails are lower-cased before they are stored or looked up.
///
/// # Example
///
/// ```no_run
/// use crewboard_shared::models::user::{NewUser, UserDirectory};
/// use crewboard_shared::store::MemoryStore;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), crewboard_shared::store::StorageError> {
/// let directory = UserDirectory::new(Arc::new(MemoryStore::new()));
///
/// let user = directory
///     .create(NewUser {
///         first_name: "Ada".to_string(),
///         last_name: "Lovelace".to_string(),
///         email: "Ada@Example.com".to_string(),
///         password_hash: "$argon2id$...".to_string(),
///     })
///     .await?
///     .expect("email is free");
///
/// let (credential, found) = directory.fetch_by_email("ada@example.com").await?.unwrap();
/// assert_eq!(found.id, user.id);
/// assert_eq!(credential.id, user.id);
/// # Ok(())
/// # }
/// ```

use super::record::Record;
use crate::store::{keys, Batch, Guard, KeyValueStore, StorageError, StoreResult};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// User profile
///
/// The password hash is deliberately absent; it lives on [`Credential`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    pub first_name: String,

    pub last_name: String,

    /// Lower-cased email address, unique across users
    pub email: String,

    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl User {
    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("id".to_string(), self.id.to_string()),
            ("firstName".to_string(), self.first_name.clone()),
            ("lastName".to_string(), self.last_name.clone()),
            ("email".to_string(), self.email.clone()),
            ("createdAt".to_string(), self.created_at.to_rfc3339()),
        ]
    }

    fn from_record(record: &Record<'_>) -> StoreResult<Self> {
        Ok(Self {
            id: record.uuid("id")?,
            first_name: record.string("firstName")?,
            last_name: record.string("lastName")?,
            email: record.string("email")?,
            created_at: record.timestamp("createdAt")?,
        })
    }
}

/// Credential projection, keyed by email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Owning user
    pub id: Uuid,

    /// Argon2id PHC string
    pub password_hash: String,
}

impl Credential {
    fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            ("id".to_string(), self.id.to_string()),
            ("password".to_string(), self.password_hash.clone()),
        ]
    }

    fn from_record(record: &Record<'_>) -> StoreResult<Self> {
        Ok(Self {
            id: record.uuid("id")?,
            password_hash: record.string("password")?,
        })
    }
}

/// Input for registering a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,

    /// Already-hashed password (never plaintext)
    pub password_hash: String,
}

/// Outcome of resolving a list of emails
///
/// `all_registered` is false when any entry is `None`. `resolved` is in the
/// same order as the input.
#[derive(Debug, Clone)]
pub struct Registration {
    pub all_registered: bool,
    pub resolved: Vec<Option<(Credential, User)>>,
}

impl Registration {
    /// Ids of the resolved users, in input order, skipping unresolved entries
    pub fn user_ids(&self) -> Vec<Uuid> {
        self.resolved
            .iter()
            .flatten()
            .map(|(_, user)| user.id)
            .collect()
    }
}

/// Maps user id ↔ email ↔ credential
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn KeyValueStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Registers a user
    ///
    /// Writes the profile, the id index entry and the credential projection
    /// in one atomic batch, only if no credential exists for the email yet.
    /// Returns `None`, with nothing written, when the email is taken.
    pub async fn create(&self, data: NewUser) -> StoreResult<Option<User>> {
        let user = User {
            id: Uuid::new_v4(),
            first_name: data.first_name,
            last_name: data.last_name,
            email: data.email.trim().to_lowercase(),
            created_at: Utc::now(),
        };
        let credential = Credential {
            id: user.id,
            password_hash: data.password_hash,
        };

        let credential_key = keys::credential_key(&user.email);
        let batch = Batch::new()
            .hash_set(keys::user_key(user.id), user.to_fields())
            .set_add(keys::USERS, vec![user.id.to_string()])
            .hash_set(credential_key.clone(), credential.to_fields());

        if !self
            .store
            .execute_if(Guard::absent(credential_key), batch)
            .await?
        {
            tracing::debug!("Email already registered");
            return Ok(None);
        }

        tracing::debug!(user_id = %user.id, "Registered user");
        Ok(Some(user))
    }

    /// Finds a user by ID
    pub async fn fetch_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let key = keys::user_key(id);
        let fields = self.store.hash_get_all(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        User::from_record(&Record::new(&key, &fields)).map(Some)
    }

    /// Finds a user and their credential by email (case-insensitive)
    ///
    /// A credential whose user record is missing is reported as corrupt.
    pub async fn fetch_by_email(&self, email: &str) -> StoreResult<Option<(Credential, User)>> {
        let key = keys::credential_key(email);
        let fields = self.store.hash_get_all(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let credential = Credential::from_record(&Record::new(&key, &fields))?;
        let user = self
            .fetch_by_id(credential.id)
            .await?
            .ok_or_else(|| StorageError::corrupt(&key, "credential has no user record"))?;

        Ok(Some((credential, user)))
    }

    /// Resolves every email concurrently
    ///
    /// Any single lookup failure fails the whole call.
    pub async fn check_registered(&self, emails: &[String]) -> StoreResult<Registration> {
        let resolved = try_join_all(emails.iter().map(|email| self.fetch_by_email(email))).await?;
        let all_registered = resolved.iter().all(Option::is_some);

        Ok(Registration {
            all_registered,
            resolved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$hash".to_string(),
        }
    }

    fn directory() -> (MemoryStore, UserDirectory) {
        let store = MemoryStore::new();
        let directory = UserDirectory::new(Arc::new(store.clone()));
        (store, directory)
    }

    #[tokio::test]
    async fn test_create_writes_profile_and_credential() {
        let (store, directory) = directory();
        let user = directory.create(new_user("Ada@Example.com")).await.unwrap().unwrap();

        assert_eq!(user.email, "ada@example.com");
        assert!(store.contains_key(&keys::user_key(user.id)));
        assert!(store.contains_key("email:ada@example.com"));
        assert_eq!(
            store.set_members(keys::USERS).await.unwrap(),
            vec![user.id.to_string()]
        );
    }

    #[tokio::test]
    async fn test_create_rejects_taken_email() {
        let (store, directory) = directory();
        let first = directory.create(new_user("taken@x.com")).await.unwrap().unwrap();

        let mut second = new_user("TAKEN@x.com");
        second.password_hash = "$argon2id$other".to_string();
        assert!(directory.create(second).await.unwrap().is_none());

        let (credential, user) = directory.fetch_by_email("taken@x.com").await.unwrap().unwrap();
        assert_eq!(credential.id, first.id);
        assert_eq!(credential.password_hash, "$argon2id$hash");
        assert_eq!(user, first);
        assert_eq!(
            store.set_members(keys::USERS).await.unwrap(),
            vec![first.id.to_string()]
        );
    }

    #[tokio::test]
    async fn test_concurrent_creates_register_one_user() {
        let (store, directory) = directory();

        let (a, b) = tokio::join!(
            directory.create(new_user("race@x.com")),
            directory.create(new_user("race@x.com"))
        );
        let created: Vec<User> = vec![a.unwrap(), b.unwrap()].into_iter().flatten().collect();

        assert_eq!(created.len(), 1);
        let (credential, _) = directory.fetch_by_email("race@x.com").await.unwrap().unwrap();
        assert_eq!(credential.id, created[0].id);
        assert_eq!(store.set_members(keys::USERS).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_by_id() {
        let (_, directory) = directory();
        let user = directory.create(new_user("a@x.com")).await.unwrap().unwrap();

        assert_eq!(directory.fetch_by_id(user.id).await.unwrap(), Some(user));
        assert_eq!(directory.fetch_by_id(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_fetch_by_email_is_case_insensitive() {
        let (_, directory) = directory();
        let user = directory.create(new_user("b@x.com")).await.unwrap().unwrap();

        let (credential, found) = directory.fetch_by_email("B@X.COM").await.unwrap().unwrap();
        assert_eq!(credential.id, user.id);
        assert_eq!(credential.password_hash, "$argon2id$hash");
        assert_eq!(found, user);

        assert!(directory.fetch_by_email("c@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dangling_credential_is_corrupt() {
        let (store, directory) = directory();
        let id = Uuid::new_v4();
        store
            .hash_set(
                "email:ghost@x.com",
                &[
                    ("id".to_string(), id.to_string()),
                    ("password".to_string(), "h".to_string()),
                ],
            )
            .await
            .unwrap();

        let err = directory.fetch_by_email("ghost@x.com").await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_check_registered_preserves_order() {
        let (_, directory) = directory();
        let a = directory.create(new_user("a@x.com")).await.unwrap().unwrap();
        let b = directory.create(new_user("b@x.com")).await.unwrap().unwrap();

        let emails = vec!["b@x.com".to_string(), "a@x.com".to_string()];
        let registration = directory.check_registered(&emails).await.unwrap();

        assert!(registration.all_registered);
        assert_eq!(registration.user_ids(), vec![b.id, a.id]);
    }

    #[tokio::test]
    async fn test_check_registered_reports_missing() {
        let (_, directory) = directory();
        directory.create(new_user("a@x.com")).await.unwrap().unwrap();

        let emails = vec!["a@x.com".to_string(), "nobody@x.com".to_string()];
        let registration = directory.check_registered(&emails).await.unwrap();

        assert!(!registration.all_registered);
        assert!(registration.resolved[0].is_some());
        assert!(registration.resolved[1].is_none());
    }

    #[tokio::test]
    async fn test_check_registered_propagates_store_failure() {
        let (store, directory) = directory();
        store.fail_reads(true);

        let emails = vec!["a@x.com".to_string()];
        assert!(directory.check_registered(&emails).await.is_err());
    }

    #[tokio::test]
    async fn test_check_registered_empty() {
        let (_, directory) = directory();
        let registration = directory.check_registered(&[]).await.unwrap();
        assert!(registration.all_registered);
        assert!(registration.resolved.is_empty());
    }

    #[test]
    fn test_user_serialization_omits_password() {
        let user = User {
            id: Uuid::new_v4(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["firstName"], "Ada");
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
    }
}
