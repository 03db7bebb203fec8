/// Key-value store adapter
///
/// The project and user models are persisted as a denormalized set of hash
/// records and string sets. This module defines the narrow store contract the
/// models need and two implementations of it:
///
/// - [`redis::RedisStore`]: production store over a Redis connection manager
/// - [`memory::MemoryStore`]: in-process store used by tests and local runs
///
/// # Atomic batches
///
/// Multi-key writes are expressed as a [`Batch`] and handed to
/// [`KeyValueStore::execute`], which must apply every command or none of them.
/// On Redis this is a `MULTI`/`EXEC` pipeline.
///
/// Writes that must only land while a key exists (or does not exist yet) go
/// through [`KeyValueStore::execute_if`] with a [`Guard`]; on Redis the check
/// and the writes run as one Lua script.
///
/// # Example
///
/// ```no_run
/// use crewboard_shared::store::{Batch, KeyValueStore, MemoryStore};
///
/// # async fn example() -> Result<(), crewboard_shared::store::StorageError> {
/// let store = MemoryStore::new();
///
/// let batch = Batch::new()
///     .hash_set("project:1", vec![("title".to_string(), "Sprint".to_string())])
///     .set_add("projects", vec!["1".to_string()]);
/// store.execute(batch).await?;
///
/// let ids = store.set_members("projects").await?;
/// assert_eq!(ids, vec!["1".to_string()]);
/// # Ok(())
/// # }
/// ```

pub mod keys;
pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::redis::{RedisConfig, RedisStore};

/// Store errors
///
/// Every failure of the underlying store is reported through this type with a
/// human-readable message. Callers decide whether to retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Could not reach the store
    #[error("Store connection error: {0}")]
    Connection(String),

    /// A command was rejected or failed
    #[error("Store command error: {0}")]
    Command(String),

    /// Store configuration is invalid
    #[error("Store configuration error: {0}")]
    Config(String),

    /// A stored record could not be interpreted
    #[error("Corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl StorageError {
    /// Builds a corrupt-record error for `key`
    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        StorageError::Corrupt {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Store result type alias
pub type StoreResult<T> = Result<T, StorageError>;

/// A single write command inside a [`Batch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write field/value pairs into a hash (HSET)
    HashSet {
        key: String,
        fields: Vec<(String, String)>,
    },

    /// Add members to a set (SADD)
    SetAdd { key: String, members: Vec<String> },

    /// Remove members from a set (SREM)
    SetRemove { key: String, members: Vec<String> },

    /// Delete whole keys (DEL)
    Delete { keys: Vec<String> },
}

/// Ordered list of write commands applied atomically
///
/// Commands with nothing to write are dropped while building, since Redis
/// rejects `HSET`/`SADD`/`SREM`/`DEL` without arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    /// Creates an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an HSET
    pub fn hash_set(mut self, key: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        if !fields.is_empty() {
            self.commands.push(Command::HashSet {
                key: key.into(),
                fields,
            });
        }
        self
    }

    /// Appends an SADD
    pub fn set_add(mut self, key: impl Into<String>, members: Vec<String>) -> Self {
        if !members.is_empty() {
            self.commands.push(Command::SetAdd {
                key: key.into(),
                members,
            });
        }
        self
    }

    /// Appends an SREM
    pub fn set_remove(mut self, key: impl Into<String>, members: Vec<String>) -> Self {
        if !members.is_empty() {
            self.commands.push(Command::SetRemove {
                key: key.into(),
                members,
            });
        }
        self
    }

    /// Appends a DEL
    pub fn delete(mut self, keys: Vec<String>) -> Self {
        if !keys.is_empty() {
            self.commands.push(Command::Delete { keys });
        }
        self
    }

    /// Commands in execution order
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the batch has no commands
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Precondition checked atomically with a [`Batch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// The key must hold a hash or set
    Exists(String),

    /// The key must not exist
    Absent(String),
}

impl Guard {
    pub fn exists(key: impl Into<String>) -> Self {
        Guard::Exists(key.into())
    }

    pub fn absent(key: impl Into<String>) -> Self {
        Guard::Absent(key.into())
    }

    /// The guarded key
    pub fn key(&self) -> &str {
        match self {
            Guard::Exists(key) | Guard::Absent(key) => key,
        }
    }

    /// Whether the guard holds given the key's presence
    pub fn holds(&self, present: bool) -> bool {
        match self {
            Guard::Exists(_) => present,
            Guard::Absent(_) => !present,
        }
    }
}

/// Storage contract consumed by the models
///
/// Implementations are shared across request handlers, so they must be
/// cheap to call concurrently.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads every field of a hash. An absent key yields an empty map.
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// Writes the given fields into a hash, leaving other fields untouched
    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()>;

    /// Adds members to a set
    async fn set_add(&self, key: &str, members: &[String]) -> StoreResult<()>;

    /// Removes members from a set. Removing a non-member is not an error.
    async fn set_remove(&self, key: &str, members: &[String]) -> StoreResult<()>;

    /// Lists the members of a set. An absent key yields an empty list.
    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Applies every command of the batch, or none of them
    async fn execute(&self, batch: Batch) -> StoreResult<()>;

    /// Applies the batch only if `guard` holds at commit time
    ///
    /// The check and the writes form one atomic step. Returns `false`, with
    /// nothing written, when the guard does not hold.
    async fn execute_if(&self, guard: Guard, batch: Batch) -> StoreResult<bool>;

    /// Health check
    async fn ping(&self) -> StoreResult<bool>;
}
