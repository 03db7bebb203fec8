/// Redis-backed store
///
/// Wraps `redis::aio::ConnectionManager` and implements [`KeyValueStore`]:
/// - Automatic reconnection (handled by the connection manager)
/// - Every command bounded by a configurable timeout
/// - Batches executed as a `MULTI`/`EXEC` pipeline
/// - Guarded batches executed as a single Lua script
/// - Configuration from environment variables
///
/// # Example
///
/// ```no_run
/// use crewboard_shared::store::{KeyValueStore, RedisConfig, RedisStore, StorageError};
///
/// # async fn example() -> Result<(), StorageError> {
/// let config = RedisConfig::from_env()?;
/// let store = RedisStore::new(config).await?;
///
/// let healthy = store.ping().await?;
/// println!("Redis healthy: {}", healthy);
/// # Ok(())
/// # }
/// ```

use super::{Batch, Command, Guard, KeyValueStore, StorageError, StoreResult};
use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client, RedisError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Checks `KEYS[1]` against `ARGV[1]` ("1" = must exist, "0" = must be
/// absent), then replays the encoded commands. Each command is encoded as
/// `op, key count, arg count, args...` in ARGV with its keys appended to KEYS.
const GUARDED_BATCH_SCRIPT: &str = r#"
local present = redis.call('EXISTS', KEYS[1]) == 1
if present ~= (ARGV[1] == '1') then
  return 0
end
local a, k = 2, 2
while a <= #ARGV do
  local op, nkeys, nargs = ARGV[a], tonumber(ARGV[a + 1]), tonumber(ARGV[a + 2])
  local call = { op }
  for i = 0, nkeys - 1 do
    call[#call + 1] = KEYS[k + i]
  end
  for i = 1, nargs do
    call[#call + 1] = ARGV[a + 2 + i]
  end
  redis.call(unpack(call))
  a, k = a + 3 + nargs, k + nkeys
end
return 1
"#;

/// Encodes a guarded batch as a script invocation
fn guarded_invocation<'a>(
    script: &'a ::redis::Script,
    guard: &Guard,
    batch: &Batch,
) -> ::redis::ScriptInvocation<'a> {
    let mut invocation = script.prepare_invoke();
    invocation
        .key(guard.key())
        .arg(if matches!(guard, Guard::Exists(_)) { "1" } else { "0" });

    for command in batch.commands() {
        match command {
            Command::HashSet { key, fields } => {
                invocation.key(key).arg("HSET").arg(1).arg(fields.len() * 2);
                for (field, value) in fields {
                    invocation.arg(field).arg(value);
                }
            }
            Command::SetAdd { key, members } => {
                invocation.key(key).arg("SADD").arg(1).arg(members.len());
                for member in members {
                    invocation.arg(member);
                }
            }
            Command::SetRemove { key, members } => {
                invocation.key(key).arg("SREM").arg(1).arg(members.len());
                for member in members {
                    invocation.arg(member);
                }
            }
            Command::Delete { keys } => {
                invocation.arg("DEL").arg(keys.len()).arg(0);
                for key in keys {
                    invocation.key(key);
                }
            }
        }
    }
    invocation
}

impl From<RedisError> for StorageError {
    fn from(err: RedisError) -> Self {
        match err.kind() {
            ::redis::ErrorKind::IoError => StorageError::Connection(format!("IO error: {}", err)),
            ::redis::ErrorKind::ResponseError => {
                StorageError::Command(format!("Response error: {}", err))
            }
            _ => StorageError::Command(err.to_string()),
        }
    }
}

/// Redis configuration
///
/// Can be loaded from environment variables or constructed manually.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    ///
    /// Format: redis://[username:password@]host:port[/db]
    pub url: String,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Command timeout in seconds
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    /// Creates a new Redis configuration from environment variables
    ///
    /// # Environment Variables
    ///
    /// - `REDIS_URL`: Redis connection URL (required)
    /// - `REDIS_CONNECTION_TIMEOUT_SECS`: Connection timeout (default: 5)
    /// - `REDIS_COMMAND_TIMEOUT_SECS`: Command timeout (default: 10)
    pub fn from_env() -> Result<Self, StorageError> {
        dotenvy::dotenv().ok();

        let url = env::var("REDIS_URL").map_err(|_| {
            StorageError::Config("REDIS_URL environment variable is required".to_string())
        })?;

        let connection_timeout_secs = env::var("REDIS_CONNECTION_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let command_timeout_secs = env::var("REDIS_COMMAND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Ok(Self {
            url,
            connection_timeout_secs,
            command_timeout_secs,
        })
    }

    /// Configuration with default timeouts for the given URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection_timeout_secs: 5,
            command_timeout_secs: 10,
        }
    }
}

/// Redis store with connection management
///
/// Cloning is cheap; clones share the underlying connection manager.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl RedisStore {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the connection cannot be
    /// established within the connection timeout.
    pub async fn new(config: RedisConfig) -> Result<Self, StorageError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| StorageError::Config(format!("Invalid Redis URL: {}", e)))?;

        let manager = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_secs),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| StorageError::Connection("Timed out connecting to Redis".to_string()))?
        .map_err(|e| StorageError::Connection(format!("Failed to connect to Redis: {}", e)))?;

        tracing::info!(
            "Redis store connected to {}",
            sanitize_url(&config.url)
        );

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    /// Gets the Redis configuration
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Runs a command future under the configured command timeout
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        tokio::time::timeout(Duration::from_secs(self.config.command_timeout_secs), fut)
            .await
            .map_err(|_| StorageError::Command(format!("{} timed out", op)))?
            .map_err(StorageError::from)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.manager.clone();
        self.bounded("HGETALL", conn.hgetall(key)).await
    }

    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        self.bounded("HSET", conn.hset_multiple(key, fields)).await
    }

    async fn set_add(&self, key: &str, members: &[String]) -> StoreResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        self.bounded("SADD", conn.sadd(key, members)).await
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> StoreResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        self.bounded("SREM", conn.srem(key, members)).await
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.manager.clone();
        self.bounded("SMEMBERS", conn.smembers(key)).await
    }

    async fn execute(&self, batch: Batch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut pipe = ::redis::pipe();
        pipe.atomic();

        for command in batch.commands() {
            match command {
                Command::HashSet { key, fields } => {
                    pipe.hset_multiple(key, fields).ignore();
                }
                Command::SetAdd { key, members } => {
                    pipe.sadd(key, members).ignore();
                }
                Command::SetRemove { key, members } => {
                    pipe.srem(key, members).ignore();
                }
                Command::Delete { keys } => {
                    pipe.del(keys).ignore();
                }
            }
        }

        let mut conn = self.manager.clone();
        self.bounded("MULTI/EXEC", pipe.query_async::<_, ()>(&mut conn))
            .await?;

        tracing::debug!(commands = batch.len(), "Executed atomic batch");
        Ok(())
    }

    async fn execute_if(&self, guard: Guard, batch: Batch) -> StoreResult<bool> {
        let script = ::redis::Script::new(GUARDED_BATCH_SCRIPT);
        let invocation = guarded_invocation(&script, &guard, &batch);

        let mut conn = self.manager.clone();
        let applied: i64 = self
            .bounded("EVALSHA", invocation.invoke_async(&mut conn))
            .await?;

        tracing::debug!(
            guard = guard.key(),
            applied = applied == 1,
            commands = batch.len(),
            "Executed guarded batch"
        );
        Ok(applied == 1)
    }

    async fn ping(&self) -> StoreResult<bool> {
        let mut conn = self.manager.clone();
        let pong: String = self
            .bounded("PING", ::redis::cmd("PING").query_async(&mut conn))
            .await?;

        if pong == "PONG" {
            tracing::debug!("Redis health check: PONG received");
            Ok(true)
        } else {
            tracing::warn!("Redis health check: unexpected response: {}", pong);
            Ok(false)
        }
    }
}

/// Sanitizes a Redis URL by removing credentials
///
/// Replaces username:password with ***:*** for logging.
fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end + 3];
            let host = &url[at_pos + 1..];
            return format!("{}***:***@{}", scheme, host);
        }
    }
    url.to_string()
}
