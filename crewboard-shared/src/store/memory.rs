/// In-process store
///
/// Implements [`KeyValueStore`] over plain maps behind a mutex. Used by the
/// test suites and for running the API without Redis.
///
/// Batches are staged against a copy of the data and committed only when
/// every command succeeds, which gives the same all-or-nothing behavior as a
/// Redis `MULTI`/`EXEC`.
///
/// Failures can be injected to exercise error paths:
/// - [`MemoryStore::fail_reads`]: every read returns a [`StorageError`]
/// - [`MemoryStore::fail_batch_at`]: the next batch fails at the given command

use super::{Batch, Command, Guard, KeyValueStore, StorageError, StoreResult};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
struct Data {
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, BTreeSet<String>>,
}

impl Data {
    fn contains(&self, key: &str) -> bool {
        self.hashes.contains_key(key) || self.sets.contains_key(key)
    }

    fn wrong_type(key: &str) -> StorageError {
        StorageError::Command(format!(
            "WRONGTYPE Operation against a key holding the wrong kind of value: {}",
            key
        ))
    }

    fn apply(&mut self, command: &Command) -> StoreResult<()> {
        match command {
            Command::HashSet { key, fields } => {
                if self.sets.contains_key(key) {
                    return Err(Self::wrong_type(key));
                }
                let record = self.hashes.entry(key.clone()).or_default();
                for (field, value) in fields {
                    record.insert(field.clone(), value.clone());
                }
            }
            Command::SetAdd { key, members } => {
                if self.hashes.contains_key(key) {
                    return Err(Self::wrong_type(key));
                }
                self.sets
                    .entry(key.clone())
                    .or_default()
                    .extend(members.iter().cloned());
            }
            Command::SetRemove { key, members } => {
                if self.hashes.contains_key(key) {
                    return Err(Self::wrong_type(key));
                }
                if let Some(set) = self.sets.get_mut(key) {
                    for member in members {
                        set.remove(member);
                    }
                    // Redis drops empty sets
                    if set.is_empty() {
                        self.sets.remove(key);
                    }
                }
            }
            Command::Delete { keys } => {
                for key in keys {
                    self.hashes.remove(key);
                    self.sets.remove(key);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct State {
    data: Data,
    fail_reads: bool,
    fail_batch_at: Option<usize>,
}

/// Mutex-guarded in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent read fail (or succeed again)
    pub fn fail_reads(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_reads = fail;
        }
    }

    /// Makes the next batch fail when it reaches command `index`
    ///
    /// Commands before `index` are staged but discarded with the rest of the
    /// batch. The injection is consumed by that batch.
    pub fn fail_batch_at(&self, index: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_batch_at = Some(index);
        }
    }

    /// Number of keys currently stored
    pub fn key_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.data.hashes.len() + state.data.sets.len())
            .unwrap_or(0)
    }

    /// Whether any hash or set is stored under `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.state
            .lock()
            .map(|state| state.data.contains(key))
            .unwrap_or(false)
    }

    /// Stages the batch on a copy and swaps it in if every command applies
    fn commit(state: &mut State, batch: &Batch) -> StoreResult<()> {
        let fail_at = state.fail_batch_at.take();

        let mut staged = state.data.clone();
        for (index, command) in batch.commands().iter().enumerate() {
            if fail_at == Some(index) {
                return Err(StorageError::Command(format!(
                    "injected failure at command {}",
                    index
                )));
            }
            staged.apply(command)?;
        }

        state.data = staged;
        Ok(())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StorageError::Connection("memory store lock poisoned".to_string()))
    }

    fn lock_for_read(&self) -> StoreResult<MutexGuard<'_, State>> {
        let state = self.lock()?;
        if state.fail_reads {
            return Err(StorageError::Connection(
                "injected read failure".to_string(),
            ));
        }
        Ok(state)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let state = self.lock_for_read()?;
        if state.data.sets.contains_key(key) {
            return Err(Data::wrong_type(key));
        }
        Ok(state.data.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn hash_set(&self, key: &str, fields: &[(String, String)]) -> StoreResult<()> {
        self.execute(Batch::new().hash_set(key, fields.to_vec())).await
    }

    async fn set_add(&self, key: &str, members: &[String]) -> StoreResult<()> {
        self.execute(Batch::new().set_add(key, members.to_vec())).await
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> StoreResult<()> {
        self.execute(Batch::new().set_remove(key, members.to_vec()))
            .await
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let state = self.lock_for_read()?;
        if state.data.hashes.contains_key(key) {
            return Err(Data::wrong_type(key));
        }
        Ok(state
            .data
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn execute(&self, batch: Batch) -> StoreResult<()> {
        let mut state = self.lock()?;
        Self::commit(&mut state, &batch)
    }

    async fn execute_if(&self, guard: Guard, batch: Batch) -> StoreResult<bool> {
        let mut state = self.lock()?;
        if !guard.holds(state.data.contains(guard.key())) {
            return Ok(false);
        }
        Self::commit(&mut state, &batch)?;
        Ok(true)
    }

    async fn ping(&self) -> StoreResult<bool> {
        let state = self.lock()?;
        Ok(!state.fail_reads)
    }
}
