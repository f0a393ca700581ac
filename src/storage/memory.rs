//! In-process key-value store
//!
//! Shares state between the tasks of a single process. Useful for local runs
//! and tests; it is not durable.

use crate::storage::traits::{
    as_counter, ClaimOutcome, KeyValueStore, StorageError, StorageResult,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Mutex-guarded in-memory store with atomic conditional operations
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns all keys starting with `prefix`, sorted
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = match self.lock() {
            Ok(entries) => entries
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        };
        keys.sort();
        keys
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, HashMap<String, Value>>> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn increment(&self, key: &str) -> StorageResult<u64> {
        let mut entries = self.lock()?;
        let next = match entries.get(key) {
            Some(value) => as_counter(key, value)? + 1,
            None => 1,
        };
        entries.insert(key.to_string(), Value::from(next));
        Ok(next)
    }

    async fn set_if_absent(&self, key: &str, value: Value) -> StorageResult<bool> {
        let mut entries = self.lock()?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value);
        Ok(true)
    }

    async fn increment_if_below(&self, key: &str, limit: u64) -> StorageResult<Option<u64>> {
        let mut entries = self.lock()?;
        let current = match entries.get(key) {
            Some(value) => as_counter(key, value)?,
            None => 0,
        };
        if current >= limit {
            return Ok(None);
        }
        entries.insert(key.to_string(), Value::from(current + 1));
        Ok(Some(current + 1))
    }

    async fn claim_if_below(
        &self,
        marker_key: &str,
        counter_key: &str,
        limit: u64,
    ) -> StorageResult<ClaimOutcome> {
        let mut entries = self.lock()?;
        if entries.contains_key(marker_key) {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }
        let current = match entries.get(counter_key) {
            Some(value) => as_counter(counter_key, value)?,
            None => 0,
        };
        if current >= limit {
            return Ok(ClaimOutcome::LimitReached);
        }

        entries.insert(marker_key.to_string(), Value::Bool(true));
        entries.insert(counter_key.to_string(), Value::from(current + 1));
        Ok(ClaimOutcome::Claimed(current + 1))
    }

    async fn remove(&self, key: &str) -> StorageResult<bool> {
        Ok(self.lock()?.remove(key).is_some())
    }

    async fn remove_prefix(&self, prefix: &str) -> StorageResult<usize> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }

    fn is_atomic(&self) -> bool {
        true
    }
}
