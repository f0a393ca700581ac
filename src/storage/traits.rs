//! Storage traits and error types
//!
//! This module defines the key-value interface the visited ledger is built on,
//! and the errors a backend can report.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unexpected value for key {key}: {found}")]
    UnexpectedValue { key: String, found: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Outcome of `KeyValueStore::claim_if_below`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The marker was written and the counter moved to this value
    Claimed(u64),

    /// The marker already existed
    AlreadyClaimed,

    /// The counter had already reached the limit
    LimitReached,
}

/// A durable key-value store shared by every step of a crawl run
///
/// Steps of one run may execute in different tasks or processes, so every
/// implementation must tolerate concurrent readers and writers. Values are JSON.
///
/// The conditional operations have non-atomic default implementations.
/// `set_if_absent` is built from `get` and `set`. `increment_if_below` checks
/// with `get` and then calls `increment`. Stores with a native counter only
/// need to override `increment`; a concurrent caller can then overshoot a
/// limit by at most the number of callers racing it. Backends that perform
/// the conditional operations atomically override them and report so
/// through `is_atomic`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value, or `None` if the key was never written
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Writes a value, replacing any previous one
    async fn set(&self, key: &str, value: Value) -> StorageResult<()>;

    /// Adds one to the integer at `key` and returns the new value
    ///
    /// An absent key counts as 0. The default is a plain read-modify-write
    /// and can lose updates under contention.
    async fn increment(&self, key: &str) -> StorageResult<u64> {
        let next = match self.get(key).await? {
            Some(value) => as_counter(key, &value)? + 1,
            None => 1,
        };
        self.set(key, Value::from(next)).await?;
        Ok(next)
    }

    /// Writes `value` only if `key` is absent
    ///
    /// Returns `true` if this call wrote the value.
    async fn set_if_absent(&self, key: &str, value: Value) -> StorageResult<bool> {
        if self.get(key).await?.is_some() {
            return Ok(false);
        }
        self.set(key, value).await?;
        Ok(true)
    }

    /// Increments the integer at `key` if it is below `limit`
    ///
    /// An absent key counts as 0. Returns the new value, or `None` when the
    /// counter had already reached `limit`.
    async fn increment_if_below(&self, key: &str, limit: u64) -> StorageResult<Option<u64>> {
        let current = match self.get(key).await? {
            Some(value) => as_counter(key, &value)?,
            None => 0,
        };
        if current >= limit {
            return Ok(None);
        }
        Ok(Some(self.increment(key).await?))
    }

    /// Writes `true` at `marker_key` and increments `counter_key` below `limit`
    ///
    /// Neither write happens unless both can. The default claims with
    /// `set_if_absent` and then reserves with `increment_if_below`, so a
    /// claim that loses the reservation leaves its marker behind; atomic
    /// backends override it to check both keys before writing either.
    async fn claim_if_below(
        &self,
        marker_key: &str,
        counter_key: &str,
        limit: u64,
    ) -> StorageResult<ClaimOutcome> {
        if !self.set_if_absent(marker_key, Value::Bool(true)).await? {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }
        Ok(match self.increment_if_below(counter_key, limit).await? {
            Some(count) => ClaimOutcome::Claimed(count),
            None => ClaimOutcome::LimitReached,
        })
    }

    /// Deletes `key`, returning whether it existed
    async fn remove(&self, key: &str) -> StorageResult<bool> {
        Err(StorageError::Unavailable(format!(
            "store cannot delete keys (key {})",
            key
        )))
    }

    /// Deletes every key starting with `prefix`, returning how many went
    async fn remove_prefix(&self, prefix: &str) -> StorageResult<usize> {
        Err(StorageError::Unavailable(format!(
            "store cannot enumerate keys (prefix {})",
            prefix
        )))
    }

    /// Whether the conditional operations are atomic
    fn is_atomic(&self) -> bool {
        false
    }
}

/// Interprets a stored value as a counter
pub(crate) fn as_counter(key: &str, value: &Value) -> StorageResult<u64> {
    value.as_u64().ok_or_else(|| StorageError::UnexpectedValue {
        key: key.to_string(),
        found: value.to_string(),
    })
}
