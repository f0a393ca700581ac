//! SQLite storage implementation
//!
//! This module provides a SQLite-backed `KeyValueStore`. The database file can
//! be shared by several crawler processes: it runs in WAL mode with a busy
//! timeout, and the conditional operations run inside IMMEDIATE transactions.
//! Statements run on tokio's blocking pool, since waiting on another
//! process's lock can take up to the busy timeout.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    as_counter, ClaimOutcome, KeyValueStore, StorageError, StorageResult,
};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How long a writer waits for a lock held by another process
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite storage backend
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Deletes every entry whose key starts with `prefix`
    ///
    /// Blocking counterpart of `remove_prefix`. Returns the number of
    /// deleted rows.
    pub fn purge_prefix(&self, prefix: &str) -> StorageResult<usize> {
        let conn = lock(&self.conn)?;
        Self::delete_prefix(&conn, prefix)
    }

    /// Counts entries whose key starts with `prefix`
    pub fn count_prefix(&self, prefix: &str) -> StorageResult<u64> {
        let conn = lock(&self.conn)?;
        let pattern = format!("{}%", escape_like(prefix));
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kv_entries WHERE key LIKE ?1 ESCAPE '\\'",
            params![pattern],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Runs `op` against the connection on the blocking pool
    async fn blocking<T, F>(&self, op: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&conn)?;
            op(&mut *guard)
        })
        .await
        .map_err(|e| StorageError::Unavailable(format!("sqlite task failed: {}", e)))?
    }

    fn read(conn: &Connection, key: &str) -> StorageResult<Option<Value>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|text| serde_json::from_str(&text).map_err(StorageError::from))
            .transpose()
    }

    fn write(conn: &Connection, key: &str, value: &Value) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, serde_json::to_string(value)?, now],
        )?;
        Ok(())
    }

    fn insert_if_absent(conn: &Connection, key: &str, value: &Value) -> StorageResult<bool> {
        let now = Utc::now().to_rfc3339();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, serde_json::to_string(value)?, now],
        )?;
        Ok(inserted == 1)
    }

    fn counter(conn: &Connection, key: &str) -> StorageResult<u64> {
        match Self::read(conn, key)? {
            Some(value) => as_counter(key, &value),
            None => Ok(0),
        }
    }

    fn increment_below(conn: &mut Connection, key: &str, limit: u64) -> StorageResult<Option<u64>> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = Self::counter(&tx, key)?;
        if current >= limit {
            tx.rollback()?;
            return Ok(None);
        }

        let next = current + 1;
        Self::write(&tx, key, &Value::from(next))?;
        tx.commit()?;
        Ok(Some(next))
    }

    fn claim_below(
        conn: &mut Connection,
        marker_key: &str,
        counter_key: &str,
        limit: u64,
    ) -> StorageResult<ClaimOutcome> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if Self::read(&tx, marker_key)?.is_some() {
            tx.rollback()?;
            return Ok(ClaimOutcome::AlreadyClaimed);
        }
        let current = Self::counter(&tx, counter_key)?;
        if current >= limit {
            tx.rollback()?;
            return Ok(ClaimOutcome::LimitReached);
        }

        let next = current + 1;
        Self::write(&tx, marker_key, &Value::Bool(true))?;
        Self::write(&tx, counter_key, &Value::from(next))?;
        tx.commit()?;
        Ok(ClaimOutcome::Claimed(next))
    }

    fn delete_prefix(conn: &Connection, prefix: &str) -> StorageResult<usize> {
        let pattern = format!("{}%", escape_like(prefix));
        let deleted = conn.execute(
            "DELETE FROM kv_entries WHERE key LIKE ?1 ESCAPE '\\'",
            params![pattern],
        )?;
        Ok(deleted)
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let key = key.to_string();
        self.blocking(move |conn| Self::read(conn, &key)).await
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let key = key.to_string();
        self.blocking(move |conn| Self::write(conn, &key, &value)).await
    }

    async fn increment(&self, key: &str) -> StorageResult<u64> {
        let key = key.to_string();
        self.blocking(move |conn| {
            Self::increment_below(conn, &key, u64::MAX)?.ok_or_else(|| {
                StorageError::UnexpectedValue {
                    key: key.clone(),
                    found: u64::MAX.to_string(),
                }
            })
        })
        .await
    }

    async fn set_if_absent(&self, key: &str, value: Value) -> StorageResult<bool> {
        let key = key.to_string();
        self.blocking(move |conn| Self::insert_if_absent(conn, &key, &value))
            .await
    }

    async fn increment_if_below(&self, key: &str, limit: u64) -> StorageResult<Option<u64>> {
        let key = key.to_string();
        self.blocking(move |conn| Self::increment_below(conn, &key, limit))
            .await
    }

    async fn claim_if_below(
        &self,
        marker_key: &str,
        counter_key: &str,
        limit: u64,
    ) -> StorageResult<ClaimOutcome> {
        let marker_key = marker_key.to_string();
        let counter_key = counter_key.to_string();
        self.blocking(move |conn| Self::claim_below(conn, &marker_key, &counter_key, limit))
            .await
    }

    async fn remove(&self, key: &str) -> StorageResult<bool> {
        let key = key.to_string();
        self.blocking(move |conn| {
            let deleted = conn.execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
            Ok(deleted == 1)
        })
        .await
    }

    async fn remove_prefix(&self, prefix: &str) -> StorageResult<usize> {
        let prefix = prefix.to_string();
        self.blocking(move |conn| Self::delete_prefix(conn, &prefix))
            .await
    }

    fn is_atomic(&self) -> bool {
        true
    }
}

fn lock(conn: &Mutex<Connection>) -> StorageResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| StorageError::Unavailable("sqlite connection lock poisoned".to_string()))
}

/// Escapes LIKE wildcards so a key prefix matches literally
fn escape_like(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
