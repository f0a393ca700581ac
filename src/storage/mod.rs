//! Storage module for the shared crawl state
//!
//! This module provides the key-value backends the visited ledger runs on:
//! - `MemoryStore` for single-process runs and tests
//! - `SqliteStore` for durable state shared between processes

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{ClaimOutcome, KeyValueStore, StorageError, StorageResult};

use std::path::Path;
use std::sync::Arc;

/// Opens the store configured for a run
///
/// With a database path the run uses SQLite, otherwise an in-memory store.
pub fn open_store(database_path: Option<&Path>) -> StorageResult<Arc<dyn KeyValueStore>> {
    match database_path {
        Some(path) => {
            tracing::debug!("Opening SQLite ledger at {}", path.display());
            Ok(Arc::new(SqliteStore::new(path)?))
        }
        None => {
            tracing::debug!("Using in-memory ledger");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
