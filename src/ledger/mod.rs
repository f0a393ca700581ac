//! Visited ledger for crawl runs
//!
//! The ledger is the only shared state between the steps of a run. It records
//! which normalized URLs have been claimed, how many pages the run has
//! fetched, and the base domain fixed by the seed. All of it lives in a
//! `KeyValueStore` under keys namespaced by the run id.

mod keys;
mod run;

pub use keys::{base_domain_key, page_count_key, sanitize_key, visited_key, visited_prefix};
pub use run::{CrawlRun, RunId, RUN_ID_ENV};

use crate::storage::{ClaimOutcome, KeyValueStore, StorageError, StorageResult};
use serde_json::Value;
use std::sync::Arc;

/// Run-scoped view over the shared key-value store
#[derive(Clone)]
pub struct VisitedLedger {
    store: Arc<dyn KeyValueStore>,
    run_id: RunId,
}

impl VisitedLedger {
    pub fn new(store: Arc<dyn KeyValueStore>, run_id: RunId) -> Self {
        Self { store, run_id }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Whether the claim and budget operations of the store are atomic
    pub fn is_atomic(&self) -> bool {
        self.store.is_atomic()
    }

    /// Returns the base domain persisted by the seed step, if any
    pub async fn base_domain(&self) -> StorageResult<Option<String>> {
        let key = base_domain_key(self.run_id.as_str());
        match self.store.get(&key).await? {
            None => Ok(None),
            Some(Value::String(domain)) => Ok(Some(domain)),
            Some(other) => Err(StorageError::UnexpectedValue {
                key,
                found: other.to_string(),
            }),
        }
    }

    pub async fn set_base_domain(&self, domain: &str) -> StorageResult<()> {
        let key = base_domain_key(self.run_id.as_str());
        self.store.set(&key, Value::from(domain)).await
    }

    /// Whether `normalized_url` has been claimed by some step of this run
    pub async fn is_visited(&self, normalized_url: &str) -> StorageResult<bool> {
        let key = visited_key(self.run_id.as_str(), normalized_url);
        Ok(self.store.get(&key).await?.is_some())
    }

    /// Claims `normalized_url` for the calling step
    ///
    /// Returns `true` only for the call that made the claim; repeated calls
    /// leave the entry unchanged and return `false`.
    pub async fn mark_visited(&self, normalized_url: &str) -> StorageResult<bool> {
        let key = visited_key(self.run_id.as_str(), normalized_url);
        let claimed = self.store.set_if_absent(&key, Value::Bool(true)).await?;
        tracing::trace!("Claim of {} by run {}: {}", normalized_url, self.run_id, claimed);
        Ok(claimed)
    }

    /// Number of pages claimed so far (0 before the first claim)
    pub async fn page_count(&self) -> StorageResult<u64> {
        let key = page_count_key(self.run_id.as_str());
        match self.store.get(&key).await? {
            None => Ok(0),
            Some(value) => value.as_u64().ok_or(StorageError::UnexpectedValue {
                key,
                found: value.to_string(),
            }),
        }
    }

    /// Unconditionally adds one page to the counter, returning the new count
    pub async fn increment_page_count(&self) -> StorageResult<u64> {
        let key = page_count_key(self.run_id.as_str());
        self.store.increment(&key).await
    }

    /// Adds one page to the counter if the run is still below `max_pages`
    ///
    /// Returns the new count, or `None` when the budget is exhausted.
    pub async fn reserve_page(&self, max_pages: u64) -> StorageResult<Option<u64>> {
        let key = page_count_key(self.run_id.as_str());
        self.store.increment_if_below(&key, max_pages).await
    }

    /// Claims `normalized_url` and reserves a page for it in one operation
    ///
    /// On an atomic store nothing is written unless both succeed, so the
    /// number of claimed URLs never exceeds `max_pages`.
    pub async fn claim(&self, normalized_url: &str, max_pages: u64) -> StorageResult<ClaimOutcome> {
        let marker = visited_key(self.run_id.as_str(), normalized_url);
        let counter = page_count_key(self.run_id.as_str());
        let outcome = self.store.claim_if_below(&marker, &counter, max_pages).await?;
        tracing::trace!("Claim of {} by run {}: {:?}", normalized_url, self.run_id, outcome);
        Ok(outcome)
    }

    /// Deletes every entry this run wrote, returning how many were removed
    ///
    /// Needs a store that can delete keys. Entries of other runs are left
    /// alone, including runs whose id extends this one.
    pub async fn purge(&self) -> StorageResult<usize> {
        let run = self.run_id.as_str();
        let mut removed = self.store.remove_prefix(&visited_prefix(run)).await?;
        for key in [page_count_key(run), base_domain_key(run)] {
            if self.store.remove(&key).await? {
                removed += 1;
            }
        }
        tracing::debug!("Purged {} entries of run {}", removed, self.run_id);
        Ok(removed)
    }

    /// Snapshot of the run identity, once the seed has fixed the base domain
    pub async fn run(&self) -> StorageResult<Option<CrawlRun>> {
        Ok(self.base_domain().await?.map(|base_domain| CrawlRun {
            run_id: self.run_id.clone(),
            base_domain,
        }))
    }
}

impl std::fmt::Debug for VisitedLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisitedLedger")
            .field("run_id", &self.run_id)
            .field("atomic", &self.store.is_atomic())
            .finish()
    }
}
