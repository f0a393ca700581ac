//! Shared fixtures for integration tests

use async_trait::async_trait;
use chrono::Utc;
use ripple_crawl::archive::{ArchiveError, ArchivedFile, FileArchiver};
use ripple_crawl::crawler::{CrawlStep, HtmlContentExtractor, PageRenderer, RenderedPage};
use ripple_crawl::ledger::{RunId, VisitedLedger};
use ripple_crawl::storage::{ClaimOutcome, KeyValueStore, MemoryStore, StorageResult};
use ripple_crawl::RippleError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// In-memory website keyed by normalized URL
#[derive(Default)]
pub struct StaticSite {
    pages: HashMap<String, String>,
    latency: Option<Duration>,
    renders: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl StaticSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a page whose body is a list of anchors to `links`
    pub fn page(mut self, url: &str, links: &[&str]) -> Self {
        let anchors: String = links
            .iter()
            .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
            .collect();
        let html = format!(
            "<html><head><title>{}</title></head><body>{}</body></html>",
            url, anchors
        );
        self.pages.insert(url.to_string(), html);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// How many times each URL was rendered
    pub fn render_counts(&self) -> HashMap<String, usize> {
        self.renders.lock().unwrap().clone()
    }

    pub fn total_renders(&self) -> usize {
        self.renders.lock().unwrap().values().sum()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRenderer for StaticSite {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RippleError> {
        *self
            .renders
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.pages.get(url.as_str()) {
            Some(html) => Ok(RenderedPage::from_html(url.clone(), 200, html.clone())),
            None => Err(RippleError::Navigation {
                url: url.to_string(),
                message: "HTTP 404".to_string(),
            }),
        }
    }
}

/// Archiver that records requests instead of downloading
#[derive(Default)]
pub struct RecordingArchiver {
    pub archived: Mutex<Vec<String>>,
}

#[async_trait]
impl FileArchiver for RecordingArchiver {
    async fn archive(&self, url: &Url) -> Result<ArchivedFile, ArchiveError> {
        self.archived.lock().unwrap().push(url.to_string());
        Ok(ArchivedFile {
            source_url: url.to_string(),
            location: format!("memory://{}", url.path()),
            content_type: None,
            size_bytes: 0,
            sha256: String::new(),
            archived_at: Utc::now(),
        })
    }
}

/// Store with atomic get, set and increment but no conditional operations
///
/// Reads yield before returning, which opens a window between a check and
/// the write that follows it.
#[derive(Default)]
pub struct NonAtomicStore {
    entries: Mutex<HashMap<String, Value>>,
}

#[async_trait]
impl KeyValueStore for NonAtomicStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let value = self.entries.lock().unwrap().get(key).cloned();
        tokio::task::yield_now().await;
        Ok(value)
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn increment(&self, key: &str) -> StorageResult<u64> {
        let mut entries = self.entries.lock().unwrap();
        let next = entries.get(key).and_then(Value::as_u64).unwrap_or(0) + 1;
        entries.insert(key.to_string(), Value::from(next));
        Ok(next)
    }
}

/// Atomic store that hands control back to the runtime before every call,
/// so concurrent steps interleave between their ledger operations
#[derive(Default)]
pub struct YieldingStore {
    inner: Arc<MemoryStore>,
}

impl YieldingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl KeyValueStore for YieldingStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        tokio::task::yield_now().await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        tokio::task::yield_now().await;
        self.inner.set(key, value).await
    }

    async fn increment(&self, key: &str) -> StorageResult<u64> {
        tokio::task::yield_now().await;
        self.inner.increment(key).await
    }

    async fn set_if_absent(&self, key: &str, value: Value) -> StorageResult<bool> {
        tokio::task::yield_now().await;
        self.inner.set_if_absent(key, value).await
    }

    async fn increment_if_below(&self, key: &str, limit: u64) -> StorageResult<Option<u64>> {
        tokio::task::yield_now().await;
        self.inner.increment_if_below(key, limit).await
    }

    async fn claim_if_below(
        &self,
        marker_key: &str,
        counter_key: &str,
        limit: u64,
    ) -> StorageResult<ClaimOutcome> {
        tokio::task::yield_now().await;
        self.inner.claim_if_below(marker_key, counter_key, limit).await
    }

    fn is_atomic(&self) -> bool {
        true
    }
}

/// Builds a step over `store` rendering pages from `site`
pub fn step_over(store: Arc<dyn KeyValueStore>, site: Arc<StaticSite>, run: &str) -> CrawlStep {
    let ledger = VisitedLedger::new(store, RunId::new(run));
    CrawlStep::new(ledger, site, Arc::new(HtmlContentExtractor::new()))
}
