//! Run report
//!
//! Collects the outcome of every step a local run executed.

use crate::crawler::{CrawlResult, SkipReason, StepOutcome, StepParams};
use crate::ledger::RunId;
use crate::RippleError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A step that ended in an error
#[derive(Debug, Clone, Serialize)]
pub struct StepFailure {
    pub url: String,
    pub depth: u32,
    pub error: String,
}

/// Everything a local run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Results of fetched and skipped steps, in completion order
    pub results: Vec<CrawlResult>,

    pub failures: Vec<StepFailure>,
}

impl RunReport {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            results: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: StepOutcome) {
        self.results.push(outcome.result);
    }

    pub fn record_failure(&mut self, params: &StepParams, error: &RippleError) {
        self.failures.push(StepFailure {
            url: params.url.clone(),
            depth: params.depth,
            error: error.to_string(),
        });
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Results of steps that fetched their page
    pub fn fetched(&self) -> impl Iterator<Item = &CrawlResult> {
        self.results.iter().filter(|r| !r.is_skipped())
    }

    pub fn pages_fetched(&self) -> usize {
        self.fetched().count()
    }

    pub fn pages_skipped(&self) -> usize {
        self.results.iter().filter(|r| r.is_skipped()).count()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.results
            .iter()
            .filter(|r| r.reason == Some(reason))
            .count()
    }

    /// URLs of fetched pages, sorted
    pub fn fetched_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.fetched().map(|r| r.url.clone()).collect();
        urls.sort();
        urls
    }

    pub fn max_depth_reached(&self) -> Option<u32> {
        self.fetched().map(|r| r.depth).max()
    }

    pub fn attachment_count(&self) -> usize {
        self.results.iter().map(|r| r.attachments.len()).sum()
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }
}
