//! Crawl step inputs and outputs
//!
//! These types form the wire contract with external schedulers: a scheduler
//! sends `StepParams` as JSON, receives a `StepOutcome`, and turns each
//! `CrawlWorkItem` into the parameters of a follow-up step.

use crate::archive::ArchivedFile;
use crate::state::StepState;
use crate::RippleError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_max_depth() -> u32 {
    2
}

fn default_max_pages() -> u64 {
    50
}

/// Parameters of a single crawl step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepParams {
    #[serde(default)]
    pub url: String,

    /// Deepest level whose pages are fetched; the seed is depth 0
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Page budget for the whole run
    #[serde(default = "default_max_pages")]
    pub max_pages: u64,

    #[serde(default)]
    pub include_external: bool,

    #[serde(default)]
    pub include_attachments: bool,

    #[serde(default)]
    pub depth: u32,

    /// JSON schema selecting structured extraction instead of markdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,

    /// External domain patterns followed even without `include_external`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_domains: Vec<String>,
}

impl StepParams {
    /// Seed-step parameters with every other field at its default
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            include_external: false,
            include_attachments: false,
            depth: 0,
            schema: None,
            allowed_domains: Vec::new(),
        }
    }

    /// Rejects parameters a step cannot run with
    ///
    /// Only the URL's presence and shape are checked here; normalization
    /// errors are reported by the step itself.
    pub fn validate(&self) -> Result<(), RippleError> {
        let url = self.url.trim();
        if url.is_empty() {
            return Err(RippleError::InvalidInput("url is required".to_string()));
        }

        let parsed = ::url::Url::parse(url)
            .map_err(|e| RippleError::InvalidInput(format!("invalid url '{}': {}", url, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RippleError::InvalidInput(format!(
                "url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(RippleError::InvalidInput(format!(
                "url '{}' has no host",
                url
            )));
        }

        Ok(())
    }

    /// Parameters for the step that handles `item`
    ///
    /// Run-wide settings (budgets, attachments, schema, allow-list) carry over
    /// from this step; the URL, depth and external flag come from the item.
    pub fn child(&self, item: &CrawlWorkItem) -> StepParams {
        StepParams {
            url: item.url.clone(),
            depth: item.depth,
            include_external: item.include_external,
            ..self.clone()
        }
    }
}

/// A follow-up step emitted for a discovered link
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CrawlWorkItem {
    pub url: String,
    pub depth: u32,
    pub include_external: bool,
}

/// Why a step ended without fetching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    #[serde(rename = "already visited")]
    AlreadyVisited,

    #[serde(rename = "max_pages limit reached")]
    MaxPagesReached,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyVisited => "already visited",
            Self::MaxPagesReached => "max_pages limit reached",
        }
    }

    /// Terminal step state that corresponds to this reason
    pub fn state(&self) -> StepState {
        match self {
            Self::AlreadyVisited => StepState::SkippedDuplicate,
            Self::MaxPagesReached => StepState::SkippedBudget,
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result record of one crawl step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub success: bool,
    pub url: String,
    pub depth: u32,

    /// Extracted content; null for skipped steps
    #[serde(default)]
    pub content: Value,

    #[serde(default)]
    pub links_found: usize,

    #[serde(default)]
    pub links_queued: usize,

    #[serde(default)]
    pub attachments: Vec<ArchivedFile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<SkipReason>,
}

impl CrawlResult {
    /// A successful step that did not fetch
    pub fn skipped(url: impl Into<String>, depth: u32, reason: SkipReason) -> Self {
        Self {
            success: true,
            url: url.into(),
            depth,
            content: Value::Null,
            links_found: 0,
            links_queued: 0,
            attachments: Vec::new(),
            skipped: Some(true),
            reason: Some(reason),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.unwrap_or(false)
    }
}

/// Everything a step hands back to its scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub result: CrawlResult,
    pub work_items: Vec<CrawlWorkItem>,
    pub state: StepState,
}

impl StepOutcome {
    pub(crate) fn skipped(url: &str, depth: u32, reason: SkipReason) -> Self {
        Self {
            result: CrawlResult::skipped(url, depth, reason),
            work_items: Vec::new(),
            state: reason.state(),
        }
    }
}
