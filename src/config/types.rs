use crate::crawler::{StepParams, StepTimeouts};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Ripple-Crawl
///
/// Every section is optional; a missing section takes its defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CrawlerConfig {
    /// Maximum link depth from the seed
    pub max_depth: u32,

    /// Maximum number of pages fetched per run
    pub max_pages: u64,

    /// Follow links to any domain
    pub include_external: bool,

    /// Archive linked files (PDFs, images, spreadsheets)
    pub include_attachments: bool,

    /// External domains followed even when `include-external` is off
    pub allowed_domains: Vec<String>,

    /// Maximum number of steps in flight for local runs
    pub max_concurrency: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 50,
            include_external: false,
            include_attachments: false,
            allowed_domains: Vec::new(),
            max_concurrency: 8,
        }
    }
}

impl CrawlerConfig {
    /// Builds the parameters of the seed step of a run
    pub fn root_params(&self, url: &str) -> StepParams {
        StepParams {
            url: url.to_string(),
            max_depth: self.max_depth,
            max_pages: self.max_pages,
            include_external: self.include_external,
            include_attachments: self.include_attachments,
            depth: 0,
            schema: None,
            allowed_domains: self.allowed_domains.clone(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "RippleCrawl".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/crawler".to_string(),
            contact_email: "crawler@example.com".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn user_agent_string(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Per-operation time limits, in milliseconds
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TimeoutsConfig {
    pub navigation_ms: u64,
    pub extraction_ms: u64,
    pub archive_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            navigation_ms: 30_000,
            extraction_ms: 10_000,
            archive_ms: 60_000,
        }
    }
}

impl TimeoutsConfig {
    pub fn step_timeouts(&self) -> StepTimeouts {
        StepTimeouts {
            navigation: Duration::from_millis(self.navigation_ms),
            extraction: Duration::from_millis(self.extraction_ms),
            archive: Duration::from_millis(self.archive_ms),
        }
    }
}

/// Shared ledger store configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StoreConfig {
    /// Path to the SQLite database file; the in-memory store is used when unset
    pub database_path: Option<PathBuf>,
}

/// Attachment archive configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ArchiveConfig {
    /// Directory archived files are written to
    pub directory: PathBuf,

    /// Largest file that is archived, in bytes
    pub max_file_bytes: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./archive"),
            max_file_bytes: crate::archive::DEFAULT_MAX_FILE_BYTES,
        }
    }
}
