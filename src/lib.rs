//! Ripple-Crawl: a fan-out web crawler control plane
//!
//! This crate implements a recursive, depth-bounded, deduplicated crawler. Each
//! crawl step handles one URL and hands newly discovered links back to a
//! scheduler as work items. Steps belonging to one run coordinate through a
//! shared key-value store so that no page is expanded twice and the run never
//! exceeds its page budget.

pub mod archive;
pub mod config;
pub mod crawler;
pub mod ledger;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use std::time::Duration;
use thiserror::Error;

/// Main error type for Ripple-Crawl operations
#[derive(Debug, Error)]
pub enum RippleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("{operation} timed out after {elapsed:?} for {url}")]
    Timeout {
        url: String,
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("Content extraction failed for {url}: {message}")]
    Extraction { url: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Archive error: {0}")]
    Archive(#[from] archive::ArchiveError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::StepState,
        to: state::StepState,
    },

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Ripple-Crawl operations
pub type Result<T> = std::result::Result<T, RippleError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlResult, CrawlStep, CrawlWorkItem, StepOutcome, StepParams};
pub use ledger::{RunId, VisitedLedger};
pub use state::StepState;
pub use crate::url::{base_domain, in_scope, normalize_url, Scope};
