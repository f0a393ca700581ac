//! File sink for non-HTML resources
//!
//! Links that point at downloadable files (documents, spreadsheets,
//! presentations, archives, images) are never crawled. When attachments are
//! enabled they are handed to a `FileArchiver` instead.

mod local;

pub use local::LocalArchiver;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default size limit for archived files (50 MiB)
pub const DEFAULT_MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

/// Path suffixes that mark a URL as a file rather than a page
pub const FILE_EXTENSIONS: &[&str] = &[
    // Documents
    ".pdf", ".doc", ".docx", ".odt", ".rtf", ".txt", ".epub",
    // Spreadsheets
    ".xls", ".xlsx", ".ods", ".csv", ".tsv",
    // Presentations
    ".ppt", ".pptx", ".odp",
    // Archives
    ".zip", ".tar", ".gz", ".tgz", ".bz2", ".7z", ".rar",
    // Images
    ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".bmp", ".tif", ".tiff", ".ico",
];

/// Returns true if the URL's path ends with a known file extension
///
/// This looks at the path only, so query strings and fragments do not
/// affect the result. It never contacts the server.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ripple_crawl::archive::is_file_url;
///
/// assert!(is_file_url(&Url::parse("https://example.com/report.PDF?v=2").unwrap()));
/// assert!(!is_file_url(&Url::parse("https://example.com/pdf").unwrap()));
/// ```
pub fn is_file_url(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    FILE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Errors that can occur while archiving a file
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to download {url}: {message}")]
    Download { url: String, message: String },

    #[error("Failed to store {url}: {message}")]
    Store { url: String, message: String },
}

/// Reference to an archived file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedFile {
    /// URL the file was downloaded from
    pub source_url: String,

    /// Where the archiver put it (a path or an object key)
    pub location: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    pub size_bytes: u64,

    /// Hex-encoded SHA-256 of the content
    pub sha256: String,

    pub archived_at: DateTime<Utc>,
}

/// Capability that downloads a file and stores it somewhere durable
#[async_trait]
pub trait FileArchiver: Send + Sync {
    async fn archive(&self, url: &Url) -> Result<ArchivedFile, ArchiveError>;
}
