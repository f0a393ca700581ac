//! Filesystem archiver

use crate::archive::{ArchiveError, ArchivedFile, FileArchiver, DEFAULT_MAX_FILE_BYTES};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use url::Url;

/// Hex digits of the content hash prefixed to archived file names
const HASH_PREFIX_LEN: usize = 12;

/// Downloads files over HTTP and writes them into a local directory
///
/// Files are named `<sha256 prefix>-<original file name>`, so identical
/// content downloaded from the same name lands on the same path. Downloads
/// larger than `max_bytes` are abandoned, either up front from the
/// `Content-Length` header or as soon as the body passes the limit.
#[derive(Debug, Clone)]
pub struct LocalArchiver {
    client: Client,
    directory: PathBuf,
    max_bytes: u64,
}

impl LocalArchiver {
    pub fn new(client: Client, directory: impl Into<PathBuf>) -> Self {
        Self {
            client,
            directory: directory.into(),
            max_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    async fn download(&self, url: &Url) -> Result<(Vec<u8>, Option<String>), ArchiveError> {
        let download_error = |message: String| ArchiveError::Download {
            url: url.to_string(),
            message,
        };

        let mut response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(download_error(format!("HTTP {}", status.as_u16())));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if let Some(length) = response.content_length() {
            if length > self.max_bytes {
                return Err(download_error(format!(
                    "{} bytes exceeds the {} byte limit",
                    length, self.max_bytes
                )));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| download_error(e.to_string()))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(download_error(format!(
                    "body exceeds the {} byte limit",
                    self.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        Ok((body, content_type))
    }
}

#[async_trait]
impl FileArchiver for LocalArchiver {
    async fn archive(&self, url: &Url) -> Result<ArchivedFile, ArchiveError> {
        let (body, content_type) = self.download(url).await?;

        let sha256 = hex::encode(Sha256::digest(&body));
        let file_name = format!("{}-{}", &sha256[..HASH_PREFIX_LEN], file_name_for(url));
        let path = self.directory.join(file_name);

        let store_error = |e: std::io::Error| ArchiveError::Store {
            url: url.to_string(),
            message: format!("{}: {}", path.display(), e),
        };

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(store_error)?;
        tokio::fs::write(&path, &body).await.map_err(store_error)?;

        tracing::debug!("Archived {} ({} bytes) to {}", url, body.len(), path.display());

        Ok(ArchivedFile {
            source_url: url.to_string(),
            location: path.display().to_string(),
            content_type,
            size_bytes: body.len() as u64,
            sha256,
            archived_at: Utc::now(),
        })
    }
}

/// Last path segment of the URL, reduced to a filesystem-safe name
fn file_name_for(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("file");

    let name: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.trim_matches('.').is_empty() {
        "file".to_string()
    } else {
        name
    }
}
