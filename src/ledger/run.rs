//! Crawl run identity

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Environment variable an external scheduler uses to pass the run id
pub const RUN_ID_ENV: &str = "RIPPLE_RUN_ID";

/// Identifier shared by every step of one crawl run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Wraps an externally supplied identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier for a local run
    pub fn generate() -> Self {
        Self(format!("local-{}", Uuid::new_v4()))
    }

    /// Picks the run id for an invocation
    ///
    /// An explicit, non-blank value wins. Otherwise `RIPPLE_RUN_ID` is used
    /// if set, and a new `local-{uuid}` id is generated as a last resort.
    pub fn resolve(explicit: Option<&str>) -> Self {
        let from_env = std::env::var(RUN_ID_ENV).ok();
        Self::resolve_from(explicit, from_env.as_deref())
    }

    fn resolve_from(explicit: Option<&str>, from_env: Option<&str>) -> Self {
        let non_blank = |id: &str| {
            let id = id.trim();
            (!id.is_empty()).then(|| id.to_string())
        };

        explicit
            .and_then(non_blank)
            .or_else(|| from_env.and_then(non_blank))
            .map(Self)
            .unwrap_or_else(Self::generate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id was generated locally rather than supplied
    pub fn is_local(&self) -> bool {
        self.0.starts_with("local-")
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A crawl run: its id and the base domain fixed by its seed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRun {
    pub run_id: RunId,
    pub base_domain: String,
}
