//! URL handling module for Ripple-Crawl
//!
//! This module provides URL normalization, base-domain extraction, wildcard
//! matching, and the scope predicate that decides which links a crawl follows.

mod domain;
mod matcher;
mod normalize;

use ::url::Url;

// Re-export main functions
pub use domain::{base_domain, in_scope};
pub use matcher::matches_wildcard;
pub use normalize::{normalize, normalize_url};

/// The set of links a crawl run is allowed to follow
///
/// A link is in scope when it shares the run's base domain, when external
/// links are allowed outright, or when its host matches one of the explicitly
/// allowed domain patterns (`example.org` or `*.example.org`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    base_domain: String,
    include_external: bool,
    allowed_domains: Vec<String>,
}

impl Scope {
    /// Creates a scope rooted at `base_domain`
    pub fn new(base_domain: impl Into<String>, include_external: bool) -> Self {
        Self {
            base_domain: base_domain.into().to_lowercase(),
            include_external,
            allowed_domains: Vec::new(),
        }
    }

    /// Adds explicitly allowed external domain patterns
    pub fn with_allowed_domains<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_domains
            .extend(patterns.into_iter().map(|p| p.as_ref().to_lowercase()));
        self
    }

    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    pub fn include_external(&self) -> bool {
        self.include_external
    }

    /// Returns true if the link should be followed in this run
    pub fn contains(&self, link: &Url) -> bool {
        if in_scope(link, &self.base_domain, self.include_external) {
            return true;
        }

        match base_domain(link) {
            Ok(domain) => self
                .allowed_domains
                .iter()
                .any(|pattern| matches_wildcard(pattern, &domain)),
            Err(_) => false,
        }
    }
}
