//! Link extraction
//!
//! Turns the anchors of a rendered page into the set of normalized, in-scope
//! URLs a crawl step may follow. Individual bad links are logged and dropped;
//! extraction as a whole never fails.

use crate::crawler::fetcher::RenderedPage;
use crate::url::{normalize_url, Scope};
use std::collections::BTreeSet;
use url::Url;

/// Href schemes that never lead to a crawlable page
const SKIPPED_SCHEMES: [&str; 4] = ["javascript:", "mailto:", "tel:", "data:"];

/// Extracts the followable links of a page
pub fn extract_links(page: &RenderedPage, scope: &Scope) -> BTreeSet<String> {
    extract_links_from_hrefs(page.anchor_hrefs(), &page.url, scope)
}

/// Resolves, filters and normalizes raw `href` values
///
/// Relative hrefs resolve against `page_url`, which must be the page's
/// current URL (after redirects).
pub fn extract_links_from_hrefs<I, S>(hrefs: I, page_url: &Url, scope: &Scope) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    hrefs
        .into_iter()
        .filter_map(|href| resolve_href(href.as_ref(), page_url, scope))
        .collect()
}

/// Resolves one href to a normalized in-scope URL, or `None` to drop it
fn resolve_href(href: &str, page_url: &Url, scope: &Scope) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if SKIPPED_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        return None;
    }

    let absolute = match page_url.join(href) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("Dropping unresolvable link '{}' on {}: {}", href, page_url, e);
            return None;
        }
    };

    if !matches!(absolute.scheme(), "http" | "https") {
        return None;
    }

    if !scope.contains(&absolute) {
        tracing::trace!("Out of scope: {}", absolute);
        return None;
    }

    match normalize_url(absolute.as_str()) {
        Ok(normalized) => Some(normalized.to_string()),
        Err(e) => {
            tracing::debug!("Dropping link {}: {}", absolute, e);
            None
        }
    }
}
