use crate::UrlError;
use url::Url;

/// Normalizes a URL for identity comparison within a crawl run
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed or if it has no host
/// 2. Lowercase the host
/// 3. Remove the fragment (everything after #)
/// 4. Normalize the path:
///    - Empty path becomes /
///    - Trailing slashes are removed (the root stays /)
/// 5. Keep the query string verbatim, so `?a=1` and `?a=2` stay distinct pages
///
/// Normalization is idempotent: normalizing an already normalized URL yields
/// the same URL.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use ripple_crawl::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.COM/page/#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    // Special schemes already come back lowercased from the parser; opaque hosts do not
    let host = url.host_str().ok_or(UrlError::MissingDomain)?;
    if host.is_empty() {
        return Err(UrlError::MissingDomain);
    }
    let lowered = host.to_lowercase();
    if lowered != host {
        url.set_host(Some(&lowered))
            .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
    }

    url.set_fragment(None);

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    Ok(url)
}

/// Normalizes a URL and returns it as an owned string
///
/// Convenience wrapper used for ledger keys and link sets.
pub fn normalize(url_str: &str) -> Result<String, UrlError> {
    normalize_url(url_str).map(String::from)
}

/// Strips trailing slashes, keeping the root path
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
