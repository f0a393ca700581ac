use crate::UrlError;
use url::Url;

/// Computes the base domain of a URL
///
/// The base domain is the lowercased host. The port is not part of it, so
/// `example.com:8080` and `example.com` share a scope.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use ripple_crawl::url::base_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(base_domain(&url).unwrap(), "example.com");
///
/// let url = Url::parse("https://sub.example.com/path").unwrap();
/// assert_eq!(base_domain(&url).unwrap(), "sub.example.com");
/// ```
pub fn base_domain(url: &Url) -> Result<String, UrlError> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
        .ok_or(UrlError::MissingDomain)
}

/// Decides whether a link belongs to the crawl
///
/// Returns true iff the link's base domain equals `base_domain`, or
/// `include_external` is set. Links without a host are never in scope.
pub fn in_scope(link: &Url, base_domain: &str, include_external: bool) -> bool {
    if include_external {
        return true;
    }

    match self::base_domain(link) {
        Ok(domain) => domain == base_domain,
        Err(_) => false,
    }
}
