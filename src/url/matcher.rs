/// Checks a host against an allow-list pattern
///
/// `"docs.example.org"` allows exactly that host. `"*.example.org"` allows
/// `example.org` itself and any host below it, however deeply nested. Both
/// sides are expected to be lowercase already; the comparison is exact.
///
/// ```
/// use ripple_crawl::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.org", "example.org"));
/// assert!(matches_wildcard("*.example.org", "a.b.example.org"));
/// assert!(!matches_wildcard("*.example.org", "badexample.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(suffix) if !suffix.is_empty() => {
            candidate == suffix
                || candidate
                    .strip_suffix(suffix)
                    .is_some_and(|prefix| prefix.ends_with('.') && prefix.len() > 1)
        }
        Some(_) => false,
        None => !pattern.is_empty() && candidate == pattern,
    }
}
