//! Ledger key construction
//!
//! Keys are flattened into a store-safe alphabet so that any backend can hold
//! them, including ones that treat `/` or `.` specially.

/// Separators replaced with `_`, applied in this order
const SEPARATORS: [&str; 9] = ["://", "/", ":", "#", "?", "&", "=", ".", "-"];

/// Flattens a raw key into the store-safe form
///
/// Every separator becomes `_`, runs of `_` collapse into one, and leading or
/// trailing `_` are removed. Distinct raw keys may collide after
/// sanitization (`/a-b` and `/a_b` both become `a_b`).
///
/// # Examples
///
/// ```
/// use ripple_crawl::ledger::sanitize_key;
///
/// assert_eq!(
///     sanitize_key("run-1/visited/https://example.com/a"),
///     "run_1_visited_https_example_com_a"
/// );
/// ```
pub fn sanitize_key(raw: &str) -> String {
    let mut key = raw.to_string();
    for sep in SEPARATORS {
        key = key.replace(sep, "_");
    }

    let mut collapsed = String::with_capacity(key.len());
    let mut previous_underscore = false;
    for c in key.chars() {
        if c == '_' {
            if !previous_underscore {
                collapsed.push(c);
            }
            previous_underscore = true;
        } else {
            collapsed.push(c);
            previous_underscore = false;
        }
    }

    collapsed.trim_matches('_').to_string()
}

/// Key of the visited marker for a normalized URL
pub fn visited_key(run_id: &str, normalized_url: &str) -> String {
    sanitize_key(&format!("{}/visited/{}", run_id, normalized_url))
}

/// Key of the run's page counter
pub fn page_count_key(run_id: &str) -> String {
    sanitize_key(&format!("{}/pageCount", run_id))
}

/// Key of the run's persisted base domain
pub fn base_domain_key(run_id: &str) -> String {
    sanitize_key(&format!("{}/baseDomain", run_id))
}

/// Prefix shared by the visited markers of a run
///
/// Only the visited markers need a prefix; the counter and base domain are
/// single keys. A bare `{run}_` prefix would also cover runs whose id
/// extends this one (`job` and `job-2`).
pub fn visited_prefix(run_id: &str) -> String {
    format!("{}_visited_", sanitize_key(run_id))
}
