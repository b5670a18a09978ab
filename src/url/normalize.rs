use url::Url;

/// Canonicalizes a URL for deduplication and comparison
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Remove fragment (everything after #)
/// 3. Remove the query string
/// 4. Collapse trailing slashes on any non-root path
///
/// Two URLs differing only by fragment, query or trailing slash normalize to
/// the same string. The function is idempotent and never panics.
///
/// # Returns
///
/// * `Some(String)` - The canonical URL
/// * `None` - The input could not be parsed
///
/// # Examples
///
/// ```
/// use docs_md_crawler::url::normalize_url;
///
/// assert_eq!(
///     normalize_url("https://example.com/docs/intro/#section").as_deref(),
///     Some("https://example.com/docs/intro")
/// );
/// assert_eq!(normalize_url("not a url"), None);
/// ```
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    url.set_fragment(None);
    url.set_query(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let collapsed = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        url.set_path(&collapsed);
    }

    Some(url.to_string())
}

/// Normalizes a configured or inferred root path
///
/// Ensures a leading slash and strips trailing slashes; empty input is `/`.
pub fn normalize_root_path(raw: &str) -> String {
    let mut root = raw.trim().to_string();
    if !root.starts_with('/') {
        root.insert(0, '/');
    }
    if root.len() > 1 {
        let trimmed = root.trim_end_matches('/');
        root = if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        };
    }
    root
}

/// Splits a URL path into its non-empty segments
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Returns true if `path` equals `root` or lies beneath it
pub fn path_starts_with_root(path: &str, root: &str) -> bool {
    if root == "/" {
        return true;
    }
    path == root || path.starts_with(&format!("{}/", root))
}
