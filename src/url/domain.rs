use url::Url;

/// Extracts the rate-limiting key for a URL
///
/// The key is the lowercase host plus the port when one is explicit, so two
/// services on the same machine are throttled independently.
///
/// # Returns
///
/// * `Some(String)` - The host key
/// * `None` - If the URL cannot be parsed or has no host
///
/// # Examples
///
/// ```
/// use docs_md_crawler::url::host_key;
///
/// assert_eq!(host_key("https://EXAMPLE.com/path"), Some("example.com".to_string()));
/// assert_eq!(host_key("http://127.0.0.1:8080/"), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}

/// Extracts the lowercase hostname (without port)
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}
