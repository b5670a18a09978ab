use crate::url::normalize::path_starts_with_root;
use url::Url;

/// Path suffixes that never hold documentation content
const STATIC_ASSET_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp", "avif", "pdf", "zip", "tar", "gz",
    "tgz", "rar", "7z", "mp4", "webm", "mov", "mp3", "wav", "ogg", "woff", "woff2", "ttf", "otf",
    "eot",
];

/// Decides whether a URL may be crawled
///
/// Rejects:
/// - non-http(s) schemes
/// - URLs whose origin differs from `origin`
/// - paths (plus query) containing any exclude pattern, case-insensitively
/// - paths ending in a static-asset extension
///
/// Everything else is accepted. Narrowing to the documentation tree is left to
/// root inference and [`matches_path_prefix`].
///
/// # Arguments
///
/// * `url` - Absolute URL to classify
/// * `origin` - Serialized origin of the crawl, e.g. `https://example.com`
/// * `exclude_patterns` - Substrings that disqualify a URL
pub fn is_in_scope(url: &str, origin: &str, exclude_patterns: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }

    if parsed.origin().ascii_serialization() != origin.trim_end_matches('/') {
        return false;
    }

    let mut full = parsed.path().to_lowercase();
    if let Some(query) = parsed.query() {
        full.push('?');
        full.push_str(&query.to_lowercase());
    }
    for pattern in exclude_patterns {
        let pattern = pattern.trim().to_lowercase();
        if !pattern.is_empty() && full.contains(&pattern) {
            return false;
        }
    }

    !has_static_extension(parsed.path())
}

/// Returns true if the path ends in a known static-asset extension
pub fn has_static_extension(path: &str) -> bool {
    let leaf = path.rsplit('/').next().unwrap_or_default();
    match leaf.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            let ext = ext.to_ascii_lowercase();
            STATIC_ASSET_EXTENSIONS.contains(&ext.as_str())
        }
        _ => false,
    }
}

/// Returns true if the URL path lies under one of `prefixes`
///
/// Vacuously true for an empty prefix list.
pub fn matches_path_prefix(url: &str, prefixes: &[String]) -> bool {
    if prefixes.is_empty() {
        return true;
    }
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    prefixes
        .iter()
        .any(|prefix| path_starts_with_root(parsed.path(), prefix))
}

/// Serializes the origin of a URL (`scheme://host[:port]`)
pub fn origin_of(url: &Url) -> String {
    url.origin().ascii_serialization()
}
