//! Heuristics about site structure
//!
//! Decides where the documentation lives on a site (the docs root) and which
//! URLs look like leaf articles rather than listings.

use crate::url::{normalize_root_path, normalize_url, path_segments, path_starts_with_root};
use std::collections::{BTreeSet, HashMap};
use url::Url;

/// First path segments that commonly host documentation
pub const DOC_ROOT_HINTS: &[&str] = &[
    "docs",
    "doc",
    "documentation",
    "guide",
    "guides",
    "manual",
    "reference",
    "api",
    "learn",
    "handbook",
    "wiki",
    "help",
    "kb",
];

/// First path segments that never qualify as a docs root
pub const GENERIC_SEGMENTS: &[&str] = &[
    "en", "en-us", "ja", "zh", "zh-cn", "ko", "de", "fr", "es", "latest", "stable", "current",
    "v1", "v2", "v3", "blog", "news", "about", "search", "login", "signup", "pricing",
    "category", "categories", "tag", "tags", "author", "authors", "page",
];

/// Listing roots that hold indexes, never articles
const LISTING_SEGMENTS: &[&str] = &["category", "categories", "tag", "tags", "author", "authors"];

/// Single-segment leaves that are never articles
const NON_CONTENT_LEAVES: &[&str] = &[
    "index", "home", "search", "login", "signup", "about", "contact", "privacy", "terms",
    "sitemap", "archive", "archives",
];

/// Feed endpoints
const FEED_LEAVES: &[&str] = &["feed", "rss", "atom", "feed.xml", "rss.xml", "atom.xml"];

const HINT_WEIGHT: usize = 4;

fn is_generic(segment: &str) -> bool {
    GENERIC_SEGMENTS.contains(&segment.to_ascii_lowercase().as_str())
}

fn is_hint(segment: &str) -> bool {
    DOC_ROOT_HINTS.contains(&segment.to_ascii_lowercase().as_str())
}

fn is_index_segment(segment: &str) -> bool {
    let lower = segment.to_ascii_lowercase();
    lower == "index" || lower.starts_with("index.")
}

/// Infers the path prefix under which documentation lives
///
/// 1. A non-generic first segment of the start URL wins outright.
/// 2. Otherwise same-origin candidate links (absolute, or relative to the
///    start URL) vote with their first segment;
///    known documentation segments carry extra weight.
/// 3. The winner must be a known documentation segment or appear at least
///    twice, else the root is `/`.
///
/// `fallback` is returned when the start URL does not parse or there are no
/// candidates to vote.
pub fn infer_docs_root_path(start_url: &str, candidates: &[String], fallback: &str) -> String {
    let Ok(start) = Url::parse(start_url) else {
        return fallback.to_string();
    };

    if let Some(first) = path_segments(start.path()).first() {
        if !is_generic(first) && !is_index_segment(first) {
            return format!("/{}", first);
        }
    }

    if candidates.is_empty() {
        return fallback.to_string();
    }

    let origin = start.origin();
    let mut scores: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        let Ok(url) = start.join(candidate) else {
            continue;
        };
        if url.origin() != origin {
            continue;
        }
        let Some(first) = path_segments(url.path()).into_iter().next() else {
            continue;
        };
        if is_generic(&first) || is_index_segment(&first) {
            continue;
        }
        let weight = if is_hint(&first) { HINT_WEIGHT } else { 1 };
        *scores.entry(first.to_string()).or_default() += weight;
    }

    let best = scores.into_iter().max_by(|(a_seg, a_score), (b_seg, b_score)| {
        a_score
            .cmp(b_score)
            .then_with(|| is_hint(a_seg).cmp(&is_hint(b_seg)))
            // Earlier lexicographic order wins, so compare reversed
            .then_with(|| b_seg.cmp(a_seg))
    });

    match best {
        Some((segment, score)) if is_hint(&segment) || score >= 2 => format!("/{}", segment),
        _ => "/".to_string(),
    }
}

/// Derives the path prefixes a category-seeded crawl may not leave
///
/// Every same-origin category link under the docs root contributes the docs
/// root plus its first segment below the root (a link to the root itself
/// contributes the root). When nothing qualifies the docs root is the only
/// prefix. The result is sorted and free of duplicates.
pub fn derive_category_path_prefixes(
    start_url: &str,
    category_urls: &[String],
    docs_root_path: &str,
) -> Vec<String> {
    let root = normalize_root_path(docs_root_path);
    let Ok(start) = Url::parse(start_url) else {
        return vec![root];
    };
    let origin = start.origin();
    let root_depth = path_segments(&root).len();

    let mut prefixes = BTreeSet::new();
    for candidate in category_urls {
        let Some(normalized) = start
            .join(candidate)
            .ok()
            .and_then(|url| normalize_url(url.as_str()))
        else {
            continue;
        };
        let Ok(url) = Url::parse(&normalized) else {
            continue;
        };
        if url.origin() != origin || !path_starts_with_root(url.path(), &root) {
            continue;
        }
        let segments = path_segments(url.path());
        let prefix = match segments.get(root_depth) {
            Some(section) if root == "/" => format!("/{}", section),
            Some(section) => format!("{}/{}", root, section),
            None => root.clone(),
        };
        prefixes.insert(prefix);
    }

    if prefixes.is_empty() {
        return vec![root];
    }
    prefixes.into_iter().collect()
}

/// Decides whether a URL is a leaf article
///
/// Deep discovery only expands content links of non-article pages unless
/// configured otherwise, so the policy bounds how far a crawl fans out.
pub trait ArticlePolicy: Send + Sync {
    fn is_article(&self, url: &Url) -> bool;
}

/// Path-shape policy used by default
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralArticlePolicy;

impl ArticlePolicy for StructuralArticlePolicy {
    fn is_article(&self, url: &Url) -> bool {
        is_likely_doc_url_by_structure(url)
    }
}

/// Judges article-likeness from the path alone
///
/// Listing roots, pagination, feeds and well-known non-content leaves are
/// rejected. Paths with two or more segments are accepted, as are single
/// long hyphenated slugs.
pub fn is_likely_doc_url_by_structure(url: &Url) -> bool {
    let segments: Vec<String> = path_segments(url.path())
        .into_iter()
        .map(|s| s.to_ascii_lowercase())
        .collect();

    let Some(first) = segments.first() else {
        return false;
    };

    if LISTING_SEGMENTS.contains(&first.as_str()) {
        return false;
    }

    if segments.windows(2).any(|pair| {
        pair[0] == "page" && pair[1].chars().next().is_some_and(|c| c.is_ascii_digit())
    }) {
        return false;
    }

    let Some(last) = segments.last() else {
        return false;
    };
    if FEED_LEAVES.contains(&last.as_str()) {
        return false;
    }

    if segments.len() == 1 {
        if NON_CONTENT_LEAVES.contains(&last.as_str()) || is_index_segment(last) {
            return false;
        }
        return last.chars().count() >= 12 && last.contains('-');
    }

    true
}
