//! Archive paths for exported pages and images
//!
//! Pages land under the directories of their URL path below the docs root,
//! named after their title. Images land under `assets/<host>/`. Both
//! registries hand out `-2`, `-3`, … suffixes so no two sources share a path.

use crate::url::{normalize_root_path, normalize_url, path_segments};
use percent_encoding::percent_decode_str;
use std::collections::{HashMap, HashSet};
use unicode_normalization::UnicodeNormalization;
use url::Url;

const MAX_SEGMENT_CHARS: usize = 80;

/// Characters that are invalid in file names on common filesystems
const RESERVED: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Makes a string safe to use as one path segment
///
/// NFKC-normalizes, replaces reserved characters with spaces, collapses
/// whitespace, strips trailing dots and truncates to 80 characters. Returns
/// `fallback` if nothing is left.
pub fn sanitize_segment(value: &str, fallback: &str) -> String {
    let replaced: String = value
        .nfkc()
        .map(|c| if RESERVED.contains(&c) || c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = collapsed.trim_end_matches('.').trim();

    if cleaned.is_empty() {
        return if fallback.is_empty() {
            "untitled".to_string()
        } else {
            fallback.to_string()
        };
    }
    cleaned.chars().take(MAX_SEGMENT_CHARS).collect::<String>().trim_end().to_string()
}

fn decode_segment(segment: &str) -> String {
    percent_decode_str(segment).decode_utf8_lossy().into_owned()
}

/// Strips the docs root from `segments` when they start with it
fn relative_segments<'a>(segments: &'a [String], root: &[String]) -> &'a [String] {
    if !root.is_empty() && segments.len() >= root.len() && segments[..root.len()] == *root {
        &segments[root.len()..]
    } else {
        segments
    }
}

/// Assigns unique Markdown paths to exported pages
#[derive(Debug)]
pub struct OutputPathBuilder {
    root_segments: Vec<String>,
    used: HashSet<String>,
}

impl OutputPathBuilder {
    pub fn new(docs_root: &str) -> Self {
        let root = normalize_root_path(docs_root);
        Self {
            root_segments: path_segments(&root).into_iter().map(decode_segment).collect(),
            used: HashSet::new(),
        }
    }

    /// Marks `path` as taken so no page is assigned it
    pub fn reserve(&mut self, path: &str) {
        self.used.insert(path.to_string());
    }

    /// Returns a fresh path for `url` titled `title`
    ///
    /// Directories come from the URL path segments below the docs root (the
    /// leaf is dropped unless the URL ends in `/`). The file name is the
    /// sanitized title, or the leaf segment when the title is empty.
    pub fn build(&mut self, url: &str, title: &str) -> String {
        let (segments, directory_like) = match Url::parse(url) {
            Ok(parsed) => {
                let segments: Vec<String> = path_segments(parsed.path())
                    .into_iter()
                    .map(decode_segment)
                    .collect();
                (segments, parsed.path().ends_with('/') && parsed.path() != "/")
            }
            Err(_) => (Vec::new(), false),
        };

        let relative = relative_segments(&segments, &self.root_segments);
        let (dirs, leaf) = match relative.split_last() {
            Some((leaf, dirs)) if !directory_like => (dirs, leaf.as_str()),
            _ => (relative, "index"),
        };

        let safe_leaf = sanitize_segment(leaf, "index");
        let safe_title = sanitize_segment(title, &safe_leaf);
        let base_dir: String = dirs
            .iter()
            .map(|d| format!("{}/", sanitize_segment(d, "_")))
            .collect();

        let mut candidate = format!("{}{}.md", base_dir, safe_title);
        let mut counter = 2;
        while self.used.contains(&candidate) {
            candidate = format!("{}{}-{}.md", base_dir, safe_title, counter);
            counter += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

/// Deduplicating registry of local image paths
#[derive(Debug, Default)]
pub struct AssetRegistry {
    by_url: HashMap<String, String>,
    used: HashSet<String>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the asset path for `image_url` and whether it is new
    ///
    /// The same source URL always maps to the same path.
    pub fn register(&mut self, image_url: &Url) -> (String, bool) {
        if let Some(existing) = self.by_url.get(image_url.as_str()) {
            return (existing.clone(), false);
        }

        let host = sanitize_segment(image_url.host_str().unwrap_or_default(), "assets");
        let raw_name = image_url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(decode_segment)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "image".to_string());
        let (base, ext) = match raw_name.rfind('.') {
            Some(dot) if dot > 0 => (&raw_name[..dot], raw_name[dot..].to_string()),
            _ => (raw_name.as_str(), ".bin".to_string()),
        };
        let safe_base = sanitize_segment(base, "image");
        let safe_ext: String = ext
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '.')
            .take(12)
            .collect();
        let safe_ext = if safe_ext.len() > 1 { safe_ext } else { ".bin".to_string() };

        let mut path = format!("assets/{}/{}{}", host, safe_base, safe_ext);
        let mut counter = 2;
        while self.used.contains(&path) {
            path = format!("assets/{}/{}-{}{}", host, safe_base, counter, safe_ext);
            counter += 1;
        }

        self.used.insert(path.clone());
        self.by_url.insert(image_url.to_string(), path.clone());
        (path, true)
    }

    pub fn len(&self) -> usize {
        self.by_url.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_url.is_empty()
    }
}

/// Relative path from the file `from_file` to `to_file`, both archive paths
pub fn relative_path(from_file: &str, to_file: &str) -> String {
    let from_dirs: Vec<&str> = {
        let mut parts: Vec<&str> = from_file.split('/').collect();
        parts.pop();
        parts
    };
    let to_parts: Vec<&str> = to_file.split('/').collect();

    let common = from_dirs
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();
    let up = from_dirs.len() - common;

    let mut out = "../".repeat(up);
    out.push_str(&to_parts[common..].join("/"));
    out
}

/// Map from normalized page URL to its archive path
pub type LinkMap = HashMap<String, String>;

/// Builds a [`LinkMap`] from `(url, path)` pairs
pub fn link_map<'a>(pages: impl IntoIterator<Item = (&'a str, &'a str)>) -> LinkMap {
    pages
        .into_iter()
        .filter_map(|(url, path)| normalize_url(url).map(|key| (key, path.to_string())))
        .collect()
}
