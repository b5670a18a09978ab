//! URL handling module for docs-md-crawler
//!
//! This module provides URL normalization, scope classification and host
//! extraction. Normalized URLs are the sole deduplication key across
//! discovery and export.

mod domain;
mod normalize;
mod scope;

pub use domain::{extract_host, host_key};
pub use normalize::{normalize_root_path, normalize_url, path_segments, path_starts_with_root};
pub use scope::{has_static_extension, is_in_scope, matches_path_prefix, origin_of};

/// A canonical URL string as produced by [`normalize_url`]
pub type NormalizedUrl = String;
