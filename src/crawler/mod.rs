//! Crawler module for documentation discovery
//!
//! This module contains the discovery side of the crate, including:
//! - HTTP fetching with retry, timeout and payload normalization
//! - Link harvesting from navigation, category and content scopes
//! - Docs-root inference and article-likeness heuristics
//! - Per-host throttling and bounded worker pools
//! - The discovery engine that ties them together

mod coordinator;
mod fetcher;
mod inference;
mod parser;
mod scheduler;

pub use coordinator::{
    title_from_url, CrawlQueueEntry, DiscoveryEngine, DiscoveryOptions, DiscoveryReport,
    SourceKind,
};
pub use fetcher::{
    build_http_client, Fetcher, Payload, ReqwestTransport, ResponseKind, RetryPolicy, Transport,
    TransportResponse,
};
pub use inference::{
    derive_category_path_prefixes, infer_docs_root_path, is_likely_doc_url_by_structure,
    ArticlePolicy, StructuralArticlePolicy, DOC_ROOT_HINTS, GENERIC_SEGMENTS,
};
pub use parser::{
    clean_text, extract_page_title, extract_site_name, harvest_category_links,
    harvest_content_links, harvest_nav_links, harvest_page, resolve_href, text_without_ruby,
    HarvestedLink, PageHarvest,
};
pub use scheduler::{run_bounded, HostRateLimiter};

use crate::config::Config;
use crate::DocsMdError;
use std::sync::Arc;

/// Builds the default fetcher for a configuration
///
/// One reqwest-backed transport and one host limiter, shared by discovery
/// and export so both respect the same per-host spacing.
pub fn build_fetcher(config: &Config) -> Result<Fetcher, DocsMdError> {
    let transport = ReqwestTransport::from_config(&config.user_agent)?;
    let limiter = HostRateLimiter::new(config.crawler.min_host_interval());
    Ok(Fetcher::new(
        Arc::new(transport),
        Arc::new(limiter),
        RetryPolicy::from_config(&config.crawler),
    ))
}
