//! Configuration module for docs-md-crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use docs_md_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    ArchivePayload, Config, CrawlerConfig, DiscoveryMode, ExportConfig, ImageMode,
    UserAgentConfig, DEFAULT_EXCLUDES,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{clamp_max_pages, validate, MAX_PAGES_CEILING};
