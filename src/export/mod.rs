//! Export module for turning discovered pages into a Markdown archive
//!
//! This module contains:
//! - Main-content extraction with link and image rewriting
//! - Archive path assignment for pages and assets
//! - Markdown conversion and front matter
//! - The staged export pipeline, archive delivery and failure retry

mod content;
mod delivery;
mod markdown;
mod paths;
mod pipeline;
mod retry;

pub use content::{
    extract_clean_content, select_main_node, CleanedContent, ImageJob, RewriteContext,
    MAIN_SELECTORS,
};
pub use delivery::{archive_filename, Delivery, DeliveryChain};
pub use markdown::{compose_document, front_matter, Html2MdConverter, MarkdownConverter};
pub use paths::{link_map, relative_path, sanitize_segment, AssetRegistry, LinkMap, OutputPathBuilder};
pub use pipeline::{
    ExportOptions, ExportPipeline, ExportReport, ExportedPage, FAILURE_MANIFEST_FILE, SUMMARY_FILE,
};
pub use retry::{retry_failure, RetryOutcome};
