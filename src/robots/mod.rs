//! Robots.txt and sitemap handling
//!
//! robots.txt is fetched once per discovery. It supplies `Sitemap:`
//! directives for directory-only scans and, when enabled, access rules for
//! every accepted URL.

mod parser;
mod sitemap;

pub use parser::{parse_sitemaps_from_robots, ParsedRobots};
pub use sitemap::{discover_sitemap_urls, parse_sitemap, SitemapDocument};

use crate::crawler::Fetcher;
use url::Url;

/// Fetches robots.txt for an origin
///
/// Any failure yields [`ParsedRobots::allow_all`]; a missing robots.txt is
/// normal.
pub async fn fetch_robots(fetcher: &Fetcher, origin: &Url) -> ParsedRobots {
    let robots_url = match origin.join("/robots.txt") {
        Ok(url) => url,
        Err(_) => return ParsedRobots::allow_all(),
    };

    match fetcher.with_retries(1).fetch_text(robots_url.as_str()).await {
        Ok(content) => {
            tracing::debug!("Fetched robots.txt ({} bytes)", content.len());
            ParsedRobots::from_content(&content)
        }
        Err(e) => {
            tracing::debug!("No usable robots.txt at {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
