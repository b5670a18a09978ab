//! Sitemap XML parsing and discovery
//!
//! Handles both `<urlset>` documents and `<sitemapindex>` documents. Nested
//! sitemaps are followed breadth-first until the URL budget is spent.

use crate::crawler::Fetcher;
use crate::state::{Checkpoint, Session};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// Locations found in one sitemap document
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SitemapDocument {
    /// `<url><loc>` entries
    pub urls: Vec<String>,
    /// `<sitemap><loc>` entries pointing at child sitemaps
    pub sitemaps: Vec<String>,
}

/// Parses one sitemap or sitemap index
///
/// # Errors
///
/// Returns the reader error for malformed XML. Callers skip that sitemap.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut document = SitemapDocument::default();
    let mut parent: Option<&'static str> = None;
    let mut in_loc = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"url" => parent = Some("url"),
                b"sitemap" => parent = Some("sitemap"),
                b"loc" if parent.is_some() => in_loc = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"url" | b"sitemap" => parent = None,
                b"loc" => in_loc = false,
                _ => {}
            },
            Event::Text(t) if in_loc => {
                let text = t.unescape()?;
                let value = text.trim();
                if !value.is_empty() {
                    match parent {
                        Some("url") => document.urls.push(value.to_string()),
                        Some("sitemap") => document.sitemaps.push(value.to_string()),
                        _ => {}
                    }
                }
            }
            Event::CData(c) if in_loc => {
                let value = String::from_utf8_lossy(&c).trim().to_string();
                if !value.is_empty() {
                    match parent {
                        Some("url") => document.urls.push(value),
                        Some("sitemap") => document.sitemaps.push(value),
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(document)
}

/// Collects page URLs from a site's sitemaps
///
/// Candidates are `/sitemap.xml` plus every `Sitemap:` directive in
/// robots.txt. Each sitemap is fetched at most once; fetch failures and
/// malformed XML skip that sitemap. Stops once `max_urls` distinct page URLs
/// are found or the session is stopped.
pub async fn discover_sitemap_urls(
    fetcher: &Fetcher,
    origin: &Url,
    robots_sitemaps: Vec<String>,
    max_urls: usize,
    session: &Session,
) -> Vec<String> {
    let mut queue: VecDeque<String> = VecDeque::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut found = Vec::new();

    if let Ok(default) = origin.join("/sitemap.xml") {
        queue.push_back(default.to_string());
    }
    for sitemap in robots_sitemaps {
        if !queue.contains(&sitemap) {
            queue.push_back(sitemap);
        }
    }

    let fetcher = fetcher.with_retries(1);

    while let Some(sitemap_url) = queue.pop_front() {
        if found.len() >= max_urls {
            break;
        }
        if session.checkpoint().await == Checkpoint::Stop {
            break;
        }
        if !visited.insert(sitemap_url.clone()) {
            continue;
        }

        let xml = match fetcher.fetch_text(&sitemap_url).await {
            Ok(xml) => xml,
            Err(e) => {
                tracing::debug!("Skipping sitemap {}: {}", sitemap_url, e);
                continue;
            }
        };

        let document = match parse_sitemap(&xml) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Malformed sitemap {}: {}", sitemap_url, e);
                continue;
            }
        };

        tracing::debug!(
            "Sitemap {}: {} url(s), {} child sitemap(s)",
            sitemap_url,
            document.urls.len(),
            document.sitemaps.len()
        );

        for url in document.urls {
            if found.len() >= max_urls {
                break;
            }
            if seen_urls.insert(url.clone()) {
                found.push(url);
            }
        }
        for child in document.sitemaps {
            if !visited.contains(&child) {
                queue.push_back(child);
            }
        }
    }

    found
}
