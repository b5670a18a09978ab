//! HTML parser for harvesting links and page metadata
//!
//! Three harvest modes share one scope-resolution strategy: try a prioritized
//! list of selectors (framework-aware first, generic last), stop at the first
//! selector that matches anything, then collect anchors inside those scopes.
//!
//! - **Content links** come from article/main containers.
//! - **Navigation links** come from sidebar containers outside header/footer.
//! - **Category links** come from header/top-nav containers.

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Scopes searched for content links, most specific first
const CONTENT_SCOPES: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    ".markdown-body",
    ".theme-doc-markdown",
    ".docs-content",
    ".content",
    "body",
];

/// Scopes searched for sidebar navigation, most specific first
const NAV_SCOPES: &[&str] = &[
    "[data-left-nav]",
    "[data-testid='left-nav']",
    "[data-sidebar]",
    ".theme-doc-sidebar-container",
    ".theme-doc-sidebar-menu",
    ".VPSidebar",
    ".md-sidebar--primary",
    ".book-summary",
    ".docs-sidebar",
    ".sidebar",
    ".sidenav",
    "aside",
    "nav.toc",
    ".toc",
    "[role='navigation']",
    "nav",
];

/// Scopes searched for top-level category entries
const CATEGORY_SCOPES: &[&str] = &[
    "header nav",
    "[role='banner'] nav",
    ".navbar",
    ".site-header",
    ".top-nav",
    "header",
    "nav",
];

/// Containers whose anchors are global page chrome
const CHROME: &str = "header, footer, nav";

/// Containers that disqualify a sidebar scope
const HEADER_FOOTER: &str = "header, footer";

/// Elements that mark an explicit title inside an anchor
const TITLE_MARKERS: &str = "[data-title], .title, .card__title, h1, h2, h3, h4";

/// Extensions that make `name.ext` a relative file, not a bare domain
const FILE_EXTENSIONS: &[&str] = &[
    "html", "htm", "md", "mdx", "php", "asp", "aspx", "jsp", "xml", "txt", "json", "shtml",
];

/// An anchor resolved to an absolute URL, with its display text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestedLink {
    pub url: String,
    pub title: String,
}

/// Everything discovery needs from one parsed page
#[derive(Debug, Clone, Default)]
pub struct PageHarvest {
    pub title: Option<String>,
    pub site_name: Option<String>,
    pub nav: Vec<HarvestedLink>,
    pub category: Vec<HarvestedLink>,
    pub content: Vec<HarvestedLink>,
}

/// Parses a page and harvests its links
///
/// Content links are only collected when `with_content` is set.
///
/// # Example
///
/// ```
/// use docs_md_crawler::crawler::harvest_page;
/// use url::Url;
///
/// let html = r#"<html><body><aside class="sidebar"><a href="/docs/a">A</a></aside></body></html>"#;
/// let base = Url::parse("https://example.com/docs/").unwrap();
/// let harvest = harvest_page(html, &base, false);
/// assert_eq!(harvest.nav[0].url, "https://example.com/docs/a");
/// ```
pub fn harvest_page(html: &str, base_url: &Url, with_content: bool) -> PageHarvest {
    let document = Html::parse_document(html);
    PageHarvest {
        title: extract_page_title(&document),
        site_name: extract_site_name(&document),
        nav: harvest_nav_links(&document, base_url),
        category: harvest_category_links(&document, base_url),
        content: if with_content {
            harvest_content_links(&document, base_url)
        } else {
            Vec::new()
        },
    }
}

/// Harvests links from the main content area
pub fn harvest_content_links(document: &Html, base_url: &Url) -> Vec<HarvestedLink> {
    let scopes = resolve_scopes(document, CONTENT_SCOPES, None);
    collect_anchors(&scopes, base_url, Some(CHROME), content_link_title)
}

/// Harvests links from sidebar navigation
pub fn harvest_nav_links(document: &Html, base_url: &Url) -> Vec<HarvestedLink> {
    let scopes = resolve_scopes(document, NAV_SCOPES, Some(HEADER_FOOTER));
    collect_anchors(&scopes, base_url, Some(HEADER_FOOTER), anchor_title)
}

/// Harvests links from the header / top navigation
pub fn harvest_category_links(document: &Html, base_url: &Url) -> Vec<HarvestedLink> {
    let scopes = resolve_scopes(document, CATEGORY_SCOPES, None);
    collect_anchors(&scopes, base_url, None, anchor_title)
}

/// Returns the elements matched by the first selector that matches anything
///
/// With `exclude_within`, scopes nested inside a matching ancestor are
/// dropped before deciding whether a selector matched.
fn resolve_scopes<'a>(
    document: &'a Html,
    selectors: &[&str],
    exclude_within: Option<&str>,
) -> Vec<ElementRef<'a>> {
    let excluded = exclude_within.and_then(|s| Selector::parse(s).ok());

    for raw in selectors {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let scopes: Vec<ElementRef<'a>> = document
            .select(&selector)
            .filter(|scope| match &excluded {
                Some(excluded) => !has_ancestor_matching(scope, excluded, None),
                None => true,
            })
            .collect();
        if !scopes.is_empty() {
            tracing::trace!("Resolved {} scope(s) with '{}'", scopes.len(), raw);
            return scopes;
        }
    }

    Vec::new()
}

/// Collects resolvable anchors inside `scopes`, skipping chrome-nested ones
fn collect_anchors(
    scopes: &[ElementRef<'_>],
    base_url: &Url,
    chrome: Option<&str>,
    title_of: fn(&ElementRef<'_>) -> String,
) -> Vec<HarvestedLink> {
    let Ok(anchor_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let chrome = chrome.and_then(|s| Selector::parse(s).ok());

    let mut seen_nodes = HashSet::new();
    let mut links = Vec::new();

    for scope in scopes {
        for anchor in scope.select(&anchor_selector) {
            if !seen_nodes.insert(anchor.id()) {
                continue;
            }
            if anchor.value().attr("download").is_some() {
                continue;
            }
            if let Some(chrome) = &chrome {
                if has_ancestor_matching(&anchor, chrome, Some(scope)) {
                    continue;
                }
            }
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if let Some(url) = resolve_href(href, base_url) {
                links.push(HarvestedLink {
                    url,
                    title: title_of(&anchor),
                });
            }
        }
    }

    links
}

/// True if an ancestor of `element` (below `stop_at`, if given) matches
fn has_ancestor_matching(
    element: &ElementRef<'_>,
    selector: &Selector,
    stop_at: Option<&ElementRef<'_>>,
) -> bool {
    for ancestor in element.ancestors() {
        if let Some(stop) = stop_at {
            if ancestor.id() == stop.id() {
                return false;
            }
        }
        if let Some(ancestor) = ElementRef::wrap(ancestor) {
            if selector.matches(&ancestor) {
                return true;
            }
        }
    }
    false
}

/// Resolves an `href` to an absolute http(s) URL
///
/// Returns None if the link should be excluded:
/// - empty, fragment-only or whitespace-containing hrefs
/// - javascript:, mailto:, tel: and data: schemes
/// - anything that is not http(s) after resolution
///
/// Protocol-relative (`//host/path`) and bare-domain (`docs.example.com/x`)
/// hrefs are upgraded to `https:`.
pub fn resolve_href(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.chars().any(char::is_whitespace) {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let candidate = if href.starts_with("//") {
        format!("https:{}", href)
    } else if looks_like_bare_domain(href) {
        format!("https://{}", href)
    } else {
        href.to_string()
    };

    let absolute = base_url.join(&candidate).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute.to_string()),
        _ => None,
    }
}

/// Heuristic for hrefs such as `www.example.com` or `docs.example.com/page`
fn looks_like_bare_domain(href: &str) -> bool {
    if href.contains("://") || href.starts_with('/') || href.starts_with('.') {
        return false;
    }
    // Anything with an explicit scheme (`foo:`) before the first slash
    let host = href.split(['/', '?', '#']).next().unwrap_or_default();
    if host.contains(':') && !host.rsplit(':').next().is_some_and(|p| p.chars().all(|c| c.is_ascii_digit())) {
        return false;
    }
    let host = host.split(':').next().unwrap_or_default();

    if host.starts_with("www.") {
        return true;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return false;
    }
    if !host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return false;
    }

    let tld = labels[labels.len() - 1].to_ascii_lowercase();
    tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
        && !FILE_EXTENSIONS.contains(&tld.as_str())
}

/// Collapses whitespace runs into single spaces and trims
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text content of an element with ruby annotations (`rt`, `rp`) removed
pub fn text_without_ruby(element: &ElementRef<'_>) -> String {
    let mut out = String::new();
    push_text(element, &mut out);
    clean_text(&out)
}

fn push_text(element: &ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if matches!(el.name(), "rt" | "rp") => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    push_text(&child_el, out);
                }
            }
            _ => {}
        }
    }
}

/// Title for navigation and category anchors
fn anchor_title(anchor: &ElementRef<'_>) -> String {
    let text = text_without_ruby(anchor);
    if !text.is_empty() {
        return text;
    }
    anchor
        .value()
        .attr("title")
        .or_else(|| anchor.value().attr("aria-label"))
        .map(clean_text)
        .unwrap_or_default()
}

/// Title for content anchors: explicit attributes and marked elements first
fn content_link_title(anchor: &ElementRef<'_>) -> String {
    for attr in ["title", "aria-label", "data-title"] {
        if let Some(value) = anchor.value().attr(attr) {
            let value = clean_text(value);
            if !value.is_empty() {
                return value;
            }
        }
    }

    if let Ok(markers) = Selector::parse(TITLE_MARKERS) {
        if let Some(marked) = anchor.select(&markers).next() {
            let text = text_without_ruby(&marked);
            if !text.is_empty() {
                return text;
            }
        }
    }

    text_without_ruby(anchor)
}

/// Extracts the page title: first `<h1>`, else `<title>`
pub fn extract_page_title(document: &Html) -> Option<String> {
    for raw in ["h1", "title"] {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = text_without_ruby(&element);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Extracts a site name hint from `og:site_name` / `application-name` meta
pub fn extract_site_name(document: &Html) -> Option<String> {
    for raw in [
        "meta[property='og:site_name']",
        "meta[name='application-name']",
    ] {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        let name = document
            .select(&selector)
            .filter_map(|m| m.value().attr("content"))
            .map(clean_text)
            .find(|s| !s.is_empty());
        if name.is_some() {
            return name;
        }
    }
    None
}
