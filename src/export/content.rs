//! Main-content extraction and HTML cleanup before conversion
//!
//! The chosen content node is re-serialized into a fresh HTML string rather
//! than mutated in place. While walking it:
//! - page chrome and non-content elements are dropped
//! - links to exported pages become relative archive paths
//! - images are rewritten according to the image mode

use crate::config::ImageMode;
use crate::export::paths::{relative_path, AssetRegistry, LinkMap};
use crate::url::normalize_url;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Content containers tried in order
pub const MAIN_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role='main']",
    ".content",
    ".docs-content",
    ".markdown-body",
];

/// A container must hold more text than this to be chosen
const MIN_MAIN_TEXT: usize = 100;

/// Elements removed together with their subtree
const STRIPPED: &[&str] = &[
    "script", "style", "noscript", "iframe", "nav", "footer", "header", "aside", "template",
];

const VOID: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// An image that must be downloaded into the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageJob {
    /// Absolute source URL
    pub url: String,
    /// Archive path the bytes are stored under
    pub path: String,
}

/// Per-page inputs for link and image rewriting
pub struct RewriteContext<'a> {
    pub page_url: &'a Url,
    /// Archive path of the page being rendered
    pub page_path: &'a str,
    pub links: &'a LinkMap,
    pub image_mode: ImageMode,
    pub assets: &'a mut AssetRegistry,
}

/// Sanitized HTML plus the image downloads it references
#[derive(Debug, Clone, Default)]
pub struct CleanedContent {
    pub html: String,
    pub images: Vec<ImageJob>,
}

/// Picks the main content node of a document
///
/// The first [`MAIN_SELECTORS`] match with enough text wins, else `<body>`,
/// else the root element.
pub fn select_main_node(document: &Html) -> ElementRef<'_> {
    for raw in MAIN_SELECTORS {
        let Ok(selector) = Selector::parse(raw) else {
            continue;
        };
        if let Some(node) = document.select(&selector).next() {
            let text_len: usize = node.text().map(|t| t.trim().chars().count()).sum();
            if text_len > MIN_MAIN_TEXT {
                return node;
            }
        }
    }

    Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element())
}

/// Extracts and cleans the main content of `html`
pub fn extract_clean_content(html: &str, ctx: &mut RewriteContext<'_>) -> CleanedContent {
    let document = Html::parse_document(html);
    let main = select_main_node(&document);

    let mut out = CleanedContent::default();
    render_element(&main, ctx, &mut out);
    out
}

fn render_children(element: &ElementRef<'_>, ctx: &mut RewriteContext<'_>, out: &mut CleanedContent) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => escape_text(text, &mut out.html),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    render_element(&child, ctx, out);
                }
            }
            _ => {}
        }
    }
}

fn render_element(element: &ElementRef<'_>, ctx: &mut RewriteContext<'_>, out: &mut CleanedContent) {
    let name = element.value().name();
    if STRIPPED.contains(&name) {
        return;
    }

    let mut attrs: Vec<(String, String)> = element
        .value()
        .attrs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    match name {
        "a" => rewrite_anchor(&mut attrs, ctx),
        "img" => {
            if !rewrite_image(&mut attrs, ctx, out) {
                return;
            }
        }
        _ => {}
    }

    out.html.push('<');
    out.html.push_str(name);
    for (key, value) in &attrs {
        out.html.push(' ');
        out.html.push_str(key);
        out.html.push_str("=\"");
        escape_attr(value, &mut out.html);
        out.html.push('"');
    }
    out.html.push('>');

    if VOID.contains(&name) {
        return;
    }

    render_children(element, ctx, out);

    out.html.push_str("</");
    out.html.push_str(name);
    out.html.push('>');
}

fn attr<'a>(attrs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn set_attr(attrs: &mut Vec<(String, String)>, key: &str, value: String) {
    match attrs.iter_mut().find(|(k, _)| k == key) {
        Some(slot) => slot.1 = value,
        None => attrs.push((key.to_string(), value)),
    }
}

fn remove_attr(attrs: &mut Vec<(String, String)>, key: &str) {
    attrs.retain(|(k, _)| k != key);
}

/// Points links at exported pages to their relative archive path
///
/// Other links become absolute URLs; unparsable hrefs are left alone.
fn rewrite_anchor(attrs: &mut Vec<(String, String)>, ctx: &RewriteContext<'_>) {
    let Some(raw) = attr(attrs, "href").map(str::to_string) else {
        return;
    };
    let Ok(absolute) = ctx.page_url.join(raw.trim()) else {
        return;
    };

    let mapped = normalize_url(absolute.as_str()).and_then(|key| ctx.links.get(&key));
    let href = match mapped {
        Some(target) => {
            let mut rel = relative_path(ctx.page_path, target);
            if let Some(fragment) = absolute.fragment() {
                rel.push('#');
                rel.push_str(fragment);
            }
            rel
        }
        None => absolute.to_string(),
    };
    set_attr(attrs, "href", href);
}

/// Applies the image mode; returns false when the element must be dropped
fn rewrite_image(
    attrs: &mut Vec<(String, String)>,
    ctx: &mut RewriteContext<'_>,
    out: &mut CleanedContent,
) -> bool {
    if ctx.image_mode == ImageMode::None {
        return false;
    }

    let raw = attr(attrs, "src")
        .filter(|s| !s.trim().is_empty())
        .or_else(|| attr(attrs, "data-src"))
        .unwrap_or_default()
        .trim()
        .to_string();
    if raw.is_empty() {
        return true;
    }
    let Ok(absolute) = ctx.page_url.join(&raw) else {
        return true;
    };

    let src = match ctx.image_mode {
        ImageMode::Local if matches!(absolute.scheme(), "http" | "https") => {
            let (path, is_new) = ctx.assets.register(&absolute);
            if is_new {
                out.images.push(ImageJob {
                    url: absolute.to_string(),
                    path: path.clone(),
                });
            }
            relative_path(ctx.page_path, &path)
        }
        _ => absolute.to_string(),
    };

    set_attr(attrs, "src", src);
    remove_attr(attrs, "srcset");
    remove_attr(attrs, "data-src");
    true
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}
