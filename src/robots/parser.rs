//! Robots.txt parser implementation
//!
//! Access checks are delegated to the robotstxt crate. `Sitemap:` directives
//! are extracted separately since the matcher does not expose them.

use robotstxt::DefaultMatcher;
use url::Url;

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
    allow_all: bool,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// Used when robots.txt cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - The absolute URL to check
    /// * `user_agent` - The product token of the user agent
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.allow_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// Sitemap URLs declared in this robots.txt, resolved against `origin`
    pub fn sitemaps(&self, origin: &Url) -> Vec<String> {
        parse_sitemaps_from_robots(&self.content, origin)
    }
}

/// Extracts `Sitemap:` directives (case-insensitive) as absolute URLs
///
/// Relative values are resolved against `origin`; unparsable ones are
/// skipped.
pub fn parse_sitemaps_from_robots(robots_text: &str, origin: &Url) -> Vec<String> {
    let mut urls = Vec::new();

    for line in robots_text.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("sitemap") {
            continue;
        }
        let Some(value) = value.split_whitespace().next() else {
            continue;
        };
        match origin.join(value) {
            Ok(url) => urls.push(url.to_string()),
            Err(e) => tracing::debug!("Ignoring sitemap directive '{}': {}", value, e),
        }
    }

    urls
}
