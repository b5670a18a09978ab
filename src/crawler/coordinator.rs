//! Discovery engine - the crawl orchestration
//!
//! This module coordinates one discovery session:
//! - Loading the start page once and caching it for export
//! - Inferring the docs root and category prefixes
//! - Seeding from navigation, category and (directory-only) sitemap links
//! - Breadth-first batches with cooperative pause/stop checkpoints
//! - Resolving display titles and publishing the sorted page list

use crate::config::{clamp_max_pages, Config, DiscoveryMode};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::inference::{
    derive_category_path_prefixes, infer_docs_root_path, ArticlePolicy, StructuralArticlePolicy,
};
use crate::crawler::parser::{harvest_page, HarvestedLink, PageHarvest};
use crate::crawler::scheduler::run_bounded;
use crate::robots::{discover_sitemap_urls, fetch_robots, ParsedRobots};
use crate::state::{Checkpoint, DiscoveredPage, FailureKind, Session, SessionState};
use crate::url::{
    is_in_scope, matches_path_prefix, normalize_root_path, normalize_url, origin_of,
    path_segments, path_starts_with_root, NormalizedUrl,
};
use crate::{DocsMdError, FetchError};
use percent_encoding::percent_decode_str;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use url::Url;

/// Where a queue entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// The start page itself
    Start,
    /// Content-link fallback from the start page
    Seed,
    /// Sidebar link on the start page
    NavSeed,
    /// Header/category link on the start page
    CategorySeed,
    /// `<url><loc>` from a sitemap
    Sitemap,
    /// Sidebar link found while crawling
    Nav,
    /// Header/category link found while crawling
    Category,
    /// Content link found while crawling
    Crawl,
}

/// One URL waiting to be visited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlQueueEntry {
    pub url: NormalizedUrl,
    pub depth: u32,
    pub source: SourceKind,
}

/// Discovery settings, usually taken from [`Config`]
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub mode: DiscoveryMode,
    pub root_path: Option<String>,
    pub max_pages: usize,
    pub max_depth: u32,
    pub concurrency: usize,
    pub exclude_patterns: Vec<String>,
    pub expand_articles: bool,
    pub respect_robots: bool,
    /// Product token matched against robots.txt groups
    pub robots_agent: String,
}

impl DiscoveryOptions {
    pub fn from_config(config: &Config) -> Self {
        let crawler = &config.crawler;
        Self {
            mode: crawler.mode,
            root_path: crawler.root_path.clone(),
            max_pages: clamp_max_pages(crawler.max_pages),
            max_depth: crawler.max_depth,
            concurrency: crawler.concurrency,
            exclude_patterns: crawler.exclude_patterns.clone(),
            expand_articles: crawler.expand_articles,
            respect_robots: crawler.respect_robots,
            robots_agent: config.user_agent.name.clone(),
        }
    }
}

/// Result of a finished (or stopped) discovery
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    /// Discovered pages sorted by URL
    pub pages: Vec<DiscoveredPage>,
    pub docs_root: String,
    pub category_prefixes: Vec<String>,
    pub site_name: Option<String>,
    /// `Completed` or `Stopped`
    pub outcome: SessionState,
    /// Pages actually fetched during the crawl
    pub fetched: usize,
    /// Failures recorded by this discovery
    pub failed: usize,
}

/// Titles gathered for one discovered URL
#[derive(Debug, Default)]
struct TitleSources {
    fetched: Option<String>,
    anchor: Option<String>,
}

/// Scope rules fixed once the start page has been analyzed
struct Scope {
    origin: String,
    docs_root: String,
    prefixes: Vec<String>,
    excludes: Vec<String>,
    robots: Option<ParsedRobots>,
    robots_agent: String,
}

impl Scope {
    /// Checks scope, docs root, category prefixes and robots rules
    fn admits(&self, url: &str, source: SourceKind) -> bool {
        if !is_in_scope(url, &self.origin, &self.excludes) {
            tracing::trace!("Out of scope: {}", url);
            return false;
        }
        if source != SourceKind::Start {
            let Ok(parsed) = Url::parse(url) else {
                return false;
            };
            if !path_starts_with_root(parsed.path(), &self.docs_root) {
                tracing::trace!("Outside docs root {}: {}", self.docs_root, url);
                return false;
            }
            if !matches_path_prefix(url, &self.prefixes) {
                tracing::trace!("Outside category prefixes: {}", url);
                return false;
            }
        }
        if let Some(robots) = &self.robots {
            if !robots.is_allowed(url, &self.robots_agent) {
                tracing::debug!("Disallowed by robots.txt: {}", url);
                return false;
            }
        }
        true
    }
}

/// Mutable discovery state
///
/// Only touched between suspension points, never from inside a worker.
struct Frontier {
    max_pages: usize,
    discovered: BTreeMap<NormalizedUrl, TitleSources>,
    queue: VecDeque<CrawlQueueEntry>,
}

impl Frontier {
    fn new(max_pages: usize) -> Self {
        Self {
            max_pages,
            discovered: BTreeMap::new(),
            queue: VecDeque::new(),
        }
    }

    fn is_full(&self) -> bool {
        self.discovered.len() >= self.max_pages
    }

    /// Accepts a candidate URL if new and in scope
    ///
    /// Returns true when the URL was added to both the discovered set and
    /// the queue.
    fn offer(
        &mut self,
        scope: &Scope,
        raw: &str,
        title: Option<&str>,
        depth: u32,
        source: SourceKind,
        session: &Session,
    ) -> bool {
        let Some(url) = normalize_url(raw) else {
            return false;
        };

        if let Some(existing) = self.discovered.get_mut(&url) {
            if existing.anchor.is_none() {
                existing.anchor = title.filter(|t| !t.is_empty()).map(str::to_string);
            }
            return false;
        }
        if self.is_full() || !scope.admits(&url, source) {
            return false;
        }

        let anchor = title.filter(|t| !t.is_empty()).map(str::to_string);
        session.announce_page(DiscoveredPage {
            url: url.clone(),
            title: anchor.clone().unwrap_or_else(|| title_from_url(&url)),
        });
        self.discovered.insert(
            url.clone(),
            TitleSources {
                fetched: None,
                anchor,
            },
        );
        self.queue.push_back(CrawlQueueEntry { url, depth, source });
        true
    }

    fn offer_links(
        &mut self,
        scope: &Scope,
        links: &[HarvestedLink],
        depth: u32,
        source: SourceKind,
        session: &Session,
    ) -> usize {
        let mut added = 0;
        for link in links {
            if self.is_full() {
                break;
            }
            if self.offer(scope, &link.url, Some(&link.title), depth, source, session) {
                added += 1;
            }
        }
        added
    }

    fn into_pages(self) -> Vec<DiscoveredPage> {
        // BTreeMap iteration is already sorted by URL
        self.discovered
            .into_iter()
            .map(|(url, titles)| {
                let title = titles
                    .fetched
                    .or(titles.anchor)
                    .unwrap_or_else(|| title_from_url(&url));
                DiscoveredPage { url, title }
            })
            .collect()
    }
}

/// What a worker produced for one queue entry
enum Visit {
    Fetched {
        entry: CrawlQueueEntry,
        harvest: PageHarvest,
    },
    Failed {
        entry: CrawlQueueEntry,
        error: FetchError,
    },
    /// Depth limit reached
    Skipped(CrawlQueueEntry),
    /// A stop request was observed before the fetch
    Stopped(CrawlQueueEntry),
}

/// Discovers the documentation pages reachable from a start page
pub struct DiscoveryEngine {
    fetcher: Fetcher,
    options: DiscoveryOptions,
    policy: Arc<dyn ArticlePolicy>,
}

impl DiscoveryEngine {
    pub fn new(fetcher: Fetcher, options: DiscoveryOptions) -> Self {
        Self {
            fetcher,
            options,
            policy: Arc::new(StructuralArticlePolicy),
        }
    }

    /// Replaces the article-likeness policy
    pub fn with_article_policy(mut self, policy: Arc<dyn ArticlePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Runs one discovery session
    ///
    /// The start page is fetched exactly once. If it cannot be loaded the
    /// session ends `Failed` and [`DocsMdError::StartPage`] is returned.
    /// Per-URL failures after that are recorded on the session and never
    /// abort the scan. A stop request ends the session `Stopped` with the
    /// pages found so far.
    pub async fn discover(
        &self,
        session: &Session,
        start_url: &str,
    ) -> Result<DiscoveryReport, DocsMdError> {
        let start = Url::parse(start_url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| DocsMdError::InvalidStartUrl(start_url.to_string()))?;
        let start_key = normalize_url(start.as_str())
            .ok_or_else(|| DocsMdError::InvalidStartUrl(start_url.to_string()))?;

        let guard = session.begin(SessionState::Scanning)?;
        session.clear_failures();
        session.clear_html_cache();
        session.set_pages(Vec::new());

        tracing::info!("Starting discovery at {} ({:?} mode)", start, self.options.mode);

        let start_html = self
            .fetcher
            .fetch_text(start.as_str())
            .await
            .map_err(|source| DocsMdError::StartPage {
                url: start.to_string(),
                source,
            })?;
        session.cache_html(&start_key, start_html.clone());

        let start_harvest = harvest_page(&start_html, &start, true);
        drop(start_html);

        let docs_root = match &self.options.root_path {
            Some(root) => normalize_root_path(root),
            None => {
                let candidates: Vec<String> = start_harvest
                    .nav
                    .iter()
                    .chain(&start_harvest.category)
                    .chain(&start_harvest.content)
                    .map(|link| link.url.clone())
                    .collect();
                infer_docs_root_path(start.as_str(), &candidates, "/")
            }
        };
        let category_urls: Vec<String> = start_harvest
            .category
            .iter()
            .map(|link| link.url.clone())
            .collect();
        let prefixes = derive_category_path_prefixes(start.as_str(), &category_urls, &docs_root);
        tracing::info!("Docs root {}, category prefixes {:?}", docs_root, prefixes);

        let origin = origin_of(&start);
        let origin_url = Url::parse(&origin).unwrap_or_else(|_| start.clone());
        let directory_only = self.options.mode == DiscoveryMode::DirectoryOnly;

        let robots = if self.options.respect_robots || directory_only {
            Some(fetch_robots(&self.fetcher, &origin_url).await)
        } else {
            None
        };

        let scope = Scope {
            origin,
            docs_root: docs_root.clone(),
            prefixes: prefixes.clone(),
            excludes: self.options.exclude_patterns.clone(),
            robots: robots.clone().filter(|_| self.options.respect_robots),
            robots_agent: self.options.robots_agent.clone(),
        };

        let mut frontier = Frontier::new(self.options.max_pages.max(1));
        let mut site_name = start_harvest.site_name.clone();

        // Seeding
        frontier.offer(
            &scope,
            &start_key,
            start_harvest.title.as_deref(),
            0,
            SourceKind::Start,
            session,
        );
        if let Some(start_titles) = frontier.discovered.get_mut(&start_key) {
            start_titles.fetched = start_harvest.title.clone();
        }

        if start_harvest.nav.is_empty() {
            tracing::debug!("No navigation links found, seeding from page content");
            frontier.offer_links(&scope, &start_harvest.content, 0, SourceKind::Seed, session);
        } else {
            frontier.offer_links(&scope, &start_harvest.nav, 0, SourceKind::NavSeed, session);
        }
        frontier.offer_links(
            &scope,
            &start_harvest.category,
            0,
            SourceKind::CategorySeed,
            session,
        );

        if directory_only && !frontier.is_full() {
            let robots_sitemaps = robots
                .as_ref()
                .map(|r| r.sitemaps(&origin_url))
                .unwrap_or_default();
            let sitemap_urls = discover_sitemap_urls(
                &self.fetcher,
                &origin_url,
                robots_sitemaps,
                self.options.max_pages,
                session,
            )
            .await;
            tracing::debug!("Sitemaps listed {} url(s)", sitemap_urls.len());
            for url in &sitemap_urls {
                if frontier.is_full() {
                    break;
                }
                frontier.offer(&scope, url, None, 0, SourceKind::Sitemap, session);
            }
        }

        self.publish_progress(session, &frontier, 0, None);

        let mut fetched = 0;
        let mut stopped = session.is_stop_requested();

        if !directory_only && !stopped {
            let (count, was_stopped) = self
                .crawl(session, &scope, &mut frontier, &start_key, &mut site_name)
                .await;
            fetched = count;
            stopped = was_stopped;
        }

        let pages = frontier.into_pages();
        let failed = session.failures().len();
        let outcome = if stopped {
            SessionState::Stopped
        } else {
            SessionState::Completed
        };

        session.set_docs_root(&docs_root);
        session.set_site_name(site_name.clone());
        session.set_pages(pages.clone());
        session.set_progress(|p| {
            p.queued = 0;
            p.current = None;
        });
        guard.finish(outcome)?;

        tracing::info!(
            "Discovery {}: {} page(s), {} fetched, {} failure(s)",
            outcome,
            pages.len(),
            fetched,
            failed
        );

        Ok(DiscoveryReport {
            pages,
            docs_root,
            category_prefixes: prefixes,
            site_name,
            outcome,
            fetched,
            failed,
        })
    }

    /// Breadth-first crawl of the queue in bounded batches
    ///
    /// Returns the number of fetched pages and whether a stop was observed.
    async fn crawl(
        &self,
        session: &Session,
        scope: &Scope,
        frontier: &mut Frontier,
        start_key: &str,
        site_name: &mut Option<String>,
    ) -> (usize, bool) {
        let concurrency = self.options.concurrency.max(1);
        let mut fetched = 0;

        while !frontier.queue.is_empty() {
            if session.checkpoint().await == Checkpoint::Stop {
                return (fetched, true);
            }

            let take = concurrency.min(frontier.queue.len());
            let batch: Vec<CrawlQueueEntry> = frontier.queue.drain(..take).collect();
            self.publish_progress(session, frontier, fetched, batch.first().map(|e| e.url.clone()));

            let visits = run_bounded(batch, concurrency, |_, entry| {
                self.visit(session, entry, start_key)
            })
            .await;

            let mut stop_seen = false;
            for visit in visits {
                match visit {
                    Visit::Fetched { entry, harvest } => {
                        fetched += 1;
                        self.merge(session, scope, frontier, entry, harvest, site_name);
                    }
                    Visit::Failed { entry, error } => {
                        fetched += 1;
                        if error.is_expected_absence() {
                            tracing::debug!("Dropping dead link {}: {}", entry.url, error);
                            frontier.discovered.remove(&entry.url);
                        } else {
                            let title = frontier
                                .discovered
                                .get(&entry.url)
                                .and_then(|t| t.anchor.clone());
                            session.record_failure(
                                &entry.url,
                                FailureKind::Discover,
                                error.to_string(),
                                title,
                            );
                        }
                    }
                    Visit::Skipped(entry) => {
                        tracing::trace!("Depth limit reached at {}", entry.url);
                    }
                    Visit::Stopped(entry) => {
                        tracing::trace!("Stop observed before {}", entry.url);
                        stop_seen = true;
                    }
                }
            }
            self.publish_progress(session, frontier, fetched, None);

            if stop_seen {
                return (fetched, true);
            }
        }

        (fetched, false)
    }

    /// Fetches and harvests one entry
    ///
    /// Runs inside a worker: touches nothing but the session's HTML cache.
    async fn visit(&self, session: &Session, entry: CrawlQueueEntry, start_key: &str) -> Visit {
        if session.checkpoint().await == Checkpoint::Stop {
            return Visit::Stopped(entry);
        }
        if entry.depth >= self.options.max_depth {
            return Visit::Skipped(entry);
        }

        let html = match session.cached_html(&entry.url) {
            Some(html) => html,
            None => {
                let fetched = self.fetcher.fetch_text(&entry.url).await;
                match fetched {
                    Ok(html) => {
                        session.cache_html(&entry.url, html.clone());
                        html
                    }
                    Err(error) => return Visit::Failed { entry, error },
                }
            }
        };

        let Ok(base) = Url::parse(&entry.url) else {
            return Visit::Skipped(entry);
        };
        let expand = entry.url == start_key
            || self.options.expand_articles
            || !self.policy.is_article(&base);
        let harvest = harvest_page(&html, &base, expand);

        tracing::debug!(
            "Visited {} (depth {}): {} nav, {} category, {} content link(s)",
            entry.url,
            entry.depth,
            harvest.nav.len(),
            harvest.category.len(),
            harvest.content.len()
        );

        Visit::Fetched { entry, harvest }
    }

    fn merge(
        &self,
        session: &Session,
        scope: &Scope,
        frontier: &mut Frontier,
        entry: CrawlQueueEntry,
        harvest: PageHarvest,
        site_name: &mut Option<String>,
    ) {
        if let Some(titles) = frontier.discovered.get_mut(&entry.url) {
            if harvest.title.is_some() {
                titles.fetched = harvest.title.clone();
            }
        }
        if site_name.is_none() {
            *site_name = harvest.site_name.clone();
        }

        let depth = entry.depth + 1;
        let mut added = 0;
        added += frontier.offer_links(scope, &harvest.category, depth, SourceKind::Category, session);
        added += frontier.offer_links(scope, &harvest.nav, depth, SourceKind::Nav, session);
        added += frontier.offer_links(scope, &harvest.content, depth, SourceKind::Crawl, session);
        if added > 0 {
            tracing::debug!("{} new url(s) from {}", added, entry.url);
        }
    }

    fn publish_progress(
        &self,
        session: &Session,
        frontier: &Frontier,
        done: usize,
        current: Option<String>,
    ) {
        let found = frontier.discovered.len();
        let queued = frontier.queue.len();
        session.set_progress(|p| {
            p.found = found;
            p.queued = queued;
            p.done = done;
            p.current = current;
        });
    }
}

/// Display title derived from the last path segment, percent-decoded
pub fn title_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let segments = path_segments(parsed.path());
    match segments.last() {
        Some(last) => {
            let decoded = percent_decode_str(last).decode_utf8_lossy();
            let title = decoded.trim();
            if title.is_empty() {
                "index".to_string()
            } else {
                title.to_string()
            }
        }
        None => parsed.host_str().unwrap_or("index").to_string(),
    }
}
