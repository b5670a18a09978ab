use serde::Deserialize;
use std::time::Duration;

/// Exclude substrings applied when no `exclude-patterns` are configured
pub const DEFAULT_EXCLUDES: &[&str] = &["/api/", "/login", "/admin", "token="];

/// Main configuration structure for docs-md-crawler
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub export: ExportConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
}

/// How discovery expands beyond the seeded links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryMode {
    /// Accept seeded/navigation/sitemap links only, fetch nothing further
    DirectoryOnly,
    /// Fetch and expand pages breadth-first up to `max-depth`
    Deep,
}

/// What to do with `<img>` elements during export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageMode {
    /// Keep the absolute source URL
    External,
    /// Download into `assets/<host>/` and point at the local copy
    Local,
    /// Drop the element
    None,
}

/// Payload representation requested from the primary archive backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchivePayload {
    /// File-backed buffer
    Blob,
    /// In-memory byte array
    Bytes,
}

impl ArchivePayload {
    /// The other representation, tried when this one is unsupported
    pub fn alternate(self) -> Self {
        match self {
            Self::Blob => Self::Bytes,
            Self::Bytes => Self::Blob,
        }
    }
}

impl std::fmt::Display for ArchivePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Bytes => write!(f, "bytes"),
        }
    }
}

/// Discovery behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Discovery mode
    pub mode: DiscoveryMode,

    /// Explicit documentation root; inferred from the start page when absent
    pub root_path: Option<String>,

    /// Upper bound on the discovered set
    pub max_pages: usize,

    /// Maximum queue depth that is still fetched
    pub max_depth: u32,

    /// Concurrent page fetches during discovery
    pub concurrency: usize,

    /// Minimum time between two requests to the same host (milliseconds)
    pub min_host_interval_ms: u64,

    /// Per-request deadline (milliseconds)
    pub timeout_ms: u64,

    /// Extra attempts for retryable failures
    pub retries: u32,

    /// Backoff base; attempt `n` sleeps `base * 2^n` (milliseconds)
    pub backoff_base_ms: u64,

    /// Case-insensitive substrings that exclude a URL path
    pub exclude_patterns: Vec<String>,

    /// Expand content links even on pages that look like finished articles
    pub expand_articles: bool,

    /// Skip URLs disallowed by robots.txt
    pub respect_robots: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            mode: DiscoveryMode::Deep,
            root_path: None,
            max_pages: 300,
            max_depth: 6,
            concurrency: 6,
            min_host_interval_ms: 300,
            timeout_ms: 15_000,
            retries: 2,
            backoff_base_ms: 300,
            exclude_patterns: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            expand_articles: false,
            respect_robots: false,
        }
    }
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_host_interval(&self) -> Duration {
        Duration::from_millis(self.min_host_interval_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

/// Export behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExportConfig {
    /// Image handling mode
    pub image_mode: ImageMode,

    /// Concurrent page fetches during export
    pub page_concurrency: usize,

    /// Concurrent image downloads
    pub image_concurrency: usize,

    /// Deadline for each library-backed archive tier (milliseconds)
    pub archive_deadline_ms: u64,

    /// Preferred payload representation for the primary archive tier
    pub archive_payload: ArchivePayload,

    /// Directory the archive is delivered to
    pub output_dir: String,

    /// Add a SUMMARY.md table of contents to the archive
    pub include_summary: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            image_mode: ImageMode::Local,
            page_concurrency: 6,
            image_concurrency: 4,
            archive_deadline_ms: 20_000,
            archive_payload: ArchivePayload::Blob,
            output_dir: ".".to_string(),
            include_summary: true,
        }
    }
}

impl ExportConfig {
    pub fn archive_deadline(&self) -> Duration {
        Duration::from_millis(self.archive_deadline_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub name: String,

    /// Version of the crawler
    pub version: String,

    /// URL with information about the crawler
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: "docs-md-crawler".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!("{}/{} (+{})", self.name, self.version, contact),
            None => format!("{}/{}", self.name, self.version),
        }
    }
}
