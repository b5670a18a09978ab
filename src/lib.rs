//! Docs-MD-Crawler: documentation site to Markdown archive exporter
//!
//! This crate discovers the pages of a documentation website reachable from a
//! starting page (sidebar/category navigation plus link-structure heuristics),
//! converts each page into Markdown with rewritten cross-links, and packages
//! everything into a single ZIP archive.

pub mod archive;
pub mod config;
pub mod crawler;
pub mod export;
pub mod output;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for docs-md-crawler operations
#[derive(Debug, Error)]
pub enum DocsMdError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error for {url}: {source}")]
    Fetch { url: String, source: FetchError },

    #[error("Start page {url} could not be loaded: {source}")]
    StartPage { url: String, source: FetchError },

    #[error("Invalid start URL: {0}")]
    InvalidStartUrl(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Network fetch failures, classified for the retry policy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("timeout")]
    Timeout,

    #[error("network-error: {0}")]
    Network(String),

    #[error("http-{status}")]
    Http { status: u16 },

    #[error("unsupported-payload: {0}")]
    UnsupportedPayload(String),
}

impl FetchError {
    /// Returns true if the failure may succeed on a later attempt
    ///
    /// Timeouts, network errors, 408/425/429 and every 5xx are retryable.
    /// Other 4xx responses and unsupported payload shapes are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Http { status } => matches!(status, 408 | 425 | 429) || *status >= 500,
            Self::UnsupportedPayload(_) => false,
        }
    }

    /// Returns true for 404/410, which discovery treats as dead-link noise
    pub fn is_expected_absence(&self) -> bool {
        matches!(self, Self::Http { status: 404 | 410 })
    }
}

/// Archive encoding failures
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive encoding timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("payload type {0} is not supported here")]
    UnsupportedPayload(String),

    #[error("archive encoding failed: {0}")]
    Encode(String),

    #[error("archive IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Markdown conversion failure
#[derive(Debug, Error)]
#[error("markdown conversion failed: {0}")]
pub struct ConvertError(pub String);

/// Archive delivery failures
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("could not write {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("every delivery target failed ({0} attempts)")]
    Exhausted(usize),
}

/// Session lifecycle errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("another scan or export is already running")]
    Busy,

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::SessionState,
        to: state::SessionState,
    },

    #[error("no recorded failure with id {0}")]
    UnknownFailure(u64),
}

/// Result type alias for docs-md-crawler operations
pub type Result<T> = std::result::Result<T, DocsMdError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{DiscoveryEngine, DiscoveryReport};
pub use export::{ExportPipeline, ExportReport};
pub use state::{Session, SessionEvent, SessionState};
pub use url::{is_in_scope, matches_path_prefix, normalize_url};
