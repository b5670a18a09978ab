//! Integration tests for discovery and export
//!
//! These tests use wiremock to create mock documentation sites and run
//! the discovery engine and export pipeline end-to-end.

mod discovery_tests;
mod export_tests;

use docs_md_crawler::config::Config;
use docs_md_crawler::crawler::{build_fetcher, Fetcher};
use std::io::{Cursor, Read};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration with no throttling and no retries
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.crawler.min_host_interval_ms = 0;
    config.crawler.retries = 0;
    config.crawler.backoff_base_ms = 1;
    config.crawler.timeout_ms = 5_000;
    config.user_agent.name = "TestBot".to_string();
    config
}

pub fn test_fetcher(config: &Config) -> Fetcher {
    build_fetcher(config).expect("Failed to build fetcher")
}

/// Serves `body` as HTML at `route`
pub async fn mount_html(server: &MockServer, route: &str, body: String) {
    mount_html_delayed(server, route, body, Duration::ZERO).await;
}

pub async fn mount_html_delayed(server: &MockServer, route: &str, body: String, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html")
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Number of GET requests the server received for `route`
pub async fn request_count(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

/// Reads one entry of a ZIP archive as text
pub fn zip_text(archive: &[u8], name: &str) -> Option<String> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).ok()?;
    let mut file = zip.by_name(name).ok()?;
    let mut text = String::new();
    file.read_to_string(&mut text).ok()?;
    Some(text)
}

/// Sorted entry names of a ZIP archive
pub fn zip_names(archive: &[u8]) -> Vec<String> {
    let zip = zip::ZipArchive::new(Cursor::new(archive)).expect("Archive should be readable");
    let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
    names.sort();
    names
}
