use crate::{mount_html, mount_html_delayed, mount_status, request_count, test_config, test_fetcher};
use docs_md_crawler::config::DiscoveryMode;
use docs_md_crawler::crawler::{DiscoveryEngine, DiscoveryOptions};
use docs_md_crawler::{DocsMdError, Session, SessionState};
use std::collections::HashSet;
use std::time::Duration;
use wiremock::MockServer;

fn page(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
        .collect();
    format!(
        "<html><head><title>{}</title></head><body><h1>{}</h1><p>{}</p></body></html>",
        title, title, anchors
    )
}

fn urls(report: &docs_md_crawler::DiscoveryReport) -> Vec<String> {
    report.pages.iter().map(|p| p.url.clone()).collect()
}

#[tokio::test]
async fn test_discovery_respects_root_and_excludes() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/docs/start",
        page(
            "Start",
            &["/docs/start/child", "/docs/other", "/login/reset"],
        ),
    )
    .await;
    mount_html(&server, "/docs/start/child", page("Child", &[])).await;
    mount_html(&server, "/docs/other", page("Other", &[])).await;
    mount_html(&server, "/login/reset", page("Reset", &[])).await;

    let mut config = test_config();
    config.crawler.exclude_patterns = vec!["/login".to_string()];

    let engine = DiscoveryEngine::new(test_fetcher(&config), DiscoveryOptions::from_config(&config));
    let session = Session::new();
    let report = engine
        .discover(&session, &format!("{}/docs/start", base))
        .await
        .expect("Discovery should succeed");

    assert_eq!(report.outcome, SessionState::Completed);
    assert_eq!(report.docs_root, "/docs");
    assert_eq!(
        urls(&report),
        vec![
            format!("{}/docs/other", base),
            format!("{}/docs/start", base),
            format!("{}/docs/start/child", base),
        ]
    );
    assert_eq!(request_count(&server, "/login/reset").await, 0);
    // The start page is cached, never fetched twice
    assert_eq!(request_count(&server, "/docs/start").await, 1);

    let titles: HashSet<&str> = report.pages.iter().map(|p| p.title.as_str()).collect();
    assert!(titles.contains("Child"));
    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(session.pages().len(), 3);
}

#[tokio::test]
async fn test_dead_links_dropped_and_errors_recorded() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(
        &server,
        "/docs/start",
        page("Start", &["/docs/gone", "/docs/broken", "/docs/ok"]),
    )
    .await;
    mount_status(&server, "/docs/gone", 404).await;
    mount_status(&server, "/docs/broken", 500).await;
    mount_html(&server, "/docs/ok", page("Ok", &[])).await;

    let config = test_config();
    let engine = DiscoveryEngine::new(test_fetcher(&config), DiscoveryOptions::from_config(&config));
    let session = Session::new();
    let report = engine
        .discover(&session, &format!("{}/docs/start", base))
        .await
        .unwrap();

    let found = urls(&report);
    assert!(!found.contains(&format!("{}/docs/gone", base)));
    assert!(found.contains(&format!("{}/docs/ok", base)));

    let failures = session.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].url, format!("{}/docs/broken", base));
    assert_eq!(failures[0].reason(), "discover:http-500");
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn test_start_page_failure_fails_session() {
    let server = MockServer::start().await;
    mount_status(&server, "/docs/start", 500).await;

    let config = test_config();
    let engine = DiscoveryEngine::new(test_fetcher(&config), DiscoveryOptions::from_config(&config));
    let session = Session::new();
    let result = engine
        .discover(&session, &format!("{}/docs/start", server.uri()))
        .await;

    assert!(matches!(result, Err(DocsMdError::StartPage { .. })));
    assert_eq!(session.state(), SessionState::Failed);

    // The session can be reused after a failure
    mount_html(&server, "/docs/other", page("Other", &[])).await;
    let retry = engine
        .discover(&session, &format!("{}/docs/other", server.uri()))
        .await;
    assert!(retry.is_ok());
}

#[tokio::test]
async fn test_invalid_start_url() {
    let config = test_config();
    let engine = DiscoveryEngine::new(test_fetcher(&config), DiscoveryOptions::from_config(&config));
    let session = Session::new();
    let result = engine.discover(&session, "ftp://example.com/docs").await;
    assert!(matches!(result, Err(DocsMdError::InvalidStartUrl(_))));
    assert_eq!(session.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_directory_only_uses_sitemap_without_fetching() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(&server, "/docs/start", page("Start", &["/docs/a"])).await;
    mount_status(&server, "/robots.txt", 404).await;
    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>{base}/docs/b</loc></url>
          <url><loc>{base}/docs/c/</loc></url>
          <url><loc>{base}/blog/post</loc></url>
          <url><loc>https://elsewhere.example/docs/d</loc></url>
        </urlset>"#,
        base = base
    );
    wiremock::Mock::given(wiremock::matchers::method("GET"))
        .and(wiremock::matchers::path("/sitemap.xml"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(sitemap))
        .mount(&server)
        .await;

    let mut config = test_config();
    config.crawler.mode = DiscoveryMode::DirectoryOnly;

    let engine = DiscoveryEngine::new(test_fetcher(&config), DiscoveryOptions::from_config(&config));
    let session = Session::new();
    let report = engine
        .discover(&session, &format!("{}/docs/start", base))
        .await
        .unwrap();

    assert_eq!(
        urls(&report),
        vec![
            format!("{}/docs/a", base),
            format!("{}/docs/b", base),
            format!("{}/docs/c", base),
            format!("{}/docs/start", base),
        ]
    );
    assert_eq!(report.fetched, 0);
    assert_eq!(request_count(&server, "/docs/a").await, 0);
    assert_eq!(request_count(&server, "/docs/b").await, 0);
}

#[tokio::test]
async fn test_max_pages_caps_discovery() {
    let server = MockServer::start().await;
    let base = server.uri();

    let links: Vec<String> = (0..10).map(|i| format!("/docs/p{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    mount_html(&server, "/docs/start", page("Start", &link_refs)).await;

    let mut config = test_config();
    config.crawler.max_pages = 4;
    config.crawler.mode = DiscoveryMode::DirectoryOnly;
    mount_status(&server, "/robots.txt", 404).await;

    let engine = DiscoveryEngine::new(test_fetcher(&config), DiscoveryOptions::from_config(&config));
    let session = Session::new();
    let report = engine
        .discover(&session, &format!("{}/docs/start", base))
        .await
        .unwrap();
    assert_eq!(report.pages.len(), 4);
}

#[tokio::test]
async fn test_pause_and_resume_keep_every_url_once() {
    let server = MockServer::start().await;
    let base = server.uri();
    let delay = Duration::from_millis(100);

    let children = ["/docs/a", "/docs/b", "/docs/c", "/docs/d"];
    mount_html_delayed(&server, "/docs/start", page("Start", &children), delay).await;
    for child in children {
        // Every child links back to its siblings and the start page
        let mut links = children.to_vec();
        links.push("/docs/start");
        mount_html_delayed(&server, child, page(child, &links), delay).await;
    }

    let mut config = test_config();
    config.crawler.concurrency = 1;
    config.crawler.expand_articles = true;

    let engine = DiscoveryEngine::new(test_fetcher(&config), DiscoveryOptions::from_config(&config));
    let session = Session::new();
    let start_url = format!("{}/docs/start", base);

    let (report, paused_requests) = tokio::join!(engine.discover(&session, &start_url), async {
        tokio::time::sleep(Duration::from_millis(250)).await;
        session.request_pause();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(session.state(), SessionState::Paused);

        let before = server.received_requests().await.unwrap_or_default().len();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let after = server.received_requests().await.unwrap_or_default().len();
        assert_eq!(before, after, "no requests while paused");

        session.resume();
        before
    });

    let report = report.expect("Discovery should succeed after resume");
    assert_eq!(report.outcome, SessionState::Completed);
    assert!(paused_requests < 5, "pause landed mid-crawl");

    let mut expected: Vec<String> = children.iter().map(|c| format!("{}{}", base, c)).collect();
    expected.push(start_url.clone());
    expected.sort();
    assert_eq!(urls(&report), expected);

    for route in children.iter().chain(std::iter::once(&"/docs/start")) {
        assert_eq!(request_count(&server, route).await, 1, "{} fetched once", route);
    }
}

#[tokio::test]
async fn test_stop_ends_with_partial_results() {
    let server = MockServer::start().await;
    let base = server.uri();
    let delay = Duration::from_millis(100);

    let children = ["/docs/a", "/docs/b", "/docs/c", "/docs/d"];
    mount_html(&server, "/docs/start", page("Start", &children)).await;
    for child in children {
        mount_html_delayed(&server, child, page(child, &["/docs/start"]), delay).await;
    }

    let mut config = test_config();
    config.crawler.concurrency = 1;

    let engine = DiscoveryEngine::new(test_fetcher(&config), DiscoveryOptions::from_config(&config));
    let session = Session::new();

    let start_url = format!("{}/docs/start", base);
    let (report, _) = tokio::join!(
        engine.discover(&session, &start_url),
        async {
            tokio::time::sleep(Duration::from_millis(150)).await;
            session.request_stop();
        }
    );

    let report = report.unwrap();
    assert_eq!(report.outcome, SessionState::Stopped);
    assert_eq!(session.state(), SessionState::Stopped);
    // Links seeded from the start page stay in the result
    assert_eq!(report.pages.len(), 5);
    assert!(report.fetched < children.len());
}

/// A page with sidebar links plus body links
fn page_with_sidebar(title: &str, sidebar: &[&str], body: &[&str]) -> String {
    let anchors = |links: &[&str]| -> String {
        links
            .iter()
            .map(|href| format!(r#"<a href="{}">{}</a>"#, href, href))
            .collect()
    };
    format!(
        r#"<html><head><title>{t}</title></head><body>
          <aside class="sidebar">{side}</aside>
          <h1>{t}</h1><p>{main}</p>
        </body></html>"#,
        t = title,
        side = anchors(sidebar),
        main = anchors(body)
    )
}

#[tokio::test]
async fn test_max_depth_bounds_the_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();

    let chain = ["/docs/start", "/docs/l1", "/docs/l2", "/docs/l3", "/docs/l4"];
    for pair in chain.windows(2) {
        mount_html(&server, pair[0], page(pair[0], &[pair[1]])).await;
    }
    mount_html(&server, "/docs/l4", page("l4", &[])).await;

    let mut config = test_config();
    config.crawler.max_depth = 2;
    config.crawler.expand_articles = true;

    let engine = DiscoveryEngine::new(test_fetcher(&config), DiscoveryOptions::from_config(&config));
    let session = Session::new();
    let report = engine
        .discover(&session, &format!("{}/docs/start", base))
        .await
        .unwrap();

    // l3 is discovered at the depth limit but never expanded
    assert_eq!(
        urls(&report),
        vec![
            format!("{}/docs/l1", base),
            format!("{}/docs/l2", base),
            format!("{}/docs/l3", base),
            format!("{}/docs/start", base),
        ]
    );
    assert_eq!(request_count(&server, "/docs/l3").await, 0);
    assert_eq!(request_count(&server, "/docs/l4").await, 0);
}

#[tokio::test]
async fn test_article_content_links_need_expand_articles() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_html(&server, "/docs/guide", page("Guide", &["/docs/guide/a"])).await;
    mount_html(
        &server,
        "/docs/guide/a",
        page_with_sidebar("A", &["/docs/guide/n"], &["/docs/guide/z"]),
    )
    .await;
    mount_html(&server, "/docs/guide/n", page("N", &[])).await;
    mount_html(&server, "/docs/guide/z", page("Z", &[])).await;

    let start = format!("{}/docs/guide", base);
    let z = format!("{}/docs/guide/z", base);
    let n = format!("{}/docs/guide/n", base);

    let config = test_config();
    assert!(!config.crawler.expand_articles);
    let engine = DiscoveryEngine::new(test_fetcher(&config), DiscoveryOptions::from_config(&config));
    let report = engine.discover(&Session::new(), &start).await.unwrap();

    // Sidebar links of an article are followed, its body links are not
    let found = urls(&report);
    assert!(found.contains(&n));
    assert!(!found.contains(&z));
    assert_eq!(request_count(&server, "/docs/guide/z").await, 0);

    let mut config = test_config();
    config.crawler.expand_articles = true;
    let engine = DiscoveryEngine::new(test_fetcher(&config), DiscoveryOptions::from_config(&config));
    let report = engine.discover(&Session::new(), &start).await.unwrap();

    let found = urls(&report);
    assert!(found.contains(&n));
    assert!(found.contains(&z));
}

#[tokio::test]
async fn test_category_prefix_keeps_crawl_in_its_section() {
    let server = MockServer::start().await;
    let base = server.uri();

    let start_body = r#"<html><head><title>Intro</title></head><body>
          <header><nav><a href="/docs/guide/intro">Guide</a></nav></header>
          <h1>Intro</h1>
          <p><a href="/docs/guide/setup">Setup</a> <a href="/docs/api/ref">API</a></p>
        </body></html>"#;
    mount_html(&server, "/docs/guide/intro", start_body.to_string()).await;
    mount_html(
        &server,
        "/docs/guide/setup",
        page_with_sidebar("Setup", &["/docs/guide/deep", "/docs/api/other"], &[]),
    )
    .await;
    mount_html(&server, "/docs/guide/deep", page("Deep", &[])).await;
    mount_html(&server, "/docs/api/ref", page("Ref", &[])).await;
    mount_html(&server, "/docs/api/other", page("Other", &[])).await;

    let config = test_config();
    let engine = DiscoveryEngine::new(test_fetcher(&config), DiscoveryOptions::from_config(&config));
    let report = engine
        .discover(&Session::new(), &format!("{}/docs/guide/intro", base))
        .await
        .unwrap();

    assert_eq!(report.docs_root, "/docs");
    assert_eq!(report.category_prefixes, vec!["/docs/guide".to_string()]);
    assert_eq!(
        urls(&report),
        vec![
            format!("{}/docs/guide/deep", base),
            format!("{}/docs/guide/intro", base),
            format!("{}/docs/guide/setup", base),
        ]
    );
    assert_eq!(request_count(&server, "/docs/api/ref").await, 0);
    assert_eq!(request_count(&server, "/docs/api/other").await, 0);
}
