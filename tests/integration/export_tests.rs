use crate::{mount_status, test_config, test_fetcher, zip_names, zip_text};
use docs_md_crawler::config::ImageMode;
use docs_md_crawler::export::{
    retry_failure, DeliveryChain, ExportOptions, ExportPipeline, Html2MdConverter, RetryOutcome,
};
use docs_md_crawler::state::{DiscoveredPage, FailureKind};
use docs_md_crawler::{Session, SessionState};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FILLER: &str = "This documentation paragraph is long enough that the article element wins the main content selection easily.";

fn install_page() -> String {
    format!(
        r##"<html><head><title>Install | Acme</title></head><body>
          <header><a href="/">Home</a></header>
          <nav><a href="/docs/guide/install">Install</a></nav>
          <article>
            <h1>Install Guide</h1>
            <p>{}</p>
            <p>Next read the <a href="../api/ref#options">reference</a> or
               <a href="https://other.example/x">elsewhere</a>.</p>
            <img src="/img/logo.png" alt="logo" srcset="/img/logo@2x.png 2x">
            <script>track()</script>
          </article>
          <footer>Copyright</footer>
        </body></html>"##,
        FILLER
    )
}

fn reference_page() -> String {
    format!(
        r#"<html><head><title>Reference</title></head><body>
          <main><h1>Reference</h1><p>{}</p><h2 id="options">Options</h2></main>
        </body></html>"#,
        FILLER
    )
}

async fn mount_site(server: &MockServer) {
    for (route, body) in [
        ("/docs/guide/install", install_page()),
        ("/docs/api/ref", reference_page()),
    ] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(body)
                    .insert_header("content-type", "text/html"),
            )
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/img/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x89, b'P', b'N', b'G']))
        .mount(server)
        .await;
    mount_status(server, "/docs/missing", 500).await;
}

fn pages(base: &str) -> Vec<DiscoveredPage> {
    ["/docs/guide/install", "/docs/api/ref", "/docs/missing"]
        .iter()
        .map(|route| DiscoveredPage {
            url: format!("{}{}", base, route),
            title: String::new(),
        })
        .collect()
}

fn session_for(root: &str) -> Session {
    let session = Session::new();
    session.set_docs_root(root);
    session
}

fn host_dir(base: &str) -> String {
    let url = url::Url::parse(base).unwrap();
    url.host_str().unwrap().to_string()
}

#[tokio::test]
async fn test_export_builds_linked_archive() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_site(&server).await;

    let config = test_config();
    let pipeline = ExportPipeline::new(test_fetcher(&config), ExportOptions::default());
    let session = session_for("/docs");

    let report = pipeline.run(&session, &pages(&base)).await.unwrap();

    assert_eq!(report.outcome, SessionState::Completed);
    assert_eq!(report.pages.len(), 2);
    assert_eq!(report.images, 1);
    assert_eq!(report.failed, 1);

    let asset = format!("assets/{}/logo.png", host_dir(&base));
    assert_eq!(
        zip_names(&report.archive),
        {
            let mut expected = vec![
                "SUMMARY.md".to_string(),
                "api/Reference.md".to_string(),
                asset.clone(),
                "failed-urls.txt".to_string(),
                "guide/Install Guide.md".to_string(),
            ];
            expected.sort();
            expected
        }
    );

    let install = zip_text(&report.archive, "guide/Install Guide.md").unwrap();
    assert!(install.starts_with(&format!(
        "---\ntitle: \"Install Guide\"\nsource: \"{}/docs/guide/install\"\n---\n",
        base
    )));
    assert!(install.contains("../api/Reference.md#options"));
    assert!(install.contains("https://other.example/x"));
    assert!(install.contains(&format!("../{}", asset)));
    assert!(!install.contains("track()"));
    assert!(!install.contains("Copyright"));

    let summary = zip_text(&report.archive, "SUMMARY.md").unwrap();
    assert_eq!(
        summary,
        "# Summary\n\n- [Reference](api/Reference.md)\n- [Install Guide](guide/Install%20Guide.md)\n"
    );

    let manifest = zip_text(&report.archive, "failed-urls.txt").unwrap();
    assert!(manifest.contains(&format!("{}/docs/missing | page-fetch-fail:http-500", base)));

    assert_eq!(session.state(), SessionState::Completed);
    assert!(report.filename.ends_with(".zip"));
}

#[tokio::test]
async fn test_export_reuses_discovery_cache() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/docs/cached"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let session = session_for("/docs");
    let url = format!("{}/docs/cached", base);
    session.cache_html(&url, format!("<html><body><h1>From Cache</h1><p>{}</p></body></html>", FILLER));

    let config = test_config();
    let pipeline = ExportPipeline::new(test_fetcher(&config), ExportOptions::default());
    let report = pipeline
        .run(
            &session,
            &[DiscoveredPage {
                url,
                title: "Cached".to_string(),
            }],
        )
        .await
        .unwrap();

    assert_eq!(report.pages[0].path, "From Cache.md");
    assert!(zip_text(&report.archive, "From Cache.md")
        .unwrap()
        .contains("From Cache"));
    assert!(zip_text(&report.archive, "failed-urls.txt").is_none());
}

#[tokio::test]
async fn test_image_modes_external_and_none() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_site(&server).await;
    let config = test_config();
    let page = vec![DiscoveredPage {
        url: format!("{}/docs/guide/install", base),
        title: String::new(),
    }];

    let external = ExportPipeline::new(
        test_fetcher(&config),
        ExportOptions {
            image_mode: ImageMode::External,
            ..ExportOptions::default()
        },
    );
    let report = external.run(&session_for("/docs"), &page).await.unwrap();
    let md = zip_text(&report.archive, "guide/Install Guide.md").unwrap();
    assert!(md.contains(&format!("{}/img/logo.png", base)));
    assert_eq!(report.images, 0);

    let none = ExportPipeline::new(
        test_fetcher(&config),
        ExportOptions {
            image_mode: ImageMode::None,
            include_summary: false,
            ..ExportOptions::default()
        },
    );
    let report = none.run(&session_for("/docs"), &page).await.unwrap();
    let md = zip_text(&report.archive, "guide/Install Guide.md").unwrap();
    assert!(!md.contains("logo.png"));
    assert_eq!(zip_names(&report.archive), vec!["guide/Install Guide.md"]);
}

#[tokio::test]
async fn test_failed_image_is_recorded_not_fatal() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/docs/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body><article><h1>Page</h1><p>{}</p><img src="/img/broken.png"></article></body></html>"#,
            FILLER
        )))
        .mount(&server)
        .await;
    mount_status(&server, "/img/broken.png", 404).await;

    let config = test_config();
    let pipeline = ExportPipeline::new(test_fetcher(&config), ExportOptions::default());
    let session = session_for("/docs");
    let report = pipeline
        .run(
            &session,
            &[DiscoveredPage {
                url: format!("{}/docs/page", base),
                title: String::new(),
            }],
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, SessionState::Completed);
    assert_eq!(report.images, 0);
    let failures = session.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, FailureKind::ImageDownload);
    assert!(zip_text(&report.archive, "failed-urls.txt")
        .unwrap()
        .contains("image-download-fail:http-404"));
}

#[tokio::test]
async fn test_delivery_writes_named_archive() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_site(&server).await;
    let out = tempfile::tempdir().unwrap();

    let config = test_config();
    let pipeline = ExportPipeline::new(test_fetcher(&config), ExportOptions::default())
        .with_delivery(Arc::new(DeliveryChain::with_targets(vec![out.path().to_path_buf()])));
    let session = session_for("/docs");
    session.set_site_name(Some("Acme Docs".to_string()));

    let report = pipeline
        .run(
            &session,
            &[DiscoveredPage {
                url: format!("{}/docs/api/ref", base),
                title: String::new(),
            }],
        )
        .await
        .unwrap();

    assert!(report.filename.starts_with("acme-docs-docs-"));
    let written = report.delivered_to.clone().expect("Archive should be delivered");
    assert_eq!(written, out.path().join(&report.filename));
    assert_eq!(std::fs::read(&written).unwrap(), report.archive);
    assert!(report.delivery_error.is_none());
}

#[tokio::test]
async fn test_retry_recovers_page_failure() {
    let server = MockServer::start().await;
    let base = server.uri();
    let url = format!("{}/docs/flaky", base);
    Mock::given(method("GET"))
        .and(path("/docs/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Back</h1>"))
        .mount(&server)
        .await;

    let session = Session::new();
    let item = session.record_failure(&url, FailureKind::PageFetch, "http-503", None);

    let config = test_config();
    let outcome = retry_failure(&session, &test_fetcher(&config), &Html2MdConverter, item.id)
        .await
        .unwrap();

    assert!(matches!(outcome, RetryOutcome::Recovered { ref item, .. } if item.url == url));
    assert!(session.failures().is_empty());
    assert_eq!(session.cached_html(&url).as_deref(), Some("<h1>Back</h1>"));
}

#[tokio::test]
async fn test_retry_failure_replaces_item() {
    let server = MockServer::start().await;
    let url = format!("{}/img/still-broken.png", server.uri());
    mount_status(&server, "/img/still-broken.png", 503).await;

    let session = Session::new();
    let item = session.record_failure(&url, FailureKind::ImageDownload, "timeout", None);

    let config = test_config();
    let fetcher = test_fetcher(&config);
    let outcome = retry_failure(&session, &fetcher, &Html2MdConverter, item.id)
        .await
        .unwrap();

    let RetryOutcome::FailedAgain(replacement) = outcome else {
        panic!("expected the retry to fail");
    };
    assert_ne!(replacement.id, item.id);
    assert_eq!(replacement.reason(), "retry-fail:http-503");
    assert_eq!(session.failures(), vec![replacement]);

    assert!(retry_failure(&session, &fetcher, &Html2MdConverter, item.id)
        .await
        .is_err());
}

struct RejectingConverter;

impl docs_md_crawler::export::MarkdownConverter for RejectingConverter {
    fn convert(&self, html: &str) -> Result<String, docs_md_crawler::ConvertError> {
        if html.contains("<h1>Reference</h1>") {
            Err(docs_md_crawler::ConvertError("unbalanced markup".to_string()))
        } else {
            Ok("converted".to_string())
        }
    }
}

#[tokio::test]
async fn test_conversion_failure_skips_only_that_page() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_site(&server).await;

    let config = test_config();
    let pipeline = ExportPipeline::new(
        test_fetcher(&config),
        ExportOptions {
            image_mode: ImageMode::External,
            ..ExportOptions::default()
        },
    )
    .with_converter(Arc::new(RejectingConverter));
    let session = session_for("/docs");

    let report = pipeline
        .run(&session, &pages(&base)[..2])
        .await
        .unwrap();

    assert_eq!(report.outcome, SessionState::Completed);
    assert_eq!(report.pages.len(), 1);
    assert_eq!(report.pages[0].path, "guide/Install Guide.md");
    assert!(zip_text(&report.archive, "api/Reference.md").is_none());

    let summary = zip_text(&report.archive, "SUMMARY.md").unwrap();
    assert!(!summary.contains("Reference"));
    let manifest = zip_text(&report.archive, "failed-urls.txt").unwrap();
    assert!(manifest.contains("markdown-fail:unbalanced markup"));
}

#[tokio::test]
async fn test_retry_conversion_failure_reruns_converter() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_site(&server).await;

    let config = test_config();
    let options = ExportOptions {
        image_mode: ImageMode::External,
        ..ExportOptions::default()
    };
    let rejecting = ExportPipeline::new(test_fetcher(&config), options.clone())
        .with_converter(Arc::new(RejectingConverter));
    let session = session_for("/docs");
    rejecting.run(&session, &pages(&base)[..2]).await.unwrap();

    let item = session.failures().remove(0);
    assert_eq!(item.kind, FailureKind::Markdown);

    // The same converter rejects the page again
    let RetryOutcome::FailedAgain(replacement) = rejecting.retry(&session, item.id).await.unwrap()
    else {
        panic!("expected the conversion to fail again");
    };
    assert_eq!(replacement.reason(), "retry-fail:unbalanced markup");
    assert_eq!(session.failures(), vec![replacement.clone()]);

    // A working converter clears it
    let working = ExportPipeline::new(test_fetcher(&config), options);
    let outcome = working.retry(&session, replacement.id).await.unwrap();
    assert!(matches!(outcome, RetryOutcome::Recovered { bytes, .. } if bytes > 0));
    assert!(session.failures().is_empty());
}

#[tokio::test]
async fn test_page_titled_summary_keeps_its_own_entry() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/docs/summary"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<html><body><article><h1>SUMMARY</h1><p>{}</p></article></body></html>",
            FILLER
        )))
        .mount(&server)
        .await;

    let config = test_config();
    let pipeline = ExportPipeline::new(test_fetcher(&config), ExportOptions::default());
    let report = pipeline
        .run(
            &session_for("/docs"),
            &[DiscoveredPage {
                url: format!("{}/docs/summary", base),
                title: String::new(),
            }],
        )
        .await
        .unwrap();

    assert_eq!(report.pages[0].path, "SUMMARY-2.md");
    assert_eq!(zip_names(&report.archive), vec!["SUMMARY-2.md", "SUMMARY.md"]);
    assert_eq!(
        zip_text(&report.archive, "SUMMARY.md").unwrap(),
        "# Summary\n\n- [SUMMARY](SUMMARY-2.md)\n"
    );
    assert!(zip_text(&report.archive, "SUMMARY-2.md")
        .unwrap()
        .contains("documentation paragraph"));
}
