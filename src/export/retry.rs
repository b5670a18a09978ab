//! Manual retry of recorded failures

use crate::config::ImageMode;
use crate::crawler::Fetcher;
use crate::export::content::{extract_clean_content, RewriteContext};
use crate::export::markdown::MarkdownConverter;
use crate::export::paths::{AssetRegistry, LinkMap};
use crate::state::{FailedItem, FailureKind, Session};
use crate::url::normalize_url;
use crate::{DocsMdError, SessionError};
use url::Url;

/// Result of retrying one failure
#[derive(Debug, Clone)]
pub enum RetryOutcome {
    /// The work succeeded and the failure was removed
    Recovered { item: FailedItem, bytes: usize },
    /// The work failed again; the old item was replaced by this one
    FailedAgain(FailedItem),
}

/// Re-runs the work behind failure `id`
///
/// Image failures are re-downloaded as bytes. Markdown failures are
/// extracted and converted again with `converter`, from the cached HTML when
/// there is any. Everything else is refetched as HTML; a recovered page is
/// stored in the session's HTML cache so the next export reuses it.
pub async fn retry_failure(
    session: &Session,
    fetcher: &Fetcher,
    converter: &dyn MarkdownConverter,
    id: u64,
) -> Result<RetryOutcome, DocsMdError> {
    let item = session
        .failure(id)
        .ok_or(SessionError::UnknownFailure(id))?;
    tracing::info!("Retrying {} ({})", item.url, item.reason());

    let result = match item.kind {
        FailureKind::ImageDownload => fetcher
            .fetch_bytes(&item.url)
            .await
            .map(|b| b.len())
            .map_err(|e| e.to_string()),
        FailureKind::Markdown => match page_html(session, fetcher, &item.url).await {
            Ok(html) => reconvert(&item.url, &html, converter),
            Err(e) => Err(e),
        },
        _ => page_html(session, fetcher, &item.url).await.map(|html| html.len()),
    };

    let removed = session.remove_failure(id)?;
    match result {
        Ok(bytes) => {
            tracing::info!("Recovered {}", removed.url);
            Ok(RetryOutcome::Recovered {
                item: removed,
                bytes,
            })
        }
        Err(reason) => {
            let replacement =
                session.record_failure(&removed.url, FailureKind::Retry, reason, removed.title);
            Ok(RetryOutcome::FailedAgain(replacement))
        }
    }
}

/// Cached HTML for `url`, else a fresh fetch that is cached on success
async fn page_html(session: &Session, fetcher: &Fetcher, url: &str) -> Result<String, String> {
    let key = normalize_url(url).unwrap_or_else(|| url.to_string());
    if let Some(html) = session.cached_html(&key).or_else(|| session.cached_html(url)) {
        return Ok(html);
    }
    let html = fetcher.fetch_text(url).await.map_err(|e| e.to_string())?;
    session.cache_html(&key, html.clone());
    Ok(html)
}

/// Runs extraction and conversion once; returns the Markdown length
///
/// Links are left absolute and images external, since the page's place in
/// the next archive is not known yet.
fn reconvert(url: &str, html: &str, converter: &dyn MarkdownConverter) -> Result<usize, String> {
    let page_url = Url::parse(url).map_err(|e| e.to_string())?;
    let links = LinkMap::new();
    let mut assets = AssetRegistry::new();
    let mut ctx = RewriteContext {
        page_url: &page_url,
        page_path: "",
        links: &links,
        image_mode: ImageMode::External,
        assets: &mut assets,
    };
    let cleaned = extract_clean_content(html, &mut ctx);
    converter
        .convert(&cleaned.html)
        .map(|markdown| markdown.len())
        .map_err(|e| e.0)
}
