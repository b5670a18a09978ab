//! Fetch, convert and package discovered pages
//!
//! The pipeline runs in stages over a caller-chosen page list:
//!
//! 1. Fetch HTML concurrently, reusing the discovery cache
//! 2. Assign every fetched page a unique archive path
//! 3. Extract, rewrite and convert each page to Markdown
//! 4. Download queued images (local image mode only)
//! 5. Package Markdown, images, `SUMMARY.md` and `failed-urls.txt`
//!
//! Per-page failures are recorded on the session and never abort the batch.
//! Only an unrecoverable archive failure does.

use crate::archive::{ArchiveEncoder, EncoderTier, ZipEntry};
use crate::config::{Config, ExportConfig, ImageMode};
use crate::crawler::{clean_text, extract_page_title, run_bounded, title_from_url, Fetcher};
use crate::export::content::{extract_clean_content, ImageJob, RewriteContext};
use crate::export::delivery::{archive_filename, Delivery, DeliveryChain};
use crate::export::markdown::{compose_document, Html2MdConverter, MarkdownConverter};
use crate::export::paths::{link_map, AssetRegistry, OutputPathBuilder};
use crate::export::retry::{retry_failure, RetryOutcome};
use crate::output::format_summary;
use crate::state::{Checkpoint, DiscoveredPage, FailureKind, Session, SessionState};
use crate::url::{extract_host, normalize_url};
use crate::{DocsMdError, FetchError};
use chrono::Utc;
use scraper::Html;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

pub const SUMMARY_FILE: &str = "SUMMARY.md";
pub const FAILURE_MANIFEST_FILE: &str = "failed-urls.txt";

/// Export knobs
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub image_mode: ImageMode,
    pub page_concurrency: usize,
    pub image_concurrency: usize,
    pub include_summary: bool,
}

impl ExportOptions {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            image_mode: config.image_mode,
            page_concurrency: config.page_concurrency,
            image_concurrency: config.image_concurrency,
            include_summary: config.include_summary,
        }
    }
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

/// One page written into the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedPage {
    pub url: String,
    pub title: String,
    pub path: String,
}

/// Result of a finished (or stopped) export
#[derive(Debug, Clone)]
pub struct ExportReport {
    /// The ZIP file, also kept when delivery fails
    pub archive: Vec<u8>,
    pub filename: String,
    pub tier: EncoderTier,
    pub pages: Vec<ExportedPage>,
    /// Images stored in the archive
    pub images: usize,
    /// Outstanding failures when the archive was packed
    pub failed: usize,
    /// `Completed` or `Stopped`
    pub outcome: SessionState,
    pub delivered_to: Option<PathBuf>,
    pub delivery_error: Option<String>,
}

/// A fetched page waiting for conversion
struct PageDraft {
    url: String,
    title: String,
    html: String,
    path: String,
}

enum Fetched {
    Page {
        page: DiscoveredPage,
        html: String,
        title: Option<String>,
        from_cache: bool,
    },
    Failed {
        page: DiscoveredPage,
        error: FetchError,
    },
    Stopped,
}

enum Downloaded {
    Image { job: ImageJob, bytes: Vec<u8> },
    Failed { job: ImageJob, error: FetchError },
    Stopped,
}

pub struct ExportPipeline {
    fetcher: Fetcher,
    options: ExportOptions,
    converter: Arc<dyn MarkdownConverter>,
    encoder: ArchiveEncoder,
    delivery: Option<Arc<dyn Delivery>>,
}

impl ExportPipeline {
    /// Pipeline with the default converter and encoder and no delivery
    pub fn new(fetcher: Fetcher, options: ExportOptions) -> Self {
        Self {
            fetcher,
            options,
            converter: Arc::new(Html2MdConverter),
            encoder: ArchiveEncoder::from_config(&ExportConfig::default()),
            delivery: None,
        }
    }

    /// Pipeline configured from `config`, delivering into `export.output-dir`
    pub fn from_config(fetcher: Fetcher, config: &Config) -> Self {
        Self::new(fetcher, ExportOptions::from_config(&config.export))
            .with_encoder(ArchiveEncoder::from_config(&config.export))
            .with_delivery(Arc::new(DeliveryChain::new(&config.export.output_dir)))
    }

    pub fn with_converter(mut self, converter: Arc<dyn MarkdownConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_encoder(mut self, encoder: ArchiveEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_delivery(mut self, delivery: Arc<dyn Delivery>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Retries failure `id` with this pipeline's fetcher and converter
    pub async fn retry(&self, session: &Session, id: u64) -> Result<RetryOutcome, DocsMdError> {
        retry_failure(session, &self.fetcher, self.converter.as_ref(), id).await
    }

    /// Exports `pages` into one ZIP archive
    ///
    /// Paths are laid out below the session's docs root and the archive is
    /// named after the session's site name hint. A stop request skips the
    /// remaining fetches and downloads and still packs what was converted.
    pub async fn run(
        &self,
        session: &Session,
        pages: &[DiscoveredPage],
    ) -> Result<ExportReport, DocsMdError> {
        let guard = session.begin(SessionState::Exporting)?;

        // Failures of an earlier export are superseded by this one
        for stale in session.failures() {
            if stale.kind != FailureKind::Discover {
                session.remove_failure(stale.id)?;
            }
        }

        tracing::info!("Exporting {} page(s)", pages.len());
        session.set_progress(|p| p.queued = pages.len());

        let drafts = self.fetch_stage(session, pages).await;
        let (drafts, mut exported) = assign_paths(&session.docs_root(), drafts);

        let mut entries = Vec::new();
        let jobs = self.convert_stage(session, &drafts, &exported, &mut entries).await;
        drop(drafts);

        // Pages that failed conversion or were skipped by a stop have no file
        let written: HashSet<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        exported.retain(|p| written.contains(p.path.as_str()));

        let images = if self.options.image_mode == ImageMode::Local && !jobs.is_empty() {
            self.image_stage(session, jobs, &mut entries).await
        } else {
            0
        };

        if self.options.include_summary {
            let summary = format_summary(exported.iter().map(|p| (p.title.as_str(), p.path.as_str())));
            entries.push(ZipEntry::text(SUMMARY_FILE, summary));
        }
        let failed = session.failures().len();
        if let Some(manifest) = session.failure_manifest() {
            entries.push(ZipEntry::text(FAILURE_MANIFEST_FILE, manifest));
        }

        tracing::info!("Packing {} archive entries", entries.len());
        let packed = self.encoder.pack(entries).await?;

        let host = pages
            .first()
            .and_then(|p| Url::parse(&p.url).ok())
            .and_then(|u| extract_host(&u));
        let filename = archive_filename(session.site_name().as_deref(), host.as_deref(), Utc::now());

        let (delivered_to, delivery_error) = match &self.delivery {
            Some(delivery) => match delivery.deliver(&packed.bytes, &filename).await {
                Ok(path) => (Some(path), None),
                Err(e) => {
                    tracing::warn!("Archive delivery failed: {}", e);
                    (None, Some(e.to_string()))
                }
            },
            None => (None, None),
        };

        let outcome = if session.is_stop_requested() {
            SessionState::Stopped
        } else {
            SessionState::Completed
        };
        session.set_progress(|p| {
            p.queued = 0;
            p.current = None;
        });
        guard.finish(outcome)?;

        tracing::info!(
            "Export {}: {} page(s), {} image(s), {} failure(s), {} bytes via {} tier",
            outcome,
            exported.len(),
            images,
            failed,
            packed.bytes.len(),
            packed.tier
        );

        Ok(ExportReport {
            archive: packed.bytes,
            filename,
            tier: packed.tier,
            pages: exported,
            images,
            failed,
            outcome,
            delivered_to,
            delivery_error,
        })
    }

    async fn fetch_stage(&self, session: &Session, pages: &[DiscoveredPage]) -> Vec<PageDraft> {
        let results = run_bounded(pages.to_vec(), self.options.page_concurrency, |_, page| async move {
            if session.checkpoint().await == Checkpoint::Stop {
                return Fetched::Stopped;
            }
            session.set_progress(|p| p.current = Some(page.url.clone()));

            let cached = session.cached_html(&page.url);
            let from_cache = cached.is_some();
            let html = match cached {
                Some(html) => html,
                None => {
                    let fetched = self.fetcher.fetch_text(&page.url).await;
                    match fetched {
                        Ok(html) => html,
                        Err(error) => return Fetched::Failed { page, error },
                    }
                }
            };
            let title = extract_title(&html);
            Fetched::Page {
                page,
                html,
                title,
                from_cache,
            }
        })
        .await;

        let mut drafts = Vec::new();
        let mut total_bytes = 0;
        for result in results {
            match result {
                Fetched::Page {
                    page,
                    html,
                    title,
                    from_cache,
                } => {
                    tracing::debug!(
                        "Fetched {} ({} bytes{})",
                        page.url,
                        html.len(),
                        if from_cache { ", cached" } else { "" }
                    );
                    total_bytes += html.len();
                    let title = title
                        .or_else(|| Some(page.title.clone()).filter(|t| !t.is_empty()))
                        .unwrap_or_else(|| title_from_url(&page.url));
                    drafts.push(PageDraft {
                        url: page.url,
                        title,
                        html,
                        path: String::new(),
                    });
                }
                Fetched::Failed { page, error } => {
                    session.record_failure(
                        &page.url,
                        FailureKind::PageFetch,
                        error.to_string(),
                        Some(page.title),
                    );
                }
                Fetched::Stopped => {}
            }
        }
        tracing::info!("Fetched {} page(s), {} bytes of HTML", drafts.len(), total_bytes);
        drafts
    }

    async fn convert_stage(
        &self,
        session: &Session,
        drafts: &[PageDraft],
        exported: &[ExportedPage],
        entries: &mut Vec<ZipEntry>,
    ) -> Vec<ImageJob> {
        let links = link_map(exported.iter().map(|p| (p.url.as_str(), p.path.as_str())));
        let mut assets = AssetRegistry::new();
        let mut jobs = Vec::new();

        for (index, draft) in drafts.iter().enumerate() {
            if session.checkpoint().await == Checkpoint::Stop {
                tracing::info!("Stop requested, skipping {} unconverted page(s)", drafts.len() - index);
                break;
            }
            let Ok(page_url) = Url::parse(&draft.url) else {
                continue;
            };

            let cleaned = {
                let mut ctx = RewriteContext {
                    page_url: &page_url,
                    page_path: &draft.path,
                    links: &links,
                    image_mode: self.options.image_mode,
                    assets: &mut assets,
                };
                extract_clean_content(&draft.html, &mut ctx)
            };

            match self.converter.convert(&cleaned.html) {
                Ok(markdown) => {
                    let document = compose_document(&draft.title, &draft.url, &markdown);
                    entries.push(ZipEntry::text(draft.path.clone(), document));
                    jobs.extend(cleaned.images);
                }
                Err(e) => {
                    session.record_failure(
                        &draft.url,
                        FailureKind::Markdown,
                        e.0,
                        Some(draft.title.clone()),
                    );
                }
            }
            session.set_progress(|p| {
                p.done = index + 1;
                p.current = Some(draft.path.clone());
            });
        }
        jobs
    }

    async fn image_stage(
        &self,
        session: &Session,
        jobs: Vec<ImageJob>,
        entries: &mut Vec<ZipEntry>,
    ) -> usize {
        tracing::info!("Downloading {} image(s)", jobs.len());
        let results = run_bounded(jobs, self.options.image_concurrency, |_, job| async move {
            if session.checkpoint().await == Checkpoint::Stop {
                return Downloaded::Stopped;
            }
            let fetched = self.fetcher.fetch_bytes(&job.url).await;
            match fetched {
                Ok(bytes) => Downloaded::Image { job, bytes },
                Err(error) => Downloaded::Failed { job, error },
            }
        })
        .await;

        let mut stored = 0;
        for result in results {
            match result {
                Downloaded::Image { job, bytes } => {
                    entries.push(ZipEntry::new(job.path, bytes));
                    stored += 1;
                }
                Downloaded::Failed { job, error } => {
                    session.record_failure(&job.url, FailureKind::ImageDownload, error.to_string(), None);
                }
                Downloaded::Stopped => {}
            }
        }
        stored
    }
}

/// H1 or `<title>` of a fetched page, whitespace-collapsed
fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    extract_page_title(&document)
        .map(|t| clean_text(&t))
        .filter(|t| !t.is_empty())
}

/// Gives every draft its archive path, in input order
fn assign_paths(docs_root: &str, mut drafts: Vec<PageDraft>) -> (Vec<PageDraft>, Vec<ExportedPage>) {
    let mut builder = OutputPathBuilder::new(docs_root);
    builder.reserve(SUMMARY_FILE);
    builder.reserve(FAILURE_MANIFEST_FILE);
    let mut exported = Vec::with_capacity(drafts.len());
    for draft in &mut drafts {
        draft.path = builder.build(&draft.url, &draft.title);
        exported.push(ExportedPage {
            url: normalize_url(&draft.url).unwrap_or_else(|| draft.url.clone()),
            title: draft.title.clone(),
            path: draft.path.clone(),
        });
    }
    (drafts, exported)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(url: &str, title: &str) -> PageDraft {
        PageDraft {
            url: url.to_string(),
            title: title.to_string(),
            html: String::new(),
            path: String::new(),
        }
    }

    #[test]
    fn test_assign_paths_is_unique_and_ordered() {
        let (drafts, exported) = assign_paths(
            "/docs",
            vec![
                draft("https://e.com/docs/guide/a", "Intro"),
                draft("https://e.com/docs/guide/b", "Intro"),
                draft("https://e.com/docs/api/c", "C"),
            ],
        );
        let paths: Vec<&str> = exported.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["guide/Intro.md", "guide/Intro-2.md", "api/C.md"]);
        assert_eq!(drafts[1].path, "guide/Intro-2.md");
    }

    #[test]
    fn test_assign_paths_skips_generated_files() {
        let (_, exported) = assign_paths(
            "/docs",
            vec![
                draft("https://e.com/docs/summary", "SUMMARY"),
                draft("https://e.com/docs/toc", "SUMMARY"),
            ],
        );
        let paths: Vec<&str> = exported.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["SUMMARY-2.md", "SUMMARY-3.md"]);
    }

    #[test]
    fn test_extract_title_prefers_h1() {
        assert_eq!(
            extract_title("<html><head><title>Site</title></head><body><h1> Getting\n Started </h1></body></html>"),
            Some("Getting Started".to_string())
        );
        assert_eq!(extract_title("<html><body><p>x</p></body></html>"), None);
    }
}
