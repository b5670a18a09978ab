//! docs-md-crawler main entry point
//!
//! This is the command-line interface for the documentation exporter.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use docs_md_crawler::config::{
    load_config_with_hash, validate, Config, DiscoveryMode, ImageMode,
};
use docs_md_crawler::crawler::{build_fetcher, DiscoveryEngine, DiscoveryOptions};
use docs_md_crawler::export::ExportPipeline;
use docs_md_crawler::output::{print_statistics, SessionStatistics};
use docs_md_crawler::{Session, SessionEvent, SessionState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// docs-md-crawler: export a documentation site as a Markdown ZIP
///
/// Discovers the pages of a documentation site starting from one page,
/// converts each to Markdown with working cross-links and packs them into a
/// single archive. Type `pause`, `resume` or `stop` on stdin while it runs.
#[derive(Parser, Debug)]
#[command(name = "docs-md-crawler")]
#[command(version)]
#[command(about = "Export a documentation site as a Markdown ZIP", long_about = None)]
struct Cli {
    /// Page to start discovery from
    #[arg(value_name = "START_URL")]
    start_url: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Discovery mode
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Documentation root path, e.g. /docs (inferred when omitted)
    #[arg(long, value_name = "PATH")]
    root: Option<String>,

    /// Upper bound on discovered pages
    #[arg(long)]
    max_pages: Option<usize>,

    /// Maximum crawl depth in deep mode
    #[arg(long)]
    max_depth: Option<u32>,

    /// What to do with images
    #[arg(long, value_enum)]
    image_mode: Option<ImageModeArg>,

    /// Directory the archive is written to
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Discover and list pages without exporting
    #[arg(long)]
    scan_only: bool,

    /// Extra exclude substring (repeatable)
    #[arg(long = "exclude", value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    DirectoryOnly,
    Deep,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ImageModeArg {
    External,
    Local,
    None,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = load_effective_config(&cli)?;
    let session = Arc::new(Session::new());

    spawn_event_logger(&session);
    spawn_stdin_control(&session);
    spawn_interrupt_handler(&session);

    let fetcher = build_fetcher(&config).context("could not build HTTP client")?;
    let engine = DiscoveryEngine::new(fetcher.clone(), DiscoveryOptions::from_config(&config));

    let report = engine
        .discover(&session, &cli.start_url)
        .await
        .with_context(|| format!("discovery from {} failed", cli.start_url))?;

    if cli.scan_only || report.outcome == SessionState::Stopped {
        for page in &report.pages {
            println!("{}\t{}", page.url, page.title);
        }
        if !cli.quiet {
            print_statistics(&SessionStatistics::collect(&session));
        }
        return Ok(());
    }

    if report.pages.is_empty() {
        bail!("no pages discovered from {}", cli.start_url);
    }

    let pipeline = ExportPipeline::from_config(fetcher, &config);
    let export = pipeline
        .run(&session, &report.pages)
        .await
        .context("export failed")?;

    if !cli.quiet {
        print_statistics(&SessionStatistics::collect(&session));
    }

    match (&export.delivered_to, &export.delivery_error) {
        (Some(path), _) => {
            println!("✓ {} page(s) exported to {}", export.pages.len(), path.display());
            Ok(())
        }
        (None, Some(error)) => bail!(
            "archive {} ({} bytes) could not be saved: {}",
            export.filename,
            export.archive.len(),
            error
        ),
        (None, None) => Ok(()),
    }
}

/// Loads the config file (if any) and applies command-line overrides
fn load_effective_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };

    if let Some(mode) = cli.mode {
        config.crawler.mode = match mode {
            ModeArg::DirectoryOnly => DiscoveryMode::DirectoryOnly,
            ModeArg::Deep => DiscoveryMode::Deep,
        };
    }
    if let Some(root) = &cli.root {
        config.crawler.root_path = Some(root.clone());
    }
    if let Some(max_pages) = cli.max_pages {
        config.crawler.max_pages = max_pages;
    }
    if let Some(max_depth) = cli.max_depth {
        config.crawler.max_depth = max_depth;
    }
    if let Some(image_mode) = cli.image_mode {
        config.export.image_mode = match image_mode {
            ImageModeArg::External => ImageMode::External,
            ImageModeArg::Local => ImageMode::Local,
            ImageModeArg::None => ImageMode::None,
        };
    }
    if let Some(out) = &cli.out {
        config.export.output_dir = out.display().to_string();
    }
    config
        .crawler
        .exclude_patterns
        .extend(cli.exclude.iter().cloned());

    validate(&config).context("invalid configuration")?;
    Ok(config)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docs_md_crawler=info,warn"),
            1 => EnvFilter::new("docs_md_crawler=debug,info"),
            2 => EnvFilter::new("docs_md_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Renders session events as log lines
fn spawn_event_logger(session: &Arc<Session>) {
    let mut events = session.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::PageDiscovered(page)) => {
                    tracing::debug!("Discovered {} ({})", page.url, page.title);
                }
                Ok(SessionEvent::Progress(p)) => {
                    tracing::trace!(
                        "found {} queued {} done {} failed {}{}",
                        p.found,
                        p.queued,
                        p.done,
                        p.failed,
                        p.current.map(|c| format!(" at {}", c)).unwrap_or_default()
                    );
                }
                Ok(SessionEvent::StateChanged { from, to }) => {
                    tracing::debug!("{} -> {}", from, to);
                }
                Ok(SessionEvent::Paused) => {
                    tracing::info!("Paused; type `resume` to continue or `stop` to finish early")
                }
                Ok(SessionEvent::Resumed) => tracing::info!("Resumed"),
                // Already logged where it was recorded
                Ok(SessionEvent::FailureRecorded(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::trace!("Event logger skipped {} event(s)", n);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Forwards `pause`, `resume` and `stop` lines from stdin to the session
fn spawn_stdin_control(session: &Arc<Session>) {
    let session = session.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match line.trim().to_ascii_lowercase().as_str() {
                "pause" | "p" => session.request_pause(),
                "resume" | "r" => session.resume(),
                "stop" | "s" => session.request_stop(),
                "" => {}
                other => tracing::warn!("Unknown command {:?} (use pause, resume or stop)", other),
            }
        }
    });
}

/// Ctrl-C requests a cooperative stop; partial results are still packed
fn spawn_interrupt_handler(session: &Arc<Session>) {
    let session = session.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after in-flight work");
            session.request_stop();
        }
    });
}
