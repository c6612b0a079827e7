use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use hl_config::LookbackConfig;
use hl_core::event::PageId;
use hl_runtime::service::{HistoryService, PageHit, sort_hits};
use hl_runtime::tracing_init::{WorkerGuard, init_tracing};

#[derive(Parser)]
#[command(name = "history-lookback", about = "Most recent activity per page from browsing history")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct WindowArgs {
    /// Path to lookback.toml config file
    #[arg(short, long)]
    config: PathBuf,
    /// Window start, epoch milliseconds (default: 0)
    #[arg(long)]
    start: Option<i64>,
    /// Window end, epoch milliseconds (default: now)
    #[arg(long)]
    end: Option<i64>,
    /// Only consider bookmarked pages
    #[arg(long)]
    bookmarks_only: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one page of pages ordered by their latest activity
    Query {
        #[command(flatten)]
        window: WindowArgs,
        /// Number of leading results to skip
        #[arg(long, default_value_t = 0)]
        skip: usize,
        /// Page size (default: query.default_limit)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the latest activity of specific pages
    Resolve {
        #[command(flatten)]
        window: WindowArgs,
        /// Page to resolve; repeat for several
        #[arg(long = "page", required = true)]
        pages: Vec<String>,
    },
}

/// Load config, set up logging, and bootstrap the service.
fn open(config: &Path) -> Result<(HistoryService, Option<WorkerGuard>)> {
    let config_path = config
        .canonicalize()
        .map_err(|e| anyhow::anyhow!("config path '{}': {e}", config.display()))?;
    let lookback = LookbackConfig::load(&config_path)?;
    let base_dir = config_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("config path has no parent directory"))?;

    let guard = init_tracing(&lookback.logging, base_dir)?;
    let service =
        HistoryService::from_config(&lookback, base_dir).map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok((service, guard))
}

fn print_hits(hits: &[PageHit]) -> Result<()> {
    let mut out = std::io::stdout().lock();
    for hit in hits {
        serde_json::to_writer(&mut out, hit)?;
        writeln!(out)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Query {
            window,
            skip,
            limit,
        } => {
            let (service, _guard) = open(&window.config)?;
            let spec = service.spec(
                service.window(window.start, window.end),
                skip,
                limit,
                window.bookmarks_only,
            );
            let hits = service
                .page(&spec)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            tracing::info!(domain = "query", hits = hits.len(), "query finished");
            print_hits(&hits)?;
        }
        Commands::Resolve { window, pages } => {
            let (service, _guard) = open(&window.config)?;
            let pages: HashSet<PageId> = pages.into_iter().map(PageId::from).collect();
            let mapping = service
                .refresh(
                    service.window(window.start, window.end),
                    window.bookmarks_only,
                    &pages,
                )
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            tracing::info!(domain = "query", resolved = mapping.len(), "resolve finished");
            print_hits(&sort_hits(mapping))?;
        }
    }

    Ok(())
}
