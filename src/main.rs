//! # Herald Watch
//!
//! Watches the official developer post tracker and a game news feed, picks
//! out what matters, and announces each item exactly once.
//!
//! ## Features
//!
//! - Layered extraction (embedded JSON, page structure, plain text, static
//!   fallback) so a layout change degrades output instead of breaking it
//! - Keyword relevance and reset-priority classification
//! - Persistent per-source dedup with first-run spam suppression
//! - Interval monitors and weekly clock-time digests
//! - JSON-lines output per channel, or stdout
//!
//! ## Usage
//!
//! ```sh
//! herald_watch --config herald.yaml run
//! herald_watch latest posts
//! ```
//!
//! ## Architecture
//!
//! Each scheduled monitor runs one pass of the pipeline:
//! 1. **Fetching**: Download the source's listing page
//! 2. **Extraction**: Turn the page into items, first successful tier wins
//! 3. **Filtering**: Drop other regions and irrelevant items
//! 4. **Dedup**: Keep only items never delivered before, and record them
//! 5. **Output**: Hand new items to the sink

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cache;
mod cli;
mod config;
mod digest;
mod fetcher;
mod models;
mod outputs;
mod pipeline;
mod relevance;
mod scheduler;
mod scrapers;
mod sources;
mod utils;

use cli::{Cli, Command};
use config::Config;
use fetcher::Fetcher;
use outputs::json::JsonSink;
use outputs::Notification;
use pipeline::Herald;
use scheduler::Scheduler;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("herald_watch starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.command, ?args.config, "Parsed CLI arguments");

    // ---- Load config ----
    let config = Config::load(args.config.as_deref())
        .await?
        .with_overrides(args.cache_dir, args.output_dir, args.region);

    // Early check: the cache dir (and output dir, if any) must be writable
    if let Err(e) = ensure_writable_dir(&config.cache_dir).await {
        error!(
            path = %config.cache_dir.display(),
            error = %e,
            "Cache directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }
    if let Some(dir) = &config.output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir.display(), error = %e, "Output directory is not writable");
            return Err(e);
        }
    }

    let entries = config.schedule_entries()?;
    let tick = config.tick_period();
    let fetcher = Fetcher::from_config(&config)?;
    let sink = JsonSink::new(config.output_dir.clone());
    let herald = Herald::new(config, fetcher, sink);

    match args.command {
        Command::Run => {
            let mut scheduler = Scheduler::new(entries, tick);
            scheduler.run(&herald, shutdown_signal()).await;
        }
        Command::Check { source } => {
            let mut items = herald.check_new(source).await?.items;
            if items.is_empty() {
                info!(%source, "No new items");
            } else {
                herald.attach_banners(source, &mut items).await;
                herald.deliver(Notification::NewItems { source, items }).await?;
            }
        }
        Command::Latest { source } => {
            let items = herald.latest(source).await?;
            info!(%source, count = items.len(), "Latest items");
            herald.deliver(Notification::Latest { source, items }).await?;
        }
        Command::Reset { source } => {
            let existed = herald.reset(source).await?;
            info!(%source, existed, "Cache reset");
        }
        Command::Digest { kind } => {
            let digest = herald.digest(kind).await;
            herald.deliver(Notification::Digest(digest)).await?;
        }
        Command::Test { source } => {
            let diag = herald.diagnose(source).await?;
            info!(
                %source,
                strategy = ?diag.strategy,
                extracted = diag.extracted,
                relevant = diag.relevant,
                priority = diag.priority,
                synthetic = diag.synthetic,
                first_run = diag.first_run,
                "Source diagnostics"
            );
            println!("{}", serde_json::to_string_pretty(&diag)?);
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

/// Resolves on Ctrl-C. If the signal handler cannot be installed, never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C; run until killed");
        std::future::pending::<()>().await;
    }
}
