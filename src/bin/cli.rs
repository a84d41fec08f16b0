//! Competitor intelligence crawler CLI
//!
//! Local execution entry point. State lives under `--storage-dir`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use intel_crawler::{
    config::{load_all, sources_path},
    error::Result,
    models::{Freshness, Source},
    pipeline::{self, CrawlBudget, CrawlContext, CrawlControl},
    storage::LocalStorage,
};

/// Watches competitor release notes and docs for capability changes
#[derive(Parser, Debug)]
#[command(
    name = "intel-crawler",
    version,
    about = "Competitor change-feed crawler"
)]
struct Cli {
    /// Path to storage directory containing config files and state
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover sources from competitor homepages
    Discover {
        #[arg(long, default_value_t = 3)]
        priority: u8,

        /// Re-discover competitors that already have sources
        #[arg(long)]
        force: bool,
    },

    /// List crawlable sources
    Sources {
        #[arg(long, default_value_t = 3)]
        priority: u8,
    },

    /// Crawl documentation sources for changes
    Crawl {
        #[arg(long, default_value_t = 1)]
        priority: u8,

        #[arg(long)]
        max_urls: Option<usize>,

        #[arg(long)]
        max_competitors: Option<usize>,
    },

    /// Ingest recent web and news search results
    Search {
        #[arg(long, default_value_t = 1)]
        priority: u8,

        /// day, week, month or year
        #[arg(long, default_value = "week")]
        freshness: Freshness,

        #[arg(long)]
        max_competitors: Option<usize>,
    },

    /// Show the most recent events
    Events {
        #[arg(long, default_value_t = 20)]
        limit: usize,

        /// Include summary bullets and evidence
        #[arg(long)]
        verbose: bool,
    },

    /// Show checkpoint and event store summary
    Status,

    /// Show monitored competitors and their sources
    Competitors {
        #[arg(long, default_value_t = 3)]
        priority: u8,
    },

    /// Validate configuration files
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel the run on Ctrl-C; sources already started are finished.
fn cancel_on_ctrl_c(control: &CrawlControl) {
    let control = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received; finishing in-flight sources");
            control.cancel();
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Command::Validate = cli.command {
        return pipeline::run_validate(&cli.storage_dir).await;
    }

    let (config, registry) = load_all(&cli.storage_dir).await?;
    log::debug!("Loaded configuration from {}", cli.storage_dir.display());

    let storage = Arc::new(LocalStorage::open(&cli.storage_dir).await?);
    let ctx = CrawlContext::from_env(config, registry, storage.clone())?;

    match cli.command {
        Command::Discover { priority, force } => {
            cancel_on_ctrl_c(&ctx.control);
            let sources = pipeline::run_discovery(&ctx, priority, force).await?;

            let path = sources_path(&cli.storage_dir);
            Source::save_all(&path, &sources).await?;
            log::info!("Saved {} sources to {}", sources.len(), path.display());
        }

        Command::Sources { priority } => {
            let sources = pipeline::list_sources(&ctx.registry, priority);
            for source in &sources {
                println!(
                    "{:<12} {:<14} {:<40} {}",
                    source.competitor,
                    source.kind.as_str(),
                    source.label,
                    source.url
                );
            }
            log::info!("{} sources", sources.len());
        }

        Command::Crawl {
            priority,
            max_urls,
            max_competitors,
        } => {
            cancel_on_ctrl_c(&ctx.control);
            let budget = CrawlBudget {
                max_priority: priority,
                max_urls,
                max_competitors,
            };
            let stats = pipeline::run_crawl(&ctx, &budget).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Command::Search {
            priority,
            freshness,
            max_competitors,
        } => {
            cancel_on_ctrl_c(&ctx.control);
            let budget = CrawlBudget {
                max_priority: priority,
                max_urls: None,
                max_competitors,
            };
            let stats = pipeline::run_search_crawl(&ctx, &budget, freshness).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Command::Events { limit, verbose } => {
            let events = pipeline::list_recent_events(storage.as_ref(), limit).await?;
            if events.is_empty() {
                log::info!("No events recorded yet.");
            }
            for event in &events {
                println!(
                    "{}",
                    event.format("[{date}] {competitor} | {change_type} | {theme} | {claim}")
                );
                if verbose {
                    for bullet in &event.summary {
                        println!("    - {}", bullet);
                    }
                    println!("    {}", event.evidence_url);
                }
            }
        }

        Command::Status => {
            let status = pipeline::crawl_status(storage.as_ref()).await?;
            log::info!("Storage directory: {}", cli.storage_dir.display());
            log::info!("URLs tracked: {}", status.urls_tracked);
            log::info!("Chunks tracked: {}", status.chunks_tracked);
            match status.updated_at {
                Some(updated) => log::info!("Last updated: {}", updated.to_rfc3339()),
                None => log::info!("No crawl checkpoint yet."),
            }
            log::info!("Events stored: {}", status.event_count);
        }

        Command::Competitors { priority } => {
            let entries = pipeline::competitor_registry(&ctx.registry, priority);
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }

        Command::Validate => {}
    }

    Ok(())
}
