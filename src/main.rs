//! Bookwatch main entry point
//!
//! This is the command-line interface for the Bookwatch catalogue crawler.

use bookwatch::config::load_config_with_hash;
use bookwatch::Engine;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Bookwatch: a resumable book-catalogue crawler
///
/// Bookwatch crawls a book catalogue site, persists one record per book,
/// and logs every change to a record across runs. An interrupted run
/// resumes from its persisted work queue.
#[derive(Parser, Debug)]
#[command(name = "bookwatch")]
#[command(version = "1.0.0")]
#[command(about = "A resumable book-catalogue crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh pass, discarding any persisted queue
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("bookwatch=info,warn"),
            1 => EnvFilter::new("bookwatch=debug,info"),
            2 => EnvFilter::new("bookwatch=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &bookwatch::Config) -> anyhow::Result<()> {
    println!("=== Bookwatch Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Max attempts: {}", config.crawler.max_attempts);
    println!("  Backoff base: {}ms", config.crawler.backoff_base_ms);
    println!(
        "  Request timeout: {}s",
        config.crawler.request_timeout_secs
    );

    println!("\nSite:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  First catalogue page: {}", config.site.catalogue_url(1));
    if config.site.block_page_title.is_empty() {
        println!("  Block detection: disabled");
    } else {
        println!("  Block page title: {:?}", config.site.block_page_title);
    }

    println!("\nAnti-blocking:");
    println!("  Proxies configured: {}", config.proxy.len());
    println!(
        "  Browser fallback: {}",
        if config.browser.enabled {
            "enabled"
        } else {
            "disabled"
        }
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    match &config.output.snapshot_dir {
        Some(dir) => println!("  Snapshots: {}", dir),
        None => println!("  Snapshots: disabled"),
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would seed from: {}", config.site.catalogue_url(1));

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &bookwatch::Config) -> anyhow::Result<()> {
    use bookwatch::storage::{SqliteStore, Store};
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let store = SqliteStore::new(
        Path::new(&config.output.database_path),
        config.storage.unique_content_hash,
    )?;

    let counts = store.queue_counts()?;
    println!("Work queue:");
    println!("  Pending: {}", counts.pending);
    println!("  Done: {}", counts.done);

    println!("\nRecords: {}", store.count_records()?);
    println!("Changes logged: {}", store.count_changes()?);

    let recent = store.list_changes(5)?;
    if !recent.is_empty() {
        println!("\nMost recent changes:");
        for change in recent {
            println!("  record {} at {}", change.record_id, change.changed_at);
        }
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: bookwatch::Config,
    fresh: bool,
) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh pass (discarding previous queue)");
    } else {
        tracing::info!("Starting pass (will resume if interrupted run exists)");
    }

    let engine = Engine::launch(config, fresh).await?;

    match engine.run_pass().await {
        Ok(()) => {
            tracing::info!("Pass completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Pass failed: {}", e);
            Err(e.into())
        }
    }
}
