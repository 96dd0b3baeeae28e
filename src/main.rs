//! Spindle main entry point
//!
//! This is the command-line interface for the Spindle crawl engine.

use clap::Parser;
use spindle::config::{load_config_with_hash, Config};
use spindle::crawler::{Coordinator, HttpFetcher};
use spindle::output::{print_statistics, print_table_counts};
use spindle::storage::open_storage;
use std::backtrace::Backtrace;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Spindle: a concurrent crawl engine
///
/// Spindle runs the crawl tasks described in a TOML file on a fixed pool of
/// workers, deduplicating requests and storing extracted items in SQLite.
#[derive(Parser, Debug)]
#[command(name = "spindle")]
#[command(version)]
#[command(about = "A concurrent crawl engine", long_about = None)]
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

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show stored item counts from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);
    install_panic_hook();

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
        handle_crawl(config).await?;
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
            0 => EnvFilter::new("spindle=info,warn"),
            1 => EnvFilter::new("spindle=debug,info"),
            2 => EnvFilter::new("spindle=trace,debug"),
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

/// Routes panics through tracing with a stack trace
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = Backtrace::force_capture();
        tracing::error!("{}\n{}", info, backtrace);
    }));
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Spindle Dry Run ===\n");

    println!("Engine Configuration:");
    println!("  Workers: {}", config.engine.worker_count);
    println!("  Minimum body length: {} bytes", config.engine.min_body_length);
    println!("  Result buffer: {}", config.engine.result_buffer);
    println!("  Shutdown grace: {}s", config.engine.shutdown_grace_secs);

    println!("\nFetcher:");
    println!("  User agent: {}", config.fetcher.user_agent);
    println!("  Timeout: {}s", config.fetcher.timeout_secs);

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Batch count: {}", config.storage.batch_count);

    println!("\nTasks ({}):", config.tasks.len());
    for task in &config.tasks {
        println!(
            "  - {} (max depth {}, wait up to {}s, {} seeds{})",
            task.name,
            task.max_depth,
            task.wait_time,
            task.seeds.len(),
            if task.same_host { ", same host" } else { "" }
        );
        for limit in &task.rate_limits {
            println!("    rate limit: {} per {}s", limit.events, limit.per_secs);
        }
        for seed in &task.seeds {
            println!("    * {}", seed);
        }
    }

    // Building the tasks catches anything validation cannot see
    let tasks = spindle::tasks::from_config(config)?;

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling {} tasks with {} seed URLs",
        tasks.len(),
        config.tasks.iter().map(|t| t.seeds.len()).sum::<usize>()
    );

    Ok(())
}

/// Handles the --stats mode: shows stored item counts from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_storage(
        Path::new(&config.storage.database_path),
        config.storage.batch_count,
    )?;
    let counts = storage.count_by_table()?;

    print_table_counts(&counts);

    Ok(())
}

/// Handles the main crawl operation
///
/// Runs until the crawl drains or Ctrl-C is received, then gives in-flight
/// work the configured grace period before reporting.
async fn handle_crawl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let tasks = spindle::tasks::from_config(&config)?;
    let seed_count: usize = config.tasks.iter().map(|t| t.seeds.len()).sum();
    tracing::info!("Tasks: {}, seed URLs: {}", tasks.len(), seed_count);

    let storage = open_storage(
        Path::new(&config.storage.database_path),
        config.storage.batch_count,
    )?;
    let fetcher = HttpFetcher::new(&config.fetcher)?;

    let mut engine = Coordinator::builder()
        .config(config.engine.clone())
        .fetcher(Arc::new(fetcher))
        .storage(storage)
        .seeds(tasks)
        .build()?;

    engine.run()?;

    tokio::select! {
        _ = engine.wait_until_idle() => {
            tracing::info!("Crawl drained");
        }
        _ = interrupted(tokio::signal::ctrl_c()) => {
            tracing::info!("Interrupted, stopping crawl");
        }
    }

    engine.shutdown();

    let grace = Duration::from_secs(config.engine.shutdown_grace_secs);
    if tokio::time::timeout(grace, engine.join()).await.is_err() {
        tracing::warn!(
            "Workers did not stop within {}s, exiting anyway",
            grace.as_secs()
        );
    }

    println!();
    print_statistics(&engine.stats());

    Ok(())
}

/// Resolves when `signal` reports an interrupt
///
/// If the signal cannot be installed this never resolves, leaving the crawl
/// to end on its own.
async fn interrupted<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        tracing::error!("Failed to listen for Ctrl-C, waiting for the crawl to drain: {}", e);
        std::future::pending::<()>().await;
    }
}
