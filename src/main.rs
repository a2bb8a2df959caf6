//! Keyspace Harvester main entry point
//!
//! This is the command-line interface for the quota-aware enumeration crawler.

use anyhow::{bail, Context};
use clap::Parser;
use keyspace_harvester::config::{load_config_with_hash, Config};
use keyspace_harvester::crawler::{run_harvest, RunOptions};
use keyspace_harvester::credentials::load_credentials;
use keyspace_harvester::output::{print_report, print_statistics, snapshot_statistics};
use keyspace_harvester::storage::{open_snapshot_store, SnapshotError, SnapshotStore};
use keyspace_harvester::HarvestError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Keyspace Harvester: a quota-aware enumeration crawler
///
/// Discovers every entity reachable through a top-K search endpoint by
/// expanding query prefixes and probing structured keys, spreading requests
/// over a pool of rate-limited credentials and checkpointing as it goes.
#[derive(Parser, Debug)]
#[command(name = "keyspace-harvester")]
#[command(version)]
#[command(about = "A quota-aware enumeration crawler", long_about = None)]
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

    /// Resume from the saved snapshot (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start from an empty state, ignoring and overwriting any snapshot
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show the harvest plan without sending requests
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the saved snapshot and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        let options = RunOptions {
            fresh: cli.fresh,
            config_hash: Some(config_hash),
        };
        handle_harvest(config, options).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("keyspace_harvester=info,warn"),
            1 => EnvFilter::new("keyspace_harvester=debug,info"),
            2 => EnvFilter::new("keyspace_harvester=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows the harvest plan
fn handle_dry_run(config: &Config) {
    println!("=== Keyspace Harvester Dry Run ===\n");

    println!("Endpoint:");
    println!(
        "  URL: {}/{}",
        config.gateway.base_url.trim_end_matches('/'),
        config.gateway.endpoint_path.trim_start_matches('/')
    );
    println!("  Result cap (K): {}", config.gateway.result_cap);
    println!(
        "  Concurrency: {}, rate: {}/s, retries: {}",
        config.gateway.max_concurrent,
        config.gateway.requests_per_second,
        config.gateway.max_retries
    );

    println!("\nCredentials:");
    println!("  Directory: {}", config.credentials.directory.display());
    println!("  Budget per credential: {}", config.credentials.budget);
    match load_credentials(&config.credentials) {
        Ok(pool) => {
            println!("  Usable credentials: {}", pool.len());
            for credential in &pool {
                println!("    * {}", credential.name);
            }
            println!(
                "  Total request budget: {}",
                pool.len() as u64 * config.credentials.budget
            );
        }
        Err(e) => println!("  ✗ {}", e),
    }

    println!("\nCrawler:");
    println!(
        "  Phases: {}",
        config
            .crawler
            .phases
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(" → ")
    );
    println!(
        "  Alphabet: {} symbols, max depth {}",
        config.crawler.alphabet.chars().count(),
        config.crawler.max_depth
    );
    println!(
        "  Tail: {} misses, span {}",
        config.crawler.miss_threshold, config.crawler.tail_span
    );
    println!("  Gap: jumps up to {}", config.crawler.gap_span);
    println!(
        "  Wide probe: {} regions × {} types",
        config.crawler.wide_regions.len(),
        config.crawler.kinds.len()
    );
    println!(
        "  Checkpoint every {} requests",
        config.crawler.checkpoint_interval
    );

    println!("\nOutput:");
    println!("  Snapshot: {}", config.output.snapshot_path.display());

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the saved snapshot
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Snapshot: {}\n", config.output.snapshot_path.display());

    let store = open_snapshot_store(&config.output.snapshot_path);
    let Some(snapshot) = store.load()? else {
        println!("No snapshot has been written yet.");
        return Ok(());
    };

    print_statistics(&snapshot_statistics(&snapshot));
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, options: RunOptions) -> anyhow::Result<()> {
    if options.fresh {
        tracing::info!("Starting fresh harvest (ignoring previous state)");
    } else {
        tracing::info!("Starting harvest (will resume from snapshot if one exists)");
    }

    match run_harvest(config, options).await {
        Ok(report) => {
            tracing::info!("Harvest finished");
            print_report(&report);
            Ok(())
        }
        Err(HarvestError::Snapshot(e @ SnapshotError::Corrupt { .. })) => {
            tracing::error!("{}", e);
            bail!("the snapshot cannot be read; fix or move it, or rerun with --fresh to start over")
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
