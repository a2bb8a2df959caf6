//! Crawler module for key-space enumeration
//!
//! This module contains the core enumeration logic, including:
//! - Prefix expansion over the search alphabet
//! - Structured-key probing (wide, tail, gap) and re-verification
//! - Checkpointing and resumption
//! - Overall crawl coordination

mod coordinator;
mod observer;
mod prefix;
mod probe;

pub use coordinator::EnumerationCrawler;
pub use observer::{CrawlEvent, CrawlObserver, TracingObserver};
pub use prefix::PrefixFrontier;
pub use probe::{gap_ordinals, TailWalk};

use crate::config::Config;
use crate::credentials::{load_credentials, Connector, CredentialRotator};
use crate::gateway::{GatewaySettings, RequestGateway};
use crate::output::CrawlReport;
use crate::state::CrawlState;
use crate::storage::{open_snapshot_store, SnapshotStore};
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// How a harvest run treats existing progress
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Ignore any saved snapshot and start from an empty state
    pub fresh: bool,

    /// Hash of the configuration file, compared against the snapshot's
    pub config_hash: Option<String>,
}

/// Loads the state a run starts from
///
/// With `fresh` the snapshot is not read at all, so even an unreadable one
/// is bypassed. Otherwise a missing snapshot means an empty state, and a
/// corrupt one is an error.
pub fn load_state(store: &dyn SnapshotStore, options: &RunOptions) -> Result<CrawlState> {
    if options.fresh {
        info!("Fresh run requested, ignoring any saved snapshot");
        return Ok(CrawlState::new());
    }

    let Some(snapshot) = store.load()? else {
        info!("No snapshot found, starting from scratch");
        return Ok(CrawlState::new());
    };

    if let (Some(saved), Some(current)) = (&snapshot.meta.config_hash, &options.config_hash) {
        if saved != current {
            warn!("Configuration changed since the snapshot was written; continuing anyway");
        }
    }

    info!(
        "Resuming from snapshot taken {} with {} entities",
        snapshot.meta.timestamp, snapshot.meta.entity_count
    );
    Ok(snapshot.into_state())
}

/// Runs a complete harvest
///
/// This is the main entry point for starting a harvest. It will:
/// 1. Load the credential pool
/// 2. Load or create the crawl state
/// 3. Connect the first credential's gateway
/// 4. Run the configured phases, checkpointing as it goes
/// 5. Write the final snapshot
pub async fn run_harvest(config: Config, options: RunOptions) -> Result<CrawlReport> {
    let credentials = load_credentials(&config.credentials)?;
    info!("Loaded {} credentials", credentials.len());

    let store = open_snapshot_store(&config.output.snapshot_path);
    let state = load_state(&store, &options)?;

    let settings = GatewaySettings::from_config(&config.gateway);
    let connector: Connector<RequestGateway> =
        Box::new(move |credential| RequestGateway::connect(&settings, credential));
    let rotator = CredentialRotator::new(credentials, config.credentials.budget, connector);

    let mut crawler = EnumerationCrawler::new(
        config.crawler.clone(),
        config.gateway.result_cap,
        rotator,
        Box::new(store),
    )
    .with_state(state)
    .with_observer(Arc::new(TracingObserver));

    if let Some(hash) = options.config_hash {
        crawler = crawler.with_config_hash(hash);
    }

    crawler.run().await
}
