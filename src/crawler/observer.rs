//! Progress events emitted by the crawl loop

use crate::config::Phase;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    PhaseStarted {
        phase: Phase,
    },
    PhaseFinished {
        phase: Phase,
        discovered: u64,
    },
    Progress {
        current: u64,
        total: Option<u64>,
        message: String,
    },
    Discovered {
        key: String,
        phase: Option<Phase>,
    },
    QueryFailed {
        query: String,
        error: String,
    },
    Checkpoint {
        entities: usize,
        requests: u64,
    },
    /// No credential can serve further requests
    Exhausted {
        requests: u64,
    },
}

/// Receives crawl events
///
/// Observers only watch; nothing they do feeds back into the crawl.
pub trait CrawlObserver: Send + Sync {
    fn on_event(&self, event: &CrawlEvent);
}

/// Progress events between two `info!` lines; the rest go to `debug!`
pub const PROGRESS_LOG_INTERVAL: u64 = 100;

/// Writes every event to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CrawlObserver for TracingObserver {
    fn on_event(&self, event: &CrawlEvent) {
        match event {
            CrawlEvent::PhaseStarted { phase } => info!("Phase {} started", phase),
            CrawlEvent::PhaseFinished { phase, discovered } => {
                info!("Phase {} finished, {} new entities", phase, discovered)
            }
            CrawlEvent::Progress {
                current,
                total,
                message,
            } => {
                let position = match total {
                    Some(total) => format!("{}/{}", current, total),
                    None => current.to_string(),
                };
                if current % PROGRESS_LOG_INTERVAL == 0 || Some(*current) == *total {
                    info!("Progress {}: {}", position, message);
                } else {
                    debug!("Progress {}: {}", position, message);
                }
            }
            CrawlEvent::Discovered { key, .. } => debug!("New entity {}", key),
            CrawlEvent::QueryFailed { query, error } => {
                warn!("Query '{}' failed: {}", query, error)
            }
            CrawlEvent::Checkpoint { entities, requests } => info!(
                "Checkpoint saved: {} entities after {} requests",
                entities, requests
            ),
            CrawlEvent::Exhausted { requests } => warn!(
                "Request budget exhausted after {} requests, stopping",
                requests
            ),
        }
    }
}
