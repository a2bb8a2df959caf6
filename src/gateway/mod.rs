//! Request gateway for the remote search endpoint
//!
//! The gateway owns everything between a query and the network:
//! - Concurrency ceiling (semaphore) and throughput ceiling (token bucket)
//! - Retry with exponential backoff for transient failures
//! - Classification of quota rejections into a distinct error
//! - Request counters
//!
//! Callers depend on the [`SearchClient`] trait rather than on
//! [`RequestGateway`] so the crawl logic can run against other endpoints.

mod client;
mod retry;
mod stats;
mod wire;

pub use client::{GatewaySettings, RequestGateway};
pub use retry::{classify_status, ResponseClass, RetryPolicy, MAX_BACKOFF};
pub use stats::GatewayStats;

use crate::state::Entity;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// One search request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    /// Requested number of results; clamped to the endpoint's cap
    pub count: u32,
    /// Restrict results to one region code
    pub region: Option<String>,
    /// Restrict results to these entity types
    pub kinds: Vec<String>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>, count: u32) -> Self {
        Self {
            text: text.into(),
            count,
            region: None,
            kinds: Vec::new(),
        }
    }

    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn of_kind(mut self, kind: impl Into<String>) -> Self {
        self.kinds.push(kind.into());
        self
    }
}

/// Ordered results of one query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Results that carried a key, in ranking order
    pub entities: Vec<Entity>,
    /// Number of suggestions the endpoint returned, keyed or not
    pub returned: usize,
}

impl QueryResult {
    /// Whether the endpoint hit its result cap, meaning more matches may exist
    pub fn is_saturated(&self, cap: u32) -> bool {
        self.returned >= cap as usize
    }

    /// Suggestions dropped for lack of a key
    pub fn unkeyed(&self) -> usize {
        self.returned.saturating_sub(self.entities.len())
    }
}

/// What happens to queued requests when a gateway shuts down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Queued and in-flight requests are allowed to finish
    Drain,
    /// Queued requests fail with `Closed` without reaching the network
    Discard,
}

/// Category of a non-quota remote failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Connection, timeout or other transport failure
    Network,
    /// 5xx (and 408) that survived every retry
    Server,
    /// Any other non-success status
    Client,
    /// Success status with a body that is not a suggest response
    Decode,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Server => "server",
            Self::Client => "client",
            Self::Decode => "decode",
        };
        f.write_str(name)
    }
}

/// Errors returned by a search call
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The credential behind this gateway has no requests left
    #[error("Quota exceeded: {message}")]
    QuotaExceeded { message: String },

    #[error("Remote {kind} error (status {status:?}): {message}")]
    Remote {
        kind: RemoteErrorKind,
        status: Option<u16>,
        message: String,
    },

    #[error("Gateway is shut down")]
    Closed,

    #[error("Failed to build HTTP client: {0}")]
    Build(String),
}

impl GatewayError {
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

/// A search endpoint bound to one credential
#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Runs one query
    async fn search(&self, query: &SearchQuery) -> Result<QueryResult, GatewayError>;

    /// Stops accepting work; on return nothing is in flight
    async fn shutdown(&self, mode: ShutdownMode);

    /// Current counters
    fn stats(&self) -> GatewayStats;
}
