//! Keyspace Harvester: a quota-aware enumeration crawler
//!
//! This crate discovers every member of a structurally-keyed entity set that is
//! only reachable through a top-K search endpoint, spreading the work across a
//! pool of rate-limited credentials and checkpointing progress as it goes.

pub mod config;
pub mod crawler;
pub mod credentials;
pub mod gateway;
pub mod output;
pub mod state;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

/// Main error type for harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] gateway::GatewayError),

    #[error("Credential error: {0}")]
    Credentials(#[from] credentials::CredentialError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] storage::SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Structured key errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("Key too short to carry region, type and ordinal: {0}")]
    TooShort(String),

    #[error("Malformed key segment in {0}")]
    Malformed(String),

    #[error("Invalid ordinal in key: {0}")]
    InvalidOrdinal(String),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, Phase};
pub use crawler::{run_harvest, EnumerationCrawler, RunOptions};
pub use credentials::{Credential, CredentialRotator};
pub use gateway::{RequestGateway, SearchClient, SearchQuery};
pub use state::{CrawlState, Entity, StructuredKey};
