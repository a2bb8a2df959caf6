//! Credential pool and rotation
//!
//! # Components
//!
//! - `load_credentials`: reads one credential per `*.env` file
//! - `CredentialRotator`: spends each credential's budget in turn, swapping
//!   the active gateway when one runs out

mod rotator;
mod store;

pub use rotator::{
    Connector, CredentialBudget, CredentialRotator, RotationError, RotationState, RotatorStats,
};
pub use store::load_credentials;

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// One API identity
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Name of the file the credential came from
    pub name: String,
    pub api_key: String,
    pub secret_key: Option<String>,
}

impl Credential {
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        secret_key: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_key: api_key.into(),
            secret_key,
        }
    }
}

// Secrets stay out of logs and panic messages.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("api_key", &"<redacted>")
            .field(
                "secret_key",
                &self.secret_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Errors raised while loading the credential pool
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to read credentials from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse credential file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("No usable credentials found in {0}")]
    Empty(PathBuf),
}
