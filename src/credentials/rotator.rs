use crate::credentials::Credential;
use crate::gateway::{GatewayError, QueryResult, SearchClient, SearchQuery, ShutdownMode};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

/// Builds a client bound to one credential
pub type Connector<C> = Box<dyn Fn(&Credential) -> Result<C, GatewayError> + Send + Sync>;

/// Where the rotator stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    /// Credential at this index is serving requests
    Active(usize),
    /// Credential at this index is being drained before the next one connects
    Rotating(usize),
    /// No credential has budget left; terminal
    AllExhausted,
}

/// Request allowance of one credential
///
/// Usage only grows during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CredentialBudget {
    pub cap: u64,
    pub used: u64,
    /// Taken out of service early (quota rejection or failed connect)
    pub retired: bool,
}

impl CredentialBudget {
    pub fn new(cap: u64) -> Self {
        Self {
            cap,
            used: 0,
            retired: false,
        }
    }

    pub fn is_spent(&self) -> bool {
        self.retired || self.used >= self.cap
    }

    pub fn remaining(&self) -> u64 {
        if self.retired {
            0
        } else {
            self.cap.saturating_sub(self.used)
        }
    }
}

#[derive(Debug, Error)]
pub enum RotationError {
    /// Every credential is spent; the crawl should stop
    #[error("All credentials exhausted")]
    Exhausted,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Rotator counters for progress reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotatorStats {
    pub current: Option<String>,
    pub used_on_current: u64,
    pub budget: u64,
    pub total_requests: u64,
    pub credentials_used: usize,
    pub credentials_remaining: usize,
    pub remaining_capacity: u64,
    pub rotations: u64,
}

/// Spends a pool of credentials one after another
///
/// Only the active credential has a live client. When its budget runs out
/// the client is drained and the next credential with budget left is
/// connected. Credentials that fail to connect are skipped.
pub struct CredentialRotator<C: SearchClient> {
    credentials: Vec<Credential>,
    budgets: Vec<CredentialBudget>,
    connector: Connector<C>,
    state: RotationState,
    client: Option<C>,
    total_requests: u64,
    rotations: u64,
}

impl<C: SearchClient> CredentialRotator<C> {
    /// Creates a rotator and connects the first usable credential
    pub fn new(credentials: Vec<Credential>, budget: u64, connector: Connector<C>) -> Self {
        let budgets = vec![CredentialBudget::new(budget); credentials.len()];
        let mut rotator = Self {
            credentials,
            budgets,
            connector,
            state: RotationState::AllExhausted,
            client: None,
            total_requests: 0,
            rotations: 0,
        };
        rotator.activate_from(0);
        rotator
    }

    /// Sends a query through the active credential
    ///
    /// Usage is not recorded here; the caller reports every attempt through
    /// `record_usage` or `retire_active`.
    pub async fn issue_query(&self, query: &SearchQuery) -> Result<QueryResult, RotationError> {
        match (&self.state, &self.client) {
            (RotationState::Active(_), Some(client)) => Ok(client.search(query).await?),
            _ => Err(RotationError::Exhausted),
        }
    }

    /// Counts one request against the active credential
    ///
    /// Rotates when the budget is reached. Returns `false` once no credential
    /// is left to serve further requests.
    pub async fn record_usage(&mut self) -> bool {
        let RotationState::Active(index) = self.state else {
            return false;
        };

        self.budgets[index].used += 1;
        self.total_requests += 1;

        if self.budgets[index].is_spent() {
            self.rotate().await;
        }

        self.is_usable()
    }

    /// Counts one request and takes the active credential out of service
    ///
    /// Used when the endpoint reports the quota as spent before the local
    /// budget ran out.
    pub async fn retire_active(&mut self) -> bool {
        let RotationState::Active(index) = self.state else {
            return false;
        };

        self.budgets[index].used += 1;
        self.budgets[index].retired = true;
        self.total_requests += 1;
        warn!(
            "Credential {} rejected by quota after {} requests",
            self.credentials[index].name, self.budgets[index].used
        );

        self.rotate().await;
        self.is_usable()
    }

    async fn rotate(&mut self) {
        let RotationState::Active(index) = self.state else {
            return;
        };

        self.state = RotationState::Rotating(index);
        if let Some(client) = self.client.take() {
            client.shutdown(ShutdownMode::Drain).await;
        }

        info!(
            "Credential {} retired after {} requests",
            self.credentials[index].name, self.budgets[index].used
        );

        self.activate_from(index + 1);
        if let RotationState::Active(_) = self.state {
            self.rotations += 1;
        }
    }

    /// Connects the first credential at or after `start` that has budget left
    fn activate_from(&mut self, start: usize) {
        for index in start..self.credentials.len() {
            if self.budgets[index].is_spent() {
                continue;
            }

            let credential = &self.credentials[index];
            match (self.connector)(credential) {
                Ok(client) => {
                    info!(
                        "Using credential {} ({} of {}, budget {})",
                        credential.name,
                        index + 1,
                        self.credentials.len(),
                        self.budgets[index].cap
                    );
                    self.client = Some(client);
                    self.state = RotationState::Active(index);
                    return;
                }
                Err(e) => {
                    error!("Failed to connect credential {}: {}", credential.name, e);
                    self.budgets[index].retired = true;
                }
            }
        }

        self.client = None;
        self.state = RotationState::AllExhausted;
        warn!(
            "All {} credentials exhausted after {} requests",
            self.credentials.len(),
            self.total_requests
        );
    }

    pub fn is_usable(&self) -> bool {
        matches!(self.state, RotationState::Active(_))
    }

    pub fn state(&self) -> RotationState {
        self.state
    }

    pub fn active_credential(&self) -> Option<&Credential> {
        match self.state {
            RotationState::Active(index) | RotationState::Rotating(index) => {
                self.credentials.get(index)
            }
            RotationState::AllExhausted => None,
        }
    }

    /// Client of the active credential, if any
    pub fn client(&self) -> Option<&C> {
        self.client.as_ref()
    }

    pub fn budgets(&self) -> &[CredentialBudget] {
        &self.budgets
    }

    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    pub fn stats(&self) -> RotatorStats {
        let active = match self.state {
            RotationState::Active(index) | RotationState::Rotating(index) => Some(index),
            RotationState::AllExhausted => None,
        };

        RotatorStats {
            current: active.map(|i| self.credentials[i].name.clone()),
            used_on_current: active.map(|i| self.budgets[i].used).unwrap_or(0),
            budget: active.map(|i| self.budgets[i].cap).unwrap_or(0),
            total_requests: self.total_requests,
            credentials_used: self.budgets.iter().filter(|b| b.used > 0).count(),
            credentials_remaining: self.budgets.iter().filter(|b| !b.is_spent()).count(),
            remaining_capacity: self.budgets.iter().map(CredentialBudget::remaining).sum(),
            rotations: self.rotations,
        }
    }

    /// Drains the active client and stops serving requests
    pub async fn shutdown(&mut self) {
        if let Some(client) = self.client.take() {
            client.shutdown(ShutdownMode::Drain).await;
        }
        self.state = RotationState::AllExhausted;
    }
}
