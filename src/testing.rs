//! In-process search endpoint for unit tests

use crate::credentials::{Connector, Credential};
use crate::gateway::{
    GatewayError, GatewayStats, QueryResult, RemoteErrorKind, SearchClient, SearchQuery,
    ShutdownMode,
};
use crate::state::Entity;
use crate::storage::{Snapshot, SnapshotResult, SnapshotStore};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub(crate) fn entity(key: &str) -> Entity {
    Entity::new(key).with_attribute("name", format!("Court {}", key))
}

#[derive(Default)]
struct EndpointState {
    responses: HashMap<String, Vec<Entity>>,
    failing: HashSet<String>,
    quota_credentials: HashSet<String>,
    refused: HashSet<String>,
    log: Vec<(String, String)>,
    shutdowns: Vec<String>,
}

/// Answers queries from a fixed table keyed by query text
///
/// Unknown queries return no results. Results are truncated to the
/// requested count.
#[derive(Clone, Default)]
pub(crate) struct SimulatedEndpoint {
    state: Arc<Mutex<EndpointState>>,
}

impl SimulatedEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, query: &str, entities: Vec<Entity>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(query.to_string(), entities);
    }

    /// Makes every query with this text fail with a server error
    pub fn fail(&self, query: &str) {
        self.state.lock().unwrap().failing.insert(query.to_string());
    }

    /// Makes every query through this credential fail with a quota error
    pub fn exhaust_quota(&self, credential: &str) {
        self.state
            .lock()
            .unwrap()
            .quota_credentials
            .insert(credential.to_string());
    }

    pub fn refuse_credential(&self, credential: &str) {
        self.state
            .lock()
            .unwrap()
            .refused
            .insert(credential.to_string());
    }

    /// Query texts in the order they reached the endpoint
    pub fn queries(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .map(|(_, query)| query.clone())
            .collect()
    }

    /// Credential names in the order they served queries
    pub fn served_by(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .log
            .iter()
            .map(|(credential, _)| credential.clone())
            .collect()
    }

    pub fn shutdowns(&self) -> Vec<String> {
        self.state.lock().unwrap().shutdowns.clone()
    }

    pub fn connector(&self) -> Connector<SimulatedClient> {
        let state = Arc::clone(&self.state);
        Box::new(move |credential: &Credential| {
            if state.lock().unwrap().refused.contains(&credential.name) {
                return Err(GatewayError::Build(format!("refused {}", credential.name)));
            }
            Ok(SimulatedClient {
                credential: credential.name.clone(),
                state: Arc::clone(&state),
                stats: Mutex::new(GatewayStats::default()),
            })
        })
    }
}

pub(crate) struct SimulatedClient {
    credential: String,
    state: Arc<Mutex<EndpointState>>,
    stats: Mutex<GatewayStats>,
}

#[async_trait]
impl SearchClient for SimulatedClient {
    async fn search(&self, query: &SearchQuery) -> Result<QueryResult, GatewayError> {
        let mut state = self.state.lock().unwrap();
        let mut stats = self.stats.lock().unwrap();
        stats.total += 1;
        state
            .log
            .push((self.credential.clone(), query.text.clone()));

        if state.quota_credentials.contains(&self.credential) {
            stats.failures += 1;
            stats.quota_errors += 1;
            return Err(GatewayError::QuotaExceeded {
                message: "daily limit reached".to_string(),
            });
        }

        if state.failing.contains(&query.text) {
            stats.failures += 1;
            return Err(GatewayError::Remote {
                kind: RemoteErrorKind::Server,
                status: Some(503),
                message: "unavailable".to_string(),
            });
        }

        let entities: Vec<Entity> = state
            .responses
            .get(&query.text)
            .map(|all| all.iter().take(query.count as usize).cloned().collect())
            .unwrap_or_default();
        stats.successes += 1;

        Ok(QueryResult {
            returned: entities.len(),
            entities,
        })
    }

    async fn shutdown(&self, _mode: ShutdownMode) {
        self.state
            .lock()
            .unwrap()
            .shutdowns
            .push(self.credential.clone());
    }

    fn stats(&self) -> GatewayStats {
        *self.stats.lock().unwrap()
    }
}

/// Keeps every saved snapshot in memory
#[derive(Clone, Default)]
pub(crate) struct RecordingStore {
    initial: Option<Snapshot>,
    saved: Arc<Mutex<Vec<Snapshot>>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial(snapshot: Snapshot) -> Self {
        Self {
            initial: Some(snapshot),
            saved: Arc::default(),
        }
    }

    pub fn saved(&self) -> Vec<Snapshot> {
        self.saved.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Snapshot> {
        self.saved.lock().unwrap().last().cloned()
    }
}

impl SnapshotStore for RecordingStore {
    fn load(&self) -> SnapshotResult<Option<Snapshot>> {
        Ok(self.last().or_else(|| self.initial.clone()))
    }

    fn save(&mut self, snapshot: &Snapshot) -> SnapshotResult<()> {
        self.saved.lock().unwrap().push(snapshot.clone());
        Ok(())
    }
}
