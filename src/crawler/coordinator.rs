//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that ties the phases together:
//! - Issuing queries through the credential rotator
//! - Merging results into the crawl state
//! - Memoizing answered queries
//! - Checkpointing to the snapshot store
//! - Stopping cleanly when the request budget runs out

use crate::config::{CrawlerConfig, Phase};
use crate::credentials::{CredentialRotator, RotationError};
use crate::crawler::observer::{CrawlEvent, CrawlObserver};
use crate::gateway::{QueryResult, SearchClient, SearchQuery};
use crate::output::CrawlReport;
use crate::state::{CrawlState, EntityStatus, MergeOutcome};
use crate::storage::{Snapshot, SnapshotStore};
use crate::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Why a query is issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueryPurpose {
    /// Prefix expansion
    Expand,
    /// Direct lookup of a structured key or region+type series
    Probe,
    /// Re-read of a known key; never answered from the memo
    Verify,
}

/// What a query produced, from the crawl loop's point of view
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum QueryOutcome {
    Answered {
        returned: usize,
        /// Keys inserted for the first time by this query
        new_keys: Vec<String>,
        /// Whether a result carried exactly the queried text as its key
        matched: bool,
    },
    /// Already answered earlier; no request was made
    Memoized { returned: u32 },
    /// The request failed and counts as zero results
    Failed,
    /// No credential can serve requests anymore
    Halted,
}

/// Drives a harvest through its configured phases
pub struct EnumerationCrawler<C: SearchClient> {
    pub(crate) config: CrawlerConfig,
    pub(crate) result_cap: u32,
    pub(crate) state: CrawlState,
    pub(crate) tail_verified: BTreeSet<String>,
    pub(crate) gap_verified: BTreeSet<String>,
    rotator: CredentialRotator<C>,
    store: Box<dyn SnapshotStore + Send>,
    observers: Vec<Arc<dyn CrawlObserver>>,
    keys_usable: bool,
    since_checkpoint: u64,
    current_phase: Option<Phase>,
    config_hash: Option<String>,
    network_queries: u64,
}

impl<C: SearchClient> EnumerationCrawler<C> {
    /// Creates a crawler starting from an empty state
    ///
    /// # Arguments
    ///
    /// * `config` - Enumeration settings
    /// * `result_cap` - Most results the endpoint returns for one query (K)
    /// * `rotator` - Credential pool with the first credential connected
    /// * `store` - Where checkpoints and the final snapshot go
    pub fn new(
        config: CrawlerConfig,
        result_cap: u32,
        rotator: CredentialRotator<C>,
        store: Box<dyn SnapshotStore + Send>,
    ) -> Self {
        let keys_usable = rotator.is_usable();
        Self {
            config,
            result_cap: result_cap.max(1),
            state: CrawlState::new(),
            tail_verified: BTreeSet::new(),
            gap_verified: BTreeSet::new(),
            rotator,
            store,
            observers: Vec::new(),
            keys_usable,
            since_checkpoint: 0,
            current_phase: None,
            config_hash: None,
            network_queries: 0,
        }
    }

    /// Continues from previously saved state
    pub fn with_state(mut self, state: CrawlState) -> Self {
        self.state = state;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Hash of the configuration, recorded in every snapshot
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    pub fn rotator(&self) -> &CredentialRotator<C> {
        &self.rotator
    }

    /// Runs every configured phase that has not completed yet
    ///
    /// Budget exhaustion is not an error: the loop stops, a final snapshot is
    /// written and the report says which series were left unverified.
    pub async fn run(&mut self) -> Result<CrawlReport> {
        let started = Instant::now();
        let initial_entities = self.state.len();
        let initial_counters = self.state.counters().clone();

        info!(
            "Starting harvest with {} known entities, phases: {}",
            initial_entities,
            self.config
                .phases
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        for phase in self.config.phases.clone() {
            if self.state.is_phase_complete(phase) {
                info!("Phase {} already completed, skipping", phase);
                continue;
            }
            if !self.keys_usable {
                break;
            }

            self.current_phase = Some(phase);
            self.emit(CrawlEvent::PhaseStarted { phase });
            let discovered_before = self.state.counters().discovered;

            let completed = match phase {
                Phase::Prefix => self.expand_prefixes().await?,
                Phase::Wide => self.probe_wide().await?,
                Phase::Tail => self.probe_tails().await?,
                Phase::Gap => self.probe_gaps().await?,
                Phase::Refresh => self.refresh_known().await?,
            };

            if !completed {
                break;
            }

            self.state.mark_phase_complete(phase);
            self.emit(CrawlEvent::PhaseFinished {
                phase,
                discovered: self.state.counters().discovered - discovered_before,
            });
            self.checkpoint()?;
        }

        let exhausted = !self.keys_usable;
        if exhausted {
            self.emit(CrawlEvent::Exhausted {
                requests: self.state.counters().requests,
            });
        }

        self.write_snapshot()?;
        let report = self.report(initial_entities, &initial_counters, exhausted, started.elapsed());
        self.rotator.shutdown().await;

        Ok(report)
    }

    /// Issues one query, merging whatever it returns
    ///
    /// Queries answered before (in this run or a resumed one) are not sent
    /// again. A quota rejection retires the credential and retries the same
    /// query on the next one.
    pub(crate) async fn run_query(
        &mut self,
        query: SearchQuery,
        purpose: QueryPurpose,
    ) -> Result<QueryOutcome> {
        let memo_key = match purpose {
            QueryPurpose::Verify => format!("refresh:{}", query.text),
            _ => query.text.clone(),
        };

        loop {
            if !self.keys_usable {
                return Ok(QueryOutcome::Halted);
            }

            if let Some(returned) = self.state.memoized(&memo_key) {
                return Ok(QueryOutcome::Memoized { returned });
            }

            self.pace().await;

            match self.rotator.issue_query(&query).await {
                Ok(result) => {
                    self.keys_usable = self.rotator.record_usage().await;
                    let outcome = self.absorb(&query, result, purpose);
                    if let QueryOutcome::Answered { returned, .. } = &outcome {
                        self.state.record_issued(&memo_key, *returned);
                    }
                    self.after_request()?;
                    return Ok(outcome);
                }
                Err(RotationError::Exhausted) => {
                    self.keys_usable = false;
                    return Ok(QueryOutcome::Halted);
                }
                Err(RotationError::Gateway(error)) if error.is_quota() => {
                    let counters = self.state.counters_mut();
                    counters.requests += 1;
                    counters.failures += 1;
                    counters.quota_errors += 1;
                    warn!("Quota exceeded while querying '{}', rotating", query.text);
                    self.keys_usable = self.rotator.retire_active().await;
                    self.after_request()?;
                }
                Err(RotationError::Gateway(error)) => {
                    let counters = self.state.counters_mut();
                    counters.requests += 1;
                    counters.failures += 1;
                    if purpose != QueryPurpose::Expand {
                        counters.probe_queries += 1;
                    }
                    self.keys_usable = self.rotator.record_usage().await;
                    self.emit(CrawlEvent::QueryFailed {
                        query: query.text.clone(),
                        error: error.to_string(),
                    });
                    self.after_request()?;
                    return Ok(QueryOutcome::Failed);
                }
            }
        }
    }

    /// Merges a successful result into the state and updates counters
    fn absorb(
        &mut self,
        query: &SearchQuery,
        result: QueryResult,
        purpose: QueryPurpose,
    ) -> QueryOutcome {
        let returned = result.returned;
        let saturated = result.is_saturated(self.result_cap);
        let unkeyed = result.unkeyed() as u64;

        let counters = self.state.counters_mut();
        counters.requests += 1;
        counters.successes += 1;
        counters.unkeyed += unkeyed;
        if saturated {
            counters.hot_queries += 1;
        }
        if purpose != QueryPurpose::Expand {
            counters.probe_queries += 1;
        }

        let mut new_keys = Vec::new();
        let mut matched = false;
        for entity in result.entities {
            let key = entity.key.clone();
            if key == query.text {
                matched = true;
                if purpose == QueryPurpose::Verify {
                    if self.state.replace_verified(entity) {
                        debug!("Entity {} changed on re-read", key);
                    }
                    continue;
                }
            }

            if self.state.merge(entity, self.config.merge_policy) == MergeOutcome::Inserted {
                new_keys.push(key);
            }
        }

        for key in &new_keys {
            self.emit(CrawlEvent::Discovered {
                key: key.clone(),
                phase: self.current_phase,
            });
        }

        debug!(
            "'{}': {} returned, {} new{}",
            query.text,
            returned,
            new_keys.len(),
            if saturated { ", saturated" } else { "" }
        );

        QueryOutcome::Answered {
            returned,
            new_keys,
            matched,
        }
    }

    async fn pace(&mut self) {
        if self.network_queries > 0 && self.config.query_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.query_delay_ms)).await;
        }
        self.network_queries += 1;
    }

    fn after_request(&mut self) -> Result<()> {
        self.since_checkpoint += 1;
        if self.since_checkpoint >= self.config.checkpoint_interval {
            self.checkpoint()?;
        }
        Ok(())
    }

    fn checkpoint(&mut self) -> Result<()> {
        self.write_snapshot()?;
        self.emit(CrawlEvent::Checkpoint {
            entities: self.state.len(),
            requests: self.state.counters().requests,
        });
        Ok(())
    }

    fn write_snapshot(&mut self) -> Result<()> {
        let snapshot = Snapshot::capture(
            &self.state,
            self.current_phase,
            self.config_hash.as_deref(),
        );
        self.store.save(&snapshot)?;
        self.since_checkpoint = 0;
        Ok(())
    }

    pub(crate) fn emit(&self, event: CrawlEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }

    fn report(
        &self,
        initial_entities: usize,
        initial: &crate::state::CrawlCounters,
        exhausted: bool,
        elapsed: Duration,
    ) -> CrawlReport {
        let counters = self.state.counters();
        CrawlReport {
            initial_entities,
            final_entities: self.state.len(),
            discovered: counters.discovered - initial.discovered,
            updated: self.state.count_status(EntityStatus::Updated),
            not_found: self.state.count_status(EntityStatus::NotFound),
            requests: counters.requests - initial.requests,
            failures: counters.failures - initial.failures,
            quota_errors: counters.quota_errors - initial.quota_errors,
            hot_queries: counters.hot_queries - initial.hot_queries,
            probe_queries: counters.probe_queries - initial.probe_queries,
            unkeyed: counters.unkeyed - initial.unkeyed,
            rotations: self.rotator.rotations(),
            completed_phases: self.state.completed_phases().to_vec(),
            exhausted,
            unverified_prefixes: self.unverified_prefixes(),
            elapsed,
        }
    }
}
