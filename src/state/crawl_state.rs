use crate::config::Phase;
use crate::state::entity::{Entity, StructuredKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// What to do when an already-known key is discovered again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergePolicy {
    /// Keep the attributes recorded on first discovery
    #[default]
    FirstSeen,

    /// Replace the stored attributes with the latest discovery
    LastSeen,
}

/// Result of merging one entity into the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Kept,
    Replaced,
}

/// Where an entity stands relative to the state the run started from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// Loaded from a snapshot and not touched yet
    Existing,

    /// First discovered during this run
    New,

    /// Re-verified during this run with changed attributes
    Updated,

    /// Re-verified during this run but the endpoint no longer returns it
    NotFound,
}

/// Monotonic crawl counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlCounters {
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub quota_errors: u64,
    /// Queries that came back saturated (exactly K results)
    pub hot_queries: u64,
    /// Queries issued only to verify gaps, tails or known keys
    pub probe_queries: u64,
    /// Keys inserted for the first time
    pub discovered: u64,
    /// Suggestions dropped because they carried no key
    pub unkeyed: u64,
}

/// All state owned by the crawl loop
///
/// The crawl loop is the only writer. Entities are never removed.
#[derive(Debug, Clone, Default)]
pub struct CrawlState {
    entities: BTreeMap<String, Entity>,
    issued: BTreeMap<String, u32>,
    statuses: HashMap<String, EntityStatus>,
    counters: CrawlCounters,
    completed_phases: Vec<Phase>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds state from previously persisted parts
    ///
    /// Loaded entities take their persisted status, or `Existing` when none
    /// was saved. Statuses for unknown keys are dropped. Duplicate keys in
    /// the input keep their first occurrence.
    pub fn restore(
        entities: Vec<Entity>,
        mut statuses: BTreeMap<String, EntityStatus>,
        issued: BTreeMap<String, u32>,
        counters: CrawlCounters,
        completed_phases: Vec<Phase>,
    ) -> Self {
        let mut state = Self {
            issued,
            counters,
            completed_phases,
            ..Self::default()
        };
        for entity in entities {
            if !state.entities.contains_key(&entity.key) {
                let status = statuses
                    .remove(&entity.key)
                    .unwrap_or(EntityStatus::Existing);
                state.statuses.insert(entity.key.clone(), status);
                state.entities.insert(entity.key.clone(), entity);
            }
        }
        state
    }

    /// Merges a discovered entity under the given policy
    pub fn merge(&mut self, entity: Entity, policy: MergePolicy) -> MergeOutcome {
        match self.entities.get_mut(&entity.key) {
            None => {
                self.statuses.insert(entity.key.clone(), EntityStatus::New);
                self.entities.insert(entity.key.clone(), entity);
                self.counters.discovered += 1;
                MergeOutcome::Inserted
            }
            Some(existing) => match policy {
                MergePolicy::FirstSeen => MergeOutcome::Kept,
                MergePolicy::LastSeen => {
                    *existing = entity;
                    MergeOutcome::Replaced
                }
            },
        }
    }

    /// Stores a re-verified entity, returning whether its attributes changed
    ///
    /// Verification always overwrites because it is an explicit re-read of a
    /// known key rather than an incidental rediscovery.
    pub fn replace_verified(&mut self, entity: Entity) -> bool {
        match self.entities.get_mut(&entity.key) {
            Some(existing) if *existing == entity => false,
            Some(existing) => {
                self.statuses
                    .insert(entity.key.clone(), EntityStatus::Updated);
                *existing = entity;
                true
            }
            None => {
                self.merge(entity, MergePolicy::FirstSeen);
                true
            }
        }
    }

    /// Flags a known key that the endpoint no longer returns
    pub fn mark_not_found(&mut self, key: &str) {
        if self.entities.contains_key(key) {
            self.statuses
                .insert(key.to_string(), EntityStatus::NotFound);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entities.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Entity> {
        self.entities.get(key)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in key order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn status(&self, key: &str) -> Option<EntityStatus> {
        self.statuses.get(key).copied()
    }

    /// Keys currently carrying the given status, in key order
    pub fn keys_with_status(&self, status: EntityStatus) -> Vec<String> {
        self.entities
            .keys()
            .filter(|key| self.statuses.get(*key) == Some(&status))
            .cloned()
            .collect()
    }

    /// Statuses other than `Existing`, in key order
    ///
    /// This is what a snapshot needs to carry for a resumed run to tell
    /// entities found or verified earlier apart from the ones it started with.
    pub fn changed_statuses(&self) -> BTreeMap<String, EntityStatus> {
        self.statuses
            .iter()
            .filter(|(_, status)| **status != EntityStatus::Existing)
            .map(|(key, status)| (key.clone(), *status))
            .collect()
    }

    pub fn count_status(&self, status: EntityStatus) -> u64 {
        self.statuses.values().filter(|s| **s == status).count() as u64
    }

    /// Result length recorded for a query string that was already answered
    pub fn memoized(&self, query: &str) -> Option<u32> {
        self.issued.get(query).copied()
    }

    pub fn record_issued(&mut self, query: &str, returned: usize) {
        self.issued
            .insert(query.to_string(), u32::try_from(returned).unwrap_or(u32::MAX));
    }

    pub fn issued(&self) -> &BTreeMap<String, u32> {
        &self.issued
    }

    pub fn counters(&self) -> &CrawlCounters {
        &self.counters
    }

    pub(crate) fn counters_mut(&mut self) -> &mut CrawlCounters {
        &mut self.counters
    }

    pub fn completed_phases(&self) -> &[Phase] {
        &self.completed_phases
    }

    pub fn is_phase_complete(&self, phase: Phase) -> bool {
        self.completed_phases.contains(&phase)
    }

    pub fn mark_phase_complete(&mut self, phase: Phase) {
        if !self.is_phase_complete(phase) {
            self.completed_phases.push(phase);
        }
    }

    /// Known ordinals grouped by region+type prefix
    ///
    /// Keys without a structured form are ignored.
    pub fn prefix_ordinals(&self) -> BTreeMap<String, BTreeSet<u32>> {
        let mut prefixes: BTreeMap<String, BTreeSet<u32>> = BTreeMap::new();
        for key in self.entities.keys() {
            if let Ok(structured) = StructuredKey::parse(key) {
                prefixes
                    .entry(structured.prefix())
                    .or_default()
                    .insert(structured.ordinal);
            }
        }
        prefixes
    }

    /// Whether any known structured key belongs to the region
    pub fn has_region(&self, region: &str) -> bool {
        self.entities
            .keys()
            .filter_map(|key| StructuredKey::parse(key).ok())
            .any(|key| key.region == region)
    }
}
