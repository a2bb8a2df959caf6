//! Snapshot document layout

use crate::config::Phase;
use crate::state::{CrawlCounters, CrawlState, Entity, EntityStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Layout version written by this build
pub const FORMAT_VERSION: u32 = 1;

/// Metadata block at the head of every snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    #[serde(alias = "totalCourts")]
    pub entity_count: usize,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    #[serde(default = "default_format_version")]
    pub format_version: u32,

    /// Phase that was running when the snapshot was taken
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(default)]
    pub completed_phases: Vec<Phase>,

    #[serde(default)]
    pub counters: CrawlCounters,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,

    /// Entities discovered since the snapshot was started
    #[serde(default)]
    pub found: u64,

    #[serde(default)]
    pub updated: u64,

    #[serde(default, alias = "notFound")]
    pub not_found: u64,
}

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

/// A persisted crawl: entities sorted by key, plus the query memo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub meta: SnapshotMeta,

    #[serde(alias = "courts")]
    pub entities: Vec<Entity>,

    /// Issued query strings and how many results each returned
    #[serde(default)]
    pub queries: BTreeMap<String, u32>,

    /// Entities found, updated or not found since the snapshot was started;
    /// keys missing here are plain existing entities
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub statuses: BTreeMap<String, EntityStatus>,
}

impl Snapshot {
    /// Captures the current crawl state
    pub fn capture(state: &CrawlState, phase: Option<Phase>, config_hash: Option<&str>) -> Self {
        let entities: Vec<Entity> = state.entities().cloned().collect();

        Self {
            meta: SnapshotMeta {
                entity_count: entities.len(),
                timestamp: Utc::now(),
                format_version: FORMAT_VERSION,
                phase: phase.map(|p| p.to_string()),
                completed_phases: state.completed_phases().to_vec(),
                counters: state.counters().clone(),
                config_hash: config_hash.map(str::to_string),
                found: state.count_status(EntityStatus::New),
                updated: state.count_status(EntityStatus::Updated),
                not_found: state.count_status(EntityStatus::NotFound),
            },
            entities,
            queries: state.issued().clone(),
            statuses: state.changed_statuses(),
        }
    }

    /// Rebuilds crawl state with the statuses the snapshot recorded
    pub fn into_state(self) -> CrawlState {
        CrawlState::restore(
            self.entities,
            self.statuses,
            self.queries,
            self.meta.counters,
            self.meta.completed_phases,
        )
    }
}
