//! Statistics over a saved snapshot
//!
//! This module provides functionality for summarizing and displaying the
//! entity set held in a snapshot.

use crate::storage::Snapshot;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Snapshot statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotStatistics {
    pub total_entities: usize,

    /// Entities per region code
    pub by_region: BTreeMap<String, usize>,

    /// Entities per type code
    pub by_kind: BTreeMap<String, usize>,

    /// Entities whose key has no region/type/ordinal structure
    pub unstructured: usize,

    pub taken_at: DateTime<Utc>,
    pub requests: u64,
    pub completed_phases: Vec<String>,
}

/// Computes statistics for a snapshot
pub fn snapshot_statistics(snapshot: &Snapshot) -> SnapshotStatistics {
    let mut by_region = BTreeMap::new();
    let mut by_kind = BTreeMap::new();
    let mut unstructured = 0;

    for entity in &snapshot.entities {
        match entity.structured_key() {
            Some(key) => {
                *by_region.entry(key.region).or_insert(0) += 1;
                *by_kind.entry(key.kind).or_insert(0) += 1;
            }
            None => unstructured += 1,
        }
    }

    SnapshotStatistics {
        total_entities: snapshot.entities.len(),
        by_region,
        by_kind,
        unstructured,
        taken_at: snapshot.meta.timestamp,
        requests: snapshot.meta.counters.requests,
        completed_phases: snapshot
            .meta
            .completed_phases
            .iter()
            .map(|p| p.to_string())
            .collect(),
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &SnapshotStatistics) {
    println!("=== Snapshot Statistics ===\n");

    println!("Overview:");
    println!("  Total entities: {}", stats.total_entities);
    println!("  Regions: {}", stats.by_region.len());
    println!("  Types: {}", stats.by_kind.len());
    if stats.unstructured > 0 {
        println!("  Unstructured keys: {}", stats.unstructured);
    }
    println!("  Taken at: {}", stats.taken_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("  Requests recorded: {}", stats.requests);
    if !stats.completed_phases.is_empty() {
        println!("  Completed phases: {}", stats.completed_phases.join(", "));
    }
    println!();

    println!("Entities by Type:");
    // Sort by count (descending)
    let mut kinds: Vec<_> = stats.by_kind.iter().collect();
    kinds.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (kind, count) in kinds {
        let percentage = if stats.total_entities > 0 {
            (*count as f64 / stats.total_entities as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", kind, count, percentage);
    }
    println!();

    println!("Entities by Region:");
    for (region, count) in &stats.by_region {
        println!("  {}: {}", region, count);
    }
}
