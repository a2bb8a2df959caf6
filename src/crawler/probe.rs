//! Structured-key probing
//!
//! Keys of one region+type series are numbered densely, so once a few are
//! known the rest can be asked for directly:
//! - wide: regions with nothing known get one broad query per type
//! - tail: ordinals above the known maximum until enough consecutive misses
//! - gap: every unknown ordinal below the known maximum
//! - refresh: every key known at the start of the run, to catch edits and
//!   removals

use crate::config::Phase;
use crate::crawler::coordinator::{EnumerationCrawler, QueryOutcome, QueryPurpose};
use crate::crawler::observer::CrawlEvent;
use crate::gateway::{SearchClient, SearchQuery};
use crate::state::{EntityStatus, StructuredKey};
use crate::Result;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Unknown ordinals strictly between 0 and the top of a series, lazily
///
/// The top is the largest known ordinal reachable from 0 without a jump of
/// more than `span` ordinals. Anything above such a jump is an outlier and
/// its range is left to the tail probe of the series.
pub fn gap_ordinals(known: &BTreeSet<u32>, span: u32) -> impl Iterator<Item = u32> + '_ {
    let top = series_top(known, span);
    (1..top).filter(move |ordinal| !known.contains(ordinal))
}

fn series_top(known: &BTreeSet<u32>, span: u32) -> u32 {
    let mut top = 0;
    for &ordinal in known {
        if ordinal - top > span {
            break;
        }
        top = ordinal;
    }
    top
}

/// Consecutive-miss bookkeeping for one tail walk
#[derive(Debug, Clone)]
pub struct TailWalk {
    next: u32,
    limit: u32,
    misses: u32,
    threshold: u32,
}

impl TailWalk {
    /// Starts right after `max`, going at most `span` ordinals past it
    pub fn new(max: u32, span: u32, threshold: u32) -> Self {
        Self {
            next: max.saturating_add(1),
            limit: max.saturating_add(span),
            misses: 0,
            threshold,
        }
    }

    /// Next ordinal to probe, or `None` once the walk is over
    pub fn next_ordinal(&self) -> Option<u32> {
        if self.misses >= self.threshold || self.next > self.limit {
            None
        } else {
            Some(self.next)
        }
    }

    pub fn hit(&mut self) {
        self.misses = 0;
        self.next = self.next.saturating_add(1);
    }

    pub fn miss(&mut self) {
        self.misses += 1;
        self.next = self.next.saturating_add(1);
    }
}

impl<C: SearchClient> EnumerationCrawler<C> {
    /// Walks past the known maximum of every series
    pub(crate) async fn probe_tails(&mut self) -> Result<bool> {
        let series = self.state.prefix_ordinals();
        let mut probed = 0u64;

        for (prefix, known) in series {
            if self.tail_verified.contains(&prefix) {
                continue;
            }
            let Some(&max) = known.iter().next_back() else {
                continue;
            };

            let mut walk = TailWalk::new(max, self.config.tail_span, self.config.miss_threshold);
            let before = self.state.counters().discovered;

            while let Some(ordinal) = walk.next_ordinal() {
                let key = StructuredKey::format_key(&prefix, ordinal);
                if self.state.contains(&key) {
                    walk.hit();
                    continue;
                }

                let outcome = self.run_query(self.probe_query(&key), QueryPurpose::Probe).await?;
                let hit = match outcome {
                    QueryOutcome::Answered { new_keys, .. } => !new_keys.is_empty(),
                    QueryOutcome::Halted => return Ok(false),
                    _ => false,
                };
                if hit {
                    walk.hit();
                } else {
                    walk.miss();
                }

                probed += 1;
                self.emit(CrawlEvent::Progress {
                    current: probed,
                    total: None,
                    message: format!("tail {}: {}", key, if hit { "hit" } else { "miss" }),
                });
            }

            self.tail_verified.insert(prefix.clone());
            debug!(
                "Tail of {} done, {} new",
                prefix,
                self.state.counters().discovered - before
            );
        }

        Ok(true)
    }

    /// Asks for every unknown ordinal below each series' top exactly once
    pub(crate) async fn probe_gaps(&mut self) -> Result<bool> {
        let series = self.state.prefix_ordinals();
        let span = self.config.gap_span;
        let mut probed = 0u64;

        for (prefix, known) in series {
            if self.gap_verified.contains(&prefix) {
                continue;
            }
            if let Some(&max) = known.iter().next_back() {
                if series_top(&known, span) < max {
                    warn!(
                        "Series {} has ordinals more than {} past the rest, not gap-probing up to {}",
                        prefix, span, max
                    );
                }
            }

            for ordinal in gap_ordinals(&known, span) {
                let key = StructuredKey::format_key(&prefix, ordinal);
                if self.state.contains(&key) {
                    continue;
                }
                if let QueryOutcome::Halted =
                    self.run_query(self.probe_query(&key), QueryPurpose::Probe).await?
                {
                    return Ok(false);
                }

                probed += 1;
                self.emit(CrawlEvent::Progress {
                    current: probed,
                    total: None,
                    message: format!("gap {}, {} entities", key, self.state.len()),
                });
            }

            self.gap_verified.insert(prefix.clone());
            debug!("Gaps of {} done", prefix);
        }

        Ok(true)
    }

    /// One broad query per type for every configured region with nothing known
    pub(crate) async fn probe_wide(&mut self) -> Result<bool> {
        let regions: Vec<String> = self
            .config
            .wide_regions
            .iter()
            .filter(|region| !self.state.has_region(region))
            .cloned()
            .collect();
        let kinds = self.config.kinds.clone();
        let cap = self.result_cap;

        let total = (regions.len() * kinds.len()) as u64;
        let mut probed = 0u64;

        for region in &regions {
            for kind in &kinds {
                let query = SearchQuery::new(format!("{}{}", region, kind), cap);
                let text = query.text.clone();
                if let QueryOutcome::Halted =
                    self.run_query(query, QueryPurpose::Probe).await?
                {
                    return Ok(false);
                }

                probed += 1;
                self.emit(CrawlEvent::Progress {
                    current: probed,
                    total: Some(total),
                    message: format!("wide {}, {} entities", text, self.state.len()),
                });
            }
        }

        Ok(true)
    }

    /// Re-reads every entity that was known when the run started
    ///
    /// A returned entity with the same key replaces the stored one. A key
    /// the endpoint no longer returns is flagged, never removed.
    pub(crate) async fn refresh_known(&mut self) -> Result<bool> {
        let keys = self.state.keys_with_status(EntityStatus::Existing);
        let total = keys.len() as u64;

        for (index, key) in keys.iter().enumerate() {
            match self.run_query(self.probe_query(key), QueryPurpose::Verify).await? {
                QueryOutcome::Answered { matched: false, .. } => {
                    self.state.mark_not_found(key);
                }
                QueryOutcome::Halted => return Ok(false),
                _ => {}
            }

            self.emit(CrawlEvent::Progress {
                current: index as u64 + 1,
                total: Some(total),
                message: format!(
                    "refresh {}: {} updated, {} not found",
                    key,
                    self.state.count_status(EntityStatus::Updated),
                    self.state.count_status(EntityStatus::NotFound)
                ),
            });
        }

        Ok(true)
    }

    fn probe_query(&self, key: &str) -> SearchQuery {
        SearchQuery::new(key, self.config.probe_count)
    }

    /// Series whose tail or gap probing did not finish
    pub(crate) fn unverified_prefixes(&self) -> Vec<String> {
        let tail_pending = self.config.phases.contains(&Phase::Tail)
            && !self.state.is_phase_complete(Phase::Tail);
        let gap_pending = self.config.phases.contains(&Phase::Gap)
            && !self.state.is_phase_complete(Phase::Gap);

        self.state
            .prefix_ordinals()
            .into_keys()
            .filter(|prefix| {
                (tail_pending && !self.tail_verified.contains(prefix))
                    || (gap_pending && !self.gap_verified.contains(prefix))
            })
            .collect()
    }
}
