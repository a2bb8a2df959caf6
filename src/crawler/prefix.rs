//! Breadth-first prefix expansion
//!
//! Every symbol of the alphabet is queried as a one-character prefix. A
//! prefix whose result list is full (saturated) may hide further matches, so
//! each of its one-symbol extensions is queued, up to the depth limit. A
//! prefix that returns fewer than K results is closed.

use crate::crawler::coordinator::{EnumerationCrawler, QueryOutcome, QueryPurpose};
use crate::crawler::observer::CrawlEvent;
use crate::gateway::{SearchClient, SearchQuery};
use crate::Result;
use std::collections::VecDeque;

/// Queue of prefixes still to be queried, with their depth
#[derive(Debug, Clone, Default)]
pub struct PrefixFrontier {
    queue: VecDeque<(String, u32)>,
}

impl PrefixFrontier {
    /// Queues every single-symbol prefix at depth 1
    pub fn seed(alphabet: &[char]) -> Self {
        Self {
            queue: alphabet.iter().map(|c| (c.to_string(), 1)).collect(),
        }
    }

    pub fn pop(&mut self) -> Option<(String, u32)> {
        self.queue.pop_front()
    }

    /// Queues the children of a saturated prefix
    ///
    /// Nothing is queued once `depth` has reached `max_depth`. Returns the
    /// number of children queued.
    pub fn expand(&mut self, prefix: &str, depth: u32, alphabet: &[char], max_depth: u32) -> usize {
        if depth >= max_depth {
            return 0;
        }
        for symbol in alphabet {
            self.queue.push_back((format!("{}{}", prefix, symbol), depth + 1));
        }
        alphabet.len()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<C: SearchClient> EnumerationCrawler<C> {
    /// Runs prefix expansion until the frontier drains or requests run out
    ///
    /// Returns `false` if the phase was cut short.
    pub(crate) async fn expand_prefixes(&mut self) -> Result<bool> {
        let alphabet: Vec<char> = self.config.alphabet.chars().collect();
        let max_depth = self.config.max_depth;
        let cap = self.result_cap;

        let mut frontier = PrefixFrontier::seed(&alphabet);
        let mut processed = 0u64;

        while let Some((prefix, depth)) = frontier.pop() {
            let query = SearchQuery::new(prefix.as_str(), cap);
            let returned = match self.run_query(query, QueryPurpose::Expand).await? {
                QueryOutcome::Answered { returned, .. } => returned,
                QueryOutcome::Memoized { returned } => returned as usize,
                QueryOutcome::Failed => 0,
                QueryOutcome::Halted => return Ok(false),
            };

            if returned >= cap as usize {
                frontier.expand(&prefix, depth, &alphabet, max_depth);
            }

            processed += 1;
            self.emit(CrawlEvent::Progress {
                current: processed,
                total: None,
                message: format!(
                    "prefix '{}': {} results, {} queued, {} entities",
                    prefix,
                    returned,
                    frontier.len(),
                    self.state.len()
                ),
            });
        }

        Ok(true)
    }
}
