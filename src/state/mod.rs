//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Entity` / `StructuredKey`: discovered records and their region/type/ordinal keys
//! - `CrawlState`: the deduplicated entity map, memoized queries and counters

mod crawl_state;
mod entity;

// Re-export main types
pub use crawl_state::{CrawlCounters, CrawlState, EntityStatus, MergeOutcome, MergePolicy};
pub use entity::{Entity, StructuredKey, KIND_WIDTH, ORDINAL_WIDTH, REGION_WIDTH};
