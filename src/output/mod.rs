//! Output module for run reports and snapshot statistics

mod report;
pub mod stats;

pub use report::{print_report, CrawlReport};
pub use stats::{print_statistics, snapshot_statistics, SnapshotStatistics};
