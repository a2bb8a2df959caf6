use crate::config::Phase;
use serde::Serialize;
use std::time::Duration;

/// Outcome of one harvest run
///
/// Request and discovery counts cover this run only, even when it resumed
/// from a snapshot. `updated` and `not_found` cover the whole snapshot, so a
/// refresh interrupted and resumed still reports every flagged entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrawlReport {
    pub initial_entities: usize,
    pub final_entities: usize,
    pub discovered: u64,
    pub updated: u64,
    pub not_found: u64,
    pub requests: u64,
    pub failures: u64,
    pub quota_errors: u64,
    pub hot_queries: u64,
    pub probe_queries: u64,
    pub unkeyed: u64,
    pub rotations: u64,
    pub completed_phases: Vec<Phase>,
    /// The run stopped because no credential had budget left
    pub exhausted: bool,
    /// Series whose tail or gap probing never finished
    pub unverified_prefixes: Vec<String>,
    pub elapsed: Duration,
}

/// Prints a run report to stdout
pub fn print_report(report: &CrawlReport) {
    println!("=== Harvest Report ===\n");

    println!("Entities:");
    println!("  At start: {}", report.initial_entities);
    println!("  At end: {}", report.final_entities);
    println!("  Newly discovered: {}", report.discovered);
    if report.updated > 0 || report.not_found > 0 {
        println!("  Updated: {}", report.updated);
        println!("  Not found: {}", report.not_found);
    }
    println!();

    println!("Requests:");
    println!("  Total: {}", report.requests);
    println!("  Failed: {}", report.failures);
    println!("  Quota errors: {}", report.quota_errors);
    println!("  Saturated queries: {}", report.hot_queries);
    println!("  Probe queries: {}", report.probe_queries);
    if report.unkeyed > 0 {
        println!("  Results without a key: {}", report.unkeyed);
    }
    println!("  Credential rotations: {}", report.rotations);
    println!();

    let phases: Vec<&str> = report.completed_phases.iter().map(|p| p.as_str()).collect();
    println!(
        "Completed phases: {}",
        if phases.is_empty() {
            "none".to_string()
        } else {
            phases.join(", ")
        }
    );
    println!("Elapsed: {:.1}s", report.elapsed.as_secs_f64());

    if report.exhausted {
        println!();
        println!("Stopped early: every credential's budget is spent.");
        if !report.unverified_prefixes.is_empty() {
            println!(
                "Unable to verify due to exhausted budget ({} series):",
                report.unverified_prefixes.len()
            );
            for prefix in &report.unverified_prefixes {
                println!("  {}", prefix);
            }
        }
    }
}
