use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of a gateway's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GatewayStats {
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    pub quota_errors: u64,
    pub retries: u64,
}

impl GatewayStats {
    /// Share of finished requests that succeeded, as a percentage
    pub fn success_rate(&self) -> f64 {
        let finished = self.successes + self.failures;
        if finished == 0 {
            return 0.0;
        }
        self.successes as f64 / finished as f64 * 100.0
    }
}

/// Live counters shared by concurrent requests
#[derive(Debug, Default)]
pub(crate) struct GatewayCounters {
    total: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    quota_errors: AtomicU64,
    retries: AtomicU64,
}

impl GatewayCounters {
    pub fn request(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A quota rejection is also a failure
    pub fn quota(&self) {
        self.quota_errors.fetch_add(1, Ordering::Relaxed);
        self.failure();
    }

    pub fn retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GatewayStats {
        GatewayStats {
            total: self.total.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            quota_errors: self.quota_errors.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.successes.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.quota_errors.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
    }
}
