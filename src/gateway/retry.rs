//! Response classification and retry timing

use std::time::Duration;

/// Backoff never waits longer than this between attempts
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How a response status is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    /// The credential's quota is spent; retrying cannot help
    QuotaExceeded,
    /// Worth another attempt after a pause
    Transient,
    /// Definitive rejection of this particular request
    Client,
}

/// Classifies an HTTP status code
///
/// This is the only place that decides what a status means. 402 and 403 are
/// what the suggest API returns once a token's daily limit is used up.
pub fn classify_status(status: u16) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Success,
        402 | 403 => ResponseClass::QuotaExceeded,
        408 | 500..=599 => ResponseClass::Transient,
        _ => ResponseClass::Client,
    }
}

/// Exponential backoff settings
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts allowed after the first one
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: MAX_BACKOFF,
        }
    }

    /// Whether a transient failure on the given retry number may be retried
    ///
    /// `retry` counts from 1 for the first retry.
    pub fn should_retry(&self, retry: u32) -> bool {
        retry <= self.max_retries
    }

    /// Delay before the given retry: `base * 2^(retry - 1)`, capped
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}
