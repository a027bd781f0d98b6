//! Retry policy with exponential backoff and jitter.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::TransportError;

/// Status codes retried by default: timeouts, too-early, rate limits, and
/// transient server failures.
pub const DEFAULT_RETRIABLE_STATUS: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

/// Retry behavior for a transport. Attempts are clamped to 1–10.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    retriable_status: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 500, 10_000)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, 10),
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
            retriable_status: DEFAULT_RETRIABLE_STATUS.iter().copied().collect(),
        }
    }

    /// Replace the retriable status set.
    pub fn with_retriable_status(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retriable_status = codes.into_iter().collect();
        self
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Network-level errors (no status) are always retriable; HTTP errors
    /// only when their status is in the retriable set.
    pub fn should_retry(&self, error: &TransportError) -> bool {
        match error.status {
            None => true,
            Some(status) => self.retriable_status.contains(&status),
        }
    }

    /// Delay before the attempt following `attempt` (1-based):
    /// `min(max, base * 2^(attempt-1))` plus uniform jitter up to 20%.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let scaled = self.base_delay_ms.saturating_mul(1u64 << exponent);
        let capped = scaled.min(self.max_delay_ms);
        let jitter = fastrand::u64(0..=capped / 5);
        Duration::from_millis(capped.saturating_add(jitter))
    }
}
