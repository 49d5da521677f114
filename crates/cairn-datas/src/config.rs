use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of concurrent chunk transfers for a pull.
pub const DEFAULT_PARALLELISM: usize = 512;

/// Upper bound on commits visited while checking ancestry.
///
/// Walks that hit the bound report "not an ancestor", so an enormous or
/// malformed history produces a merge-needed error rather than a hang.
pub const MAX_ANCESTRY_VISITS: usize = 100_000;

/// Bounds the root compare-and-swap retry loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total CAS attempts before giving up. Zero is treated as one.
    pub max_attempts: u32,
    /// Sleep after the first lost race.
    pub initial_backoff: Duration,
    /// Backoff doubles up to this cap.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 16,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Attempts the CAS loop actually makes; always at least one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Backoff to sleep after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}
