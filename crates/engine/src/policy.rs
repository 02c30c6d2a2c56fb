//! Tunable engine policies.
//!
//! All policies deserialize from configuration with defaults for every field,
//! so a settings file only needs the values it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded retry for transient conflicts.
///
/// Attempt `n` (starting at 1) waits `base_backoff_ms * 2^(n-1)`, capped at
/// `max_backoff_ms`, before trying again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 20,
            max_backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let millis = self.base_backoff_ms.saturating_mul(factor);
        Duration::from_millis(millis.min(self.max_backoff_ms))
    }
}

/// What interrupting celebrations do to running bulk allocations.
///
/// A personal celebration completes the month only when it is dated in the
/// current calendar month; late entries for an earlier month pause like any
/// other personal celebration. With `resume_on_monthly_completion` off, the
/// completing celebration pauses as well.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterruptionPolicy {
    /// Pause every active allocation of the owner when an interrupting
    /// celebration is recorded.
    pub pause_on_interruption: bool,
    /// Resume allocations an interruption paused for `personal` once the
    /// current month's personal obligation is complete. Manual pauses stay.
    pub resume_on_monthly_completion: bool,
}

impl Default for InterruptionPolicy {
    fn default() -> Self {
        Self {
            pause_on_interruption: true,
            resume_on_monthly_completion: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(20));
        assert_eq!(policy.backoff(2), Duration::from_millis(40));
        assert_eq!(policy.backoff(5), Duration::from_millis(320));
        assert_eq!(policy.backoff(6), Duration::from_millis(500));
        assert_eq!(policy.backoff(80), Duration::from_millis(500));
    }
}
