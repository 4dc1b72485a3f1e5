//! Retry policy for chunk sends.
//!
//! Full-size chunks share a single budget for the whole run: every
//! retryable failure on any of them draws from it, and the run is
//! abandoned when it reaches zero. The final (shorter) chunk gets its own
//! freshly reset budget, and its first failure does not draw from it, so
//! it is attempted once more than a full chunk before giving up.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::plan::ChunkRange;

/// Default number of retryable failures tolerated per budget.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// Which retry budget a chunk draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkRole {
    Full,
    Final,
}

impl ChunkRole {
    pub fn of(range: &ChunkRange) -> Self {
        if range.is_final {
            Self::Final
        } else {
            Self::Full
        }
    }
}

/// Exponential backoff between retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt.
    pub backoff_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
        }
    }
}

impl BackoffConfig {
    /// Calculates the delay for a given retry number (1-based),
    /// with ±25% jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        if capped <= 0.0 {
            return Duration::ZERO;
        }
        let unit = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / 1_000_000_000.0;
        jittered(capped, unit)
    }
}

/// Spreads `capped` seconds by ±25%; `unit` in `[0, 1)` maps to `[-25%, +25%)`.
fn jittered(capped: f64, unit: f64) -> Duration {
    let offset = unit.clamp(0.0, 1.0) * 2.0 - 1.0;
    Duration::from_secs_f64((capped + capped * 0.25 * offset).max(0.0))
}

/// Retry budget and pacing for chunk sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retryable failures tolerated per budget.
    pub budget: u32,
    /// `None` retries immediately.
    pub backoff: Option<BackoffConfig>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            budget: DEFAULT_RETRY_BUDGET,
            backoff: Some(BackoffConfig::default()),
        }
    }
}

impl RetryPolicy {
    /// Retries with no delay between attempts.
    pub fn immediate(budget: u32) -> Self {
        Self {
            budget,
            backoff: None,
        }
    }

    /// Delay to wait before the given retry (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff
            .as_ref()
            .map_or(Duration::ZERO, |b| b.delay_for_attempt(attempt))
    }
}

/// What to do after a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Send the same range again; `attempt` is the 1-based retry number.
    Retry { attempt: u32 },
    /// Give up; `failures` retryable failures were recorded on this budget.
    Exhausted { failures: u32 },
}

/// Remaining retries for one role within one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBudget {
    role: ChunkRole,
    remaining: u32,
    grace: bool,
    failures: u32,
}

impl RetryBudget {
    pub fn new(policy: &RetryPolicy, role: ChunkRole) -> Self {
        Self {
            role,
            remaining: policy.budget,
            grace: role == ChunkRole::Final,
            failures: 0,
        }
    }

    pub fn role(&self) -> ChunkRole {
        self.role
    }

    /// Retries left before the budget is exhausted.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Records one retryable failure.
    pub fn record_failure(&mut self) -> RetryDecision {
        self.failures += 1;
        if self.grace {
            self.grace = false;
            return RetryDecision::Retry {
                attempt: self.failures,
            };
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            RetryDecision::Exhausted {
                failures: self.failures,
            }
        } else {
            RetryDecision::Retry {
                attempt: self.failures,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(budget: &mut RetryBudget) -> u32 {
        let mut failures = 0;
        loop {
            failures += 1;
            if let RetryDecision::Exhausted { failures: f } = budget.record_failure() {
                assert_eq!(f, failures);
                return failures;
            }
        }
    }

    #[test]
    fn full_budget_tolerates_budget_failures() {
        let mut budget = RetryBudget::new(&RetryPolicy::immediate(3), ChunkRole::Full);
        assert_eq!(budget.record_failure(), RetryDecision::Retry { attempt: 1 });
        assert_eq!(budget.record_failure(), RetryDecision::Retry { attempt: 2 });
        assert_eq!(budget.record_failure(), RetryDecision::Exhausted { failures: 3 });
    }

    #[test]
    fn final_budget_has_one_extra_attempt() {
        let mut budget = RetryBudget::new(&RetryPolicy::immediate(3), ChunkRole::Final);
        assert_eq!(drain(&mut budget), 4);
    }

    #[test]
    fn zero_budget() {
        let policy = RetryPolicy::immediate(0);
        let mut full = RetryBudget::new(&policy, ChunkRole::Full);
        assert_eq!(full.record_failure(), RetryDecision::Exhausted { failures: 1 });

        let mut last = RetryBudget::new(&policy, ChunkRole::Final);
        assert_eq!(last.record_failure(), RetryDecision::Retry { attempt: 1 });
        assert_eq!(last.record_failure(), RetryDecision::Exhausted { failures: 2 });
    }

    #[test]
    fn role_of_range() {
        let full = ChunkRange { order: 0, offset: 0, limit: 10, is_final: false };
        let last = ChunkRange { order: 1, offset: 10, limit: 15, is_final: true };
        assert_eq!(ChunkRole::of(&full), ChunkRole::Full);
        assert_eq!(ChunkRole::of(&last), ChunkRole::Final);
    }

    #[test]
    fn policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.budget, 3);
        assert!(policy.backoff.is_some());
        assert_eq!(RetryPolicy::immediate(3).delay_for_attempt(2), Duration::ZERO);
    }

    #[test]
    fn backoff_delays_grow_and_cap() {
        let config = BackoffConfig::default();
        // Base delays: 250ms, 500ms, 1s, 2s, 4s, 5s (capped), 5s...
        let expected_base = [0.25, 0.5, 1.0, 2.0, 4.0, 5.0, 5.0];
        for (i, &base) in expected_base.iter().enumerate() {
            let delay = config.delay_for_attempt((i + 1) as u32);
            let secs = delay.as_secs_f64();
            let lo = base * 0.74;
            let hi = base * 1.26;
            assert!(
                secs >= lo && secs <= hi,
                "attempt {}: {secs:.3}s not in [{lo:.3}, {hi:.3}]",
                i + 1
            );
        }
    }

    #[test]
    fn jitter_spans_both_sides() {
        assert_eq!(jittered(1.0, 0.0), Duration::from_secs_f64(0.75));
        assert_eq!(jittered(1.0, 0.5), Duration::from_secs(1));
        assert_eq!(jittered(1.0, 1.0), Duration::from_secs_f64(1.25));
        assert_eq!(jittered(4.0, 0.75), Duration::from_secs_f64(4.5));
    }

    #[test]
    fn zero_initial_delay_is_immediate() {
        let config = BackoffConfig {
            initial_delay: Duration::ZERO,
            ..BackoffConfig::default()
        };
        assert_eq!(config.delay_for_attempt(3), Duration::ZERO);
    }
}
