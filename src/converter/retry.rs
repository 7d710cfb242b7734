//! Backoff between retries of a failed batch

use std::time::Duration;

/// Upper bound on any single retry delay
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff: `initial_delay * multiplier^attempt`, capped at `max_delay`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    pub const fn new(initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            multiplier,
            max_delay,
        }
    }

    /// Doubling backoff starting at `initial_delay`, capped at 30 seconds
    pub fn doubling(initial_delay: Duration) -> Self {
        Self::new(initial_delay, 2.0, MAX_RETRY_DELAY)
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let pow = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let scaled = if pow.is_finite() && pow < 1e9 {
            self.initial_delay.mul_f64(pow)
        } else {
            self.max_delay
        };
        scaled.min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::doubling(Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubling_progression() {
        let policy = BackoffPolicy::doubling(Duration::from_millis(100));
        let cases = [(0, 100), (1, 200), (2, 400), (3, 800)];
        for (attempt, expected_ms) in cases {
            assert_eq!(
                policy.next_delay(attempt).as_millis(),
                expected_ms,
                "attempt {attempt}"
            );
        }
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = BackoffPolicy::doubling(Duration::from_secs(1));
        assert_eq!(policy.next_delay(5), Duration::from_secs(30));
        assert_eq!(policy.next_delay(1000), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_initial_delay() {
        let policy = BackoffPolicy::doubling(Duration::ZERO);
        assert_eq!(policy.next_delay(4), Duration::ZERO);
    }
}
