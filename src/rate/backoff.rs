//! Retry delay computation

use crate::types::BackoffType;
use rand::Rng;
use std::time::Duration;

/// Retry policy for one page request.
///
/// `attempt` counts consecutive failures of the same page, starting at 0 and
/// resetting after every accepted page.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Growth of the delay between attempts
    pub backoff_type: BackoffType,
    /// Delay for attempt 0
    pub base: Duration,
    /// Upper bound for computed delays
    pub cap: Duration,
    /// Fraction in `[0, 1)` shaved off randomly to spread retries
    pub jitter: f64,
    /// Total calls allowed for the same page
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::Exponential,
            base: Duration::from_secs(1),
            cap: Duration::from_secs(60),
            jitter: 0.1,
            max_attempts: 5,
        }
    }
}

impl Backoff {
    /// Create a policy with the default jitter and attempt budget
    pub fn new(backoff_type: BackoffType, base: Duration, cap: Duration) -> Self {
        Self {
            backoff_type,
            base,
            cap,
            ..Self::default()
        }
    }

    /// Set the jitter fraction (clamped to `[0, 0.5]`)
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 0.5)
        } else {
            0.0
        };
        self
    }

    /// Set the attempt budget (at least one call)
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delay for an attempt before jitter, capped
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = match self.backoff_type {
            BackoffType::Constant => 1,
            BackoffType::Linear => attempt.saturating_add(1),
            BackoffType::Exponential => 2u32.saturating_pow(attempt),
        };

        self.base
            .checked_mul(factor)
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Delay before retrying after failure number `attempt`.
    ///
    /// A server-provided `hint` (`retry-after`) is returned unchanged.
    pub fn next_delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            return hint;
        }

        let delay = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return delay;
        }

        let shave = rand::rng().random_range(0.0..self.jitter);
        delay.mul_f64(1.0 - shave)
    }

    /// Whether failure number `attempt` may be followed by another call
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.max_attempts
    }
}
