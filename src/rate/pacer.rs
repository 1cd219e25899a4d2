//! Minimum request spacing
//!
//! Uses the governor crate with a one-cell bucket that refills once per
//! interval, so consecutive requests on a credential are at least one interval
//! apart while the first request goes out immediately.
//!
//! The bucket reads time from tokio's timer and waits with `tokio::time::sleep`,
//! so pacing shares one timeline with the budget waits and backoff sleeps and
//! follows a paused test clock.

use governor::clock::Clock as GovernorClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Governor clock measuring tokio time since the pacer was created
#[derive(Debug, Clone, Copy)]
struct TimerClock {
    origin: Instant,
}

impl GovernorClock for TimerClock {
    type Instant = Duration;

    fn now(&self) -> Duration {
        Instant::now().saturating_duration_since(self.origin)
    }
}

type Limiter = Governor<NotKeyed, InMemoryState, TimerClock, NoOpMiddleware<Duration>>;

/// Spaces out requests issued on one credential
#[derive(Clone)]
pub struct RequestPacer {
    limiter: Option<Arc<Limiter>>,
    clock: TimerClock,
    interval: Duration,
}

impl RequestPacer {
    /// Create a pacer; a zero interval disables pacing
    pub fn new(interval: Duration) -> Self {
        let clock = TimerClock {
            origin: Instant::now(),
        };
        let limiter = Quota::with_period(interval)
            .map(|quota| Arc::new(Governor::direct_with_clock(quota, &clock)));
        Self {
            limiter,
            clock,
            interval,
        }
    }

    /// A pacer that never waits
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Wait until the next request may be issued, then take its slot
    pub async fn ready(&self) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        while let Err(not_until) = limiter.check() {
            tokio::time::sleep(not_until.wait_time_from(self.clock.now())).await;
        }
    }

    /// Configured spacing
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether pacing is active
    pub fn is_paced(&self) -> bool {
        self.limiter.is_some()
    }
}

impl Default for RequestPacer {
    fn default() -> Self {
        Self::unpaced()
    }
}

impl std::fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPacer")
            .field("interval", &self.interval)
            .finish()
    }
}
