//! Per-credential coordination
//!
//! One coordinator exists per credential. It owns the shared rate budget, the
//! pacer and the single-flight gate, so concurrent sessions on the same
//! credential see the same quota and never have two calls in flight.

use crate::rate::{RateBudget, RateHeaders, RateLimitStatus, RateState, RequestPacer};
use crate::types::Credential;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{AcquireError, Semaphore, SemaphorePermit};
use tokio::time::Instant;

/// Wall clock anchored at creation that advances with the tokio timer.
///
/// Rate deadlines are absolute wall-clock times while sleeps run on the
/// runtime timer; deriving `now` from the timer keeps both on one timeline,
/// including under a paused test clock.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin_utc: DateTime<Utc>,
    origin: Instant,
}

impl Clock {
    /// Anchor a clock at the current time
    pub fn new() -> Self {
        Self {
            origin_utc: Utc::now(),
            origin: Instant::now(),
        }
    }

    /// Current wall-clock time
    pub fn now(&self) -> DateTime<Utc> {
        let elapsed =
            ChronoDuration::from_std(self.origin.elapsed()).unwrap_or_else(|_| ChronoDuration::zero());
        self.origin_utc + elapsed
    }

    /// Time left until `deadline`, zero when it has passed
    pub fn until(&self, deadline: DateTime<Utc>) -> Duration {
        (deadline - self.now()).to_std().unwrap_or(Duration::ZERO)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state of one credential
#[derive(Debug)]
pub struct CredentialCoordinator {
    credential: Credential,
    budget: Mutex<RateBudget>,
    pacer: RequestPacer,
    gate: Semaphore,
    clock: Clock,
}

impl CredentialCoordinator {
    /// Create a coordinator with a fresh budget
    pub fn new(credential: Credential, pacer: RequestPacer) -> Self {
        Self {
            credential,
            budget: Mutex::new(RateBudget::new()),
            pacer,
            gate: Semaphore::new(1),
            clock: Clock::new(),
        }
    }

    /// Credential this coordinator governs
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Pacer shared by all sessions on the credential
    pub fn pacer(&self) -> &RequestPacer {
        &self.pacer
    }

    /// Clock used for rate deadlines
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Permission to issue the next call on this credential
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, AcquireError> {
        self.gate.acquire().await
    }

    /// Record the rate headers of a fresh response
    pub fn observe(&self, headers: &RateHeaders) -> RateState {
        let now = self.clock.now();
        self.budget().observe(headers, now)
    }

    /// Deadline mandated by the budget, if one lies in the future
    pub fn must_wait_until(&self) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        self.budget().must_wait_until(now)
    }

    /// Reporting snapshot of the budget
    pub fn status(&self) -> RateLimitStatus {
        let now = self.clock.now();
        self.budget().status(now)
    }

    /// Most recent rate state
    pub fn state(&self) -> Option<RateState> {
        self.budget().state().cloned()
    }

    fn budget(&self) -> MutexGuard<'_, RateBudget> {
        self.budget.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
