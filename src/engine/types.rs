//! Engine types
//!
//! Session configuration, driver states and per-session statistics.

use crate::error::{FailureKind, FetchFailure};
use crate::rate::Backoff;
use crate::types::Identity;
use futures::stream::BoxStream;
use std::fmt;

/// Lazy stream of identities produced by one fetch session.
///
/// Nothing is requested until the stream is polled. A terminal failure is
/// yielded exactly once as the last item.
pub type FetchStream = BoxStream<'static, Result<Identity, FetchFailure>>;

/// Per-session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Items requested per page
    pub page_size: u8,
    /// Retry policy for one page
    pub backoff: Backoff,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            backoff: Backoff::default(),
        }
    }
}

impl SessionConfig {
    /// Create a session config
    #[must_use]
    pub fn new(page_size: u8, backoff: Backoff) -> Self {
        Self { page_size, backoff }
    }
}

/// Where the pagination driver currently is.
///
/// Accepting a page is not a state of its own: the driver emits the page and
/// moves to `Requesting` (more pages) or `Done` (last page) in the same step,
/// so no caller ever observes a driver parked on an accepted page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Created, nothing requested yet
    Idle,
    /// About to issue (or issuing) a page request
    Requesting,
    /// Waiting for the primary quota to reset
    Throttled,
    /// Backing off before retrying the same page
    Retrying,
    /// Last page consumed
    Done,
    /// Ended with a fatal or exhausted failure
    Failed(FailureKind),
    /// Ended by the caller
    Cancelled,
}

impl DriverState {
    /// Whether no further requests will be made
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed(_) | Self::Cancelled)
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Requesting => f.write_str("requesting"),
            Self::Throttled => f.write_str("throttled"),
            Self::Retrying => f.write_str("retrying"),
            Self::Done => f.write_str("done"),
            Self::Failed(kind) => write!(f, "failed ({kind})"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Statistics from a fetch session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Network calls issued
    pub requests: usize,
    /// Pages accepted (network or cache)
    pub pages: usize,
    /// Pages served from the cache, revalidated ones included
    pub cache_hits: usize,
    /// Stale cached pages confirmed by a 304
    pub revalidated: usize,
    /// Items emitted
    pub items: usize,
    /// Primary-limit responses
    pub primary_limited: usize,
    /// Retries after secondary limits or transient errors
    pub retries: usize,
}

impl SessionStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an accepted page
    pub fn add_page(&mut self, items: usize, from_cache: bool) {
        self.pages += 1;
        self.items += items;
        if from_cache {
            self.cache_hits += 1;
        }
    }
}
