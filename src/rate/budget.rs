//! Primary rate limit tracking
//!
//! The server is the source of truth: every observation replaces the previous
//! state wholesale, so a higher `remaining` after a quota reset is accepted as-is.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::str::FromStr;

/// Header carrying the request quota for the window
pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
/// Header carrying the requests left in the window
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Header carrying the requests spent in the window
pub const USED_HEADER: &str = "x-ratelimit-used";
/// Header carrying the window reset time (epoch seconds)
pub const RESET_HEADER: &str = "x-ratelimit-reset";
/// Header naming the quota bucket (core, graphql, search, ...)
pub const RESOURCE_HEADER: &str = "x-ratelimit-resource";
/// Header carrying the mandated wait in seconds
pub const RETRY_AFTER_HEADER: &str = "retry-after";

/// Wait used when the quota is exhausted but no reset time was sent
const DEFAULT_EXHAUSTED_WAIT_SECS: i64 = 60;

/// Upper bound applied to `retry-after` values
const MAX_RETRY_AFTER_SECS: i64 = 24 * 60 * 60;

/// Rate signals lifted from a single response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateHeaders {
    /// Quota size for the window
    pub limit: Option<u32>,
    /// Requests left in the window
    pub remaining: Option<u32>,
    /// Requests spent in the window
    pub used: Option<u32>,
    /// Window reset, epoch seconds
    pub reset: Option<i64>,
    /// Quota bucket name
    pub resource: Option<String>,
    /// Mandated wait in seconds
    pub retry_after: Option<u64>,
}

impl RateHeaders {
    /// Parse the rate headers of a response. Malformed values are treated as absent.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            limit: header_value(headers, LIMIT_HEADER),
            remaining: header_value(headers, REMAINING_HEADER),
            used: header_value(headers, USED_HEADER),
            reset: header_value(headers, RESET_HEADER),
            resource: headers
                .get(RESOURCE_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            retry_after: header_value(headers, RETRY_AFTER_HEADER),
        }
    }

    /// Whether the primary quota is spent
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }

    /// Whether any rate signal was present at all
    pub fn is_empty(&self) -> bool {
        self.limit.is_none()
            && self.remaining.is_none()
            && self.reset.is_none()
            && self.retry_after.is_none()
    }
}

fn header_value<T: FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}

/// Rate state as of the most recent response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateState {
    /// Requests left, `None` when the server did not say
    pub remaining: Option<u32>,
    /// Window reset, epoch seconds
    pub reset_at_epoch_seconds: Option<i64>,
    /// Mandated wait in seconds
    pub retry_after_seconds: Option<u64>,
    /// When the response carrying these values was observed
    pub observed_at: DateTime<Utc>,
}

/// Snapshot of the budget for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    /// Whether a wait is currently mandated
    pub is_rate_limited: bool,
    /// Seconds until requests may resume
    pub seconds_remaining: i64,
    /// When requests may resume
    pub reset_at: Option<DateTime<Utc>>,
    /// Requests left in the window as last reported
    pub remaining: Option<u32>,
}

/// Tracks the primary quota of one credential.
///
/// Pure state holder: it never sleeps and never performs I/O.
#[derive(Debug, Clone, Default)]
pub struct RateBudget {
    state: Option<RateState>,
}

impl RateBudget {
    /// Create a budget with nothing observed yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the state with the values of a fresh response
    pub fn observe(&mut self, headers: &RateHeaders, now: DateTime<Utc>) -> RateState {
        let state = RateState {
            remaining: headers.remaining,
            reset_at_epoch_seconds: headers.reset,
            retry_after_seconds: headers.retry_after,
            observed_at: now,
        };
        self.state = Some(state.clone());
        state
    }

    /// Current state, if any response has been observed
    pub fn state(&self) -> Option<&RateState> {
        self.state.as_ref()
    }

    /// When the next request may be issued, or `None` if it may go now.
    ///
    /// An exhausted quota waits for the reset (at least one second after the
    /// observation, sixty when no reset was sent); otherwise a `retry-after`
    /// waits that long from the observation.
    pub fn must_wait_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let state = self.state.as_ref()?;

        let wake = if state.remaining == Some(0) {
            let floor = state.observed_at + ChronoDuration::seconds(1);
            match state
                .reset_at_epoch_seconds
                .and_then(|reset| Utc.timestamp_opt(reset, 0).single())
            {
                Some(reset) => reset.max(floor),
                None => state.observed_at + ChronoDuration::seconds(DEFAULT_EXHAUSTED_WAIT_SECS),
            }
        } else if let Some(retry_after) = state.retry_after_seconds {
            let secs = i64::try_from(retry_after)
                .unwrap_or(MAX_RETRY_AFTER_SECS)
                .min(MAX_RETRY_AFTER_SECS);
            state.observed_at + ChronoDuration::seconds(secs)
        } else {
            return None;
        };

        (wake > now).then_some(wake)
    }

    /// Reporting snapshot at `now`
    pub fn status(&self, now: DateTime<Utc>) -> RateLimitStatus {
        let wake = self.must_wait_until(now);
        RateLimitStatus {
            is_rate_limited: wake.is_some(),
            seconds_remaining: wake.map_or(0, |w| (w - now).num_seconds().max(0)),
            reset_at: wake,
            remaining: self.state.as_ref().and_then(|s| s.remaining),
        }
    }
}
