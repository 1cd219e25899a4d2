//! Status classification shared by the REST and GraphQL clients

use super::types::Outcome;
use crate::error::Error;
use crate::rate::RateHeaders;
use std::time::Duration;

/// Longest body excerpt carried in outcome details
const DETAIL_LIMIT: usize = 200;

/// What a response status (plus its rate signals) means for the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 2xx; the body still has to parse
    Accept,
    /// 304; the conditional request matched the held page
    NotModified,
    /// Primary quota exhausted
    PrimaryLimited,
    /// Secondary throttle with an optional mandated wait
    SecondaryLimited(Option<Duration>),
    /// Transient server failure
    Retryable,
    /// Permanent failure
    Fatal,
}

/// Classify a status code.
///
/// 403 and 429 are throttles only when the server says so: exhausted quota,
/// a `retry-after`, a bare 429, or a 403 body naming a secondary limit.
/// Anything else in 4xx is permanent.
pub fn classify_status(status: u16, headers: &RateHeaders, body: &str) -> Classification {
    match status {
        200..=299 => Classification::Accept,
        304 => Classification::NotModified,
        403 | 429 => {
            if headers.is_exhausted() {
                Classification::PrimaryLimited
            } else if let Some(secs) = headers.retry_after {
                Classification::SecondaryLimited(Some(Duration::from_secs(secs)))
            } else if status == 429 || mentions_secondary_limit(body) {
                Classification::SecondaryLimited(None)
            } else {
                Classification::Fatal
            }
        }
        500..=599 => Classification::Retryable,
        _ => Classification::Fatal,
    }
}

fn mentions_secondary_limit(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("secondary rate limit") || lower.contains("abuse")
}

impl Classification {
    /// Outcome for a non-accepted response
    pub fn into_outcome(self, status: u16, headers: RateHeaders, body: &str) -> Outcome {
        match self {
            Self::Accept | Self::Fatal => Outcome::fatal(
                Some(status),
                format!("HTTP {status}: {}", excerpt(body)),
            ),
            Self::NotModified => Outcome::NotModified { headers },
            Self::PrimaryLimited => Outcome::PrimaryLimited { headers },
            Self::SecondaryLimited(retry_after) => Outcome::SecondaryLimited { retry_after },
            Self::Retryable => Outcome::retryable(format!("HTTP {status}: {}", excerpt(body))),
        }
    }
}

/// Outcome for a 2xx whose body is not a valid page.
///
/// An exhausted quota explains a garbled body, so that case waits for the
/// reset instead of failing.
pub fn unparseable_success(status: u16, headers: RateHeaders, detail: &str) -> Outcome {
    if headers.is_exhausted() {
        Outcome::PrimaryLimited { headers }
    } else {
        Outcome::fatal(Some(status), format!("invalid page body: {detail}"))
    }
}

/// Outcome for a request that produced no response
pub fn transport_outcome(err: &Error) -> Outcome {
    match err {
        Error::Http(e) if e.is_builder() => {
            Outcome::fatal(None, format!("invalid request: {e}"))
        }
        Error::Http(e) if e.is_timeout() => Outcome::retryable(format!("timeout: {e}")),
        Error::Http(e) if e.is_connect() => Outcome::retryable(format!("connect failed: {e}")),
        Error::Http(e) => Outcome::retryable(format!("transport error: {e}")),
        Error::InvalidUrl(e) => Outcome::fatal(None, format!("invalid URL: {e}")),
        other => Outcome::retryable(other.to_string()),
    }
}

/// Trim a body to a loggable excerpt
pub fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(DETAIL_LIMIT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
