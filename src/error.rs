//! Error types for stargazer
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//! Terminal outcomes of a paginated fetch are reported through
//! [`FetchFailure`], which is what a fetch stream yields on failure.

use crate::types::PageToken;
use std::fmt;
use thiserror::Error;

/// The main error type for stargazer
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Fetch Errors
    // ============================================================================
    #[error(transparent)]
    Fetch(#[from] FetchFailure),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }
}

/// Result type alias for stargazer
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

// ============================================================================
// Fetch Failures
// ============================================================================

/// Why a fetch session ended without reaching the last page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Credential, not-found or schema failure. Never retried.
    Fatal,
    /// The retry budget for one page ran out
    RetriesExhausted,
    /// The caller cancelled the session
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fatal => "fatal",
            Self::RetriesExhausted => "retries exhausted",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Terminal failure of a fetch session.
///
/// Carries the number of items already emitted and the token of the page that
/// could not be fetched, so the caller can decide whether the partial result
/// is usable or whether to resume from `last_token`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("fetch {kind} after {partial_count} items: {detail}")]
pub struct FetchFailure {
    /// Failure class
    pub kind: FailureKind,
    /// Items emitted before the failure
    pub partial_count: usize,
    /// Token of the page that was being requested
    pub last_token: PageToken,
    /// Upstream HTTP status, when one was received
    pub status: Option<u16>,
    /// Human-readable detail
    pub detail: String,
}

impl FetchFailure {
    /// Create a fatal failure
    pub fn fatal(
        partial_count: usize,
        last_token: PageToken,
        status: Option<u16>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: FailureKind::Fatal,
            partial_count,
            last_token,
            status,
            detail: detail.into(),
        }
    }

    /// Create a retries-exhausted failure
    pub fn retries_exhausted(
        partial_count: usize,
        last_token: PageToken,
        attempts: u32,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind: FailureKind::RetriesExhausted,
            partial_count,
            last_token,
            status: None,
            detail: format!("gave up after {attempts} attempts: {}", detail.into()),
        }
    }

    /// Create a cancellation outcome
    pub fn cancelled(partial_count: usize, last_token: PageToken) -> Self {
        Self {
            kind: FailureKind::Cancelled,
            partial_count,
            last_token,
            status: None,
            detail: "cancelled by caller".to_string(),
        }
    }

    /// Whether this failure is a fatal upstream rejection
    pub fn is_fatal(&self) -> bool {
        self.kind == FailureKind::Fatal
    }

    /// Whether the upstream reported the collection as missing
    pub fn is_not_found(&self) -> bool {
        self.is_fatal() && self.status == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("github_token");
        assert_eq!(
            err.to_string(),
            "Missing required config field: github_token"
        );

        let err = Error::http_status(404, "Not found");
        assert_eq!(err.to_string(), "HTTP 404: Not found");

        let err = Error::invalid_value("page_size", "must be at most 100");
        assert_eq!(
            err.to_string(),
            "Invalid config value for 'page_size': must be at most 100"
        );
    }

    #[test]
    fn test_fetch_failure_display() {
        let failure = FetchFailure::fatal(0, PageToken::first(), Some(401), "bad credentials");
        assert_eq!(failure.to_string(), "fetch fatal after 0 items: bad credentials");

        let failure = FetchFailure::retries_exhausted(
            100,
            PageToken::from("https://api.github.com/x?page=2"),
            3,
            "HTTP 502",
        );
        assert_eq!(
            failure.to_string(),
            "fetch retries exhausted after 100 items: gave up after 3 attempts: HTTP 502"
        );
        assert_eq!(failure.last_token.as_str(), Some("https://api.github.com/x?page=2"));
    }

    #[test]
    fn test_fetch_failure_predicates() {
        let not_found = FetchFailure::fatal(0, PageToken::first(), Some(404), "Not Found");
        assert!(not_found.is_fatal());
        assert!(not_found.is_not_found());

        let cancelled = FetchFailure::cancelled(12, PageToken::first());
        assert!(!cancelled.is_fatal());
        assert!(!cancelled.is_not_found());
        assert_eq!(cancelled.kind, FailureKind::Cancelled);
        assert_eq!(cancelled.partial_count, 12);
    }

    #[test]
    fn test_fetch_failure_into_error() {
        let err: Error = FetchFailure::cancelled(0, PageToken::first()).into();
        assert!(matches!(err, Error::Fetch(_)));
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
