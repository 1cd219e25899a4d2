//! Page outcome and the page client abstraction

use crate::rate::RateHeaders;
use crate::types::{Credential, FetchKey, Page, PageToken};
use async_trait::async_trait;
use std::time::Duration;

/// Cache validators a response carried (`ETag`, `Last-Modified`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    /// Entity tag, sent back as `If-None-Match`
    pub etag: Option<String>,
    /// Modification date, sent back as `If-Modified-Since`
    pub last_modified: Option<String>,
}

impl Validators {
    /// Create validators
    pub fn new(etag: Option<String>, last_modified: Option<String>) -> Self {
        Self {
            etag,
            last_modified,
        }
    }

    /// Whether there is nothing to revalidate with
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// Classified result of exactly one page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 2xx with a parseable page
    Success {
        /// Parsed page
        page: Page,
        /// Rate signals of the response
        headers: RateHeaders,
        /// Validators for a later conditional request
        validators: Validators,
    },
    /// 304 to a conditional request; the cached page is still current
    NotModified {
        /// Rate signals of the response
        headers: RateHeaders,
    },
    /// Primary quota exhausted; wait for the reset
    PrimaryLimited {
        /// Rate signals of the response
        headers: RateHeaders,
    },
    /// Secondary throttle; back off, honoring the hint when sent
    SecondaryLimited {
        /// Server-mandated wait
        retry_after: Option<Duration>,
    },
    /// Transient transport or server failure
    RetryableError {
        /// Human-readable cause
        detail: String,
    },
    /// Permanent failure; never retried
    FatalError {
        /// Upstream status when one was received
        status: Option<u16>,
        /// Human-readable cause
        detail: String,
    },
}

impl Outcome {
    /// Create a success outcome without validators
    pub fn success(page: Page, headers: RateHeaders) -> Self {
        Self::Success {
            page,
            headers,
            validators: Validators::default(),
        }
    }

    /// Create a retryable outcome
    pub fn retryable(detail: impl Into<String>) -> Self {
        Self::RetryableError {
            detail: detail.into(),
        }
    }

    /// Create a fatal outcome
    pub fn fatal(status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::FatalError {
            status,
            detail: detail.into(),
        }
    }

    /// Short label for logging
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::NotModified { .. } => "not_modified",
            Self::PrimaryLimited { .. } => "primary_limited",
            Self::SecondaryLimited { .. } => "secondary_limited",
            Self::RetryableError { .. } => "retryable",
            Self::FatalError { .. } => "fatal",
        }
    }
}

/// Performs one network call for one page and classifies the outcome.
///
/// Implementations never retry, never sleep and never mutate shared state;
/// those concerns belong to the pagination driver.
#[async_trait]
pub trait PageClient: Send + Sync {
    /// Request the page addressed by `token` (first page when `token` is first)
    async fn fetch_page(
        &self,
        key: &FetchKey,
        token: &PageToken,
        page_size: u8,
        credential: &Credential,
    ) -> Outcome;

    /// Request a page the caller already holds, sending `validators` so the
    /// server may answer [`Outcome::NotModified`].
    ///
    /// Clients without conditional support fetch the page unconditionally.
    async fn fetch_page_if_modified(
        &self,
        key: &FetchKey,
        token: &PageToken,
        page_size: u8,
        credential: &Credential,
        _validators: &Validators,
    ) -> Outcome {
        self.fetch_page(key, token, page_size, credential).await
    }

    /// Client name for logging
    fn name(&self) -> &'static str {
        "page-client"
    }
}
