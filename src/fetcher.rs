//! Public fetch entry point
//!
//! A [`Fetcher`] owns the page client, the optional page cache and the
//! registry of credential coordinators. Sessions started with the same
//! credential share one coordinator, and with it one rate budget, one pacer
//! and one single-flight gate. The registry lives in the fetcher instance;
//! two fetchers never share state.

use crate::accumulator::dedup;
use crate::cache::{MemoryPageCache, PageCache};
use crate::config::{Settings, MAX_PAGE_SIZE};
use crate::engine::{CredentialCoordinator, FetchStream, PaginationDriver, SessionConfig};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::pagination::{GraphQlPageClient, PageClient, RestPageClient};
use crate::rate::{Backoff, RateLimitStatus, RequestPacer};
use crate::types::{ApiFlavor, Credential, FetchKey};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

// ============================================================================
// Configuration
// ============================================================================

/// Defaults applied to every session of a fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Page size used by the convenience methods
    pub page_size: u8,
    /// Retry policy template; `max_attempts` is taken from [`FetchOptions`]
    pub backoff: Backoff,
    /// Minimum spacing between requests on one credential
    pub request_interval: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            backoff: Backoff::default(),
            request_interval: Duration::from_secs(1),
        }
    }
}

impl FetcherConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: u8) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the request spacing; zero disables pacing
    #[must_use]
    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }

    /// Options matching these defaults
    pub fn default_options(&self) -> FetchOptions {
        FetchOptions::new(self.page_size, self.backoff.max_attempts)
    }
}

/// Per-call fetch options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Items per page (1..=100)
    pub page_size: u8,
    /// Total calls allowed for one page
    pub max_attempts: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            max_attempts: 5,
        }
    }
}

impl FetchOptions {
    /// Create options
    pub fn new(page_size: u8, max_attempts: u32) -> Self {
        Self {
            page_size,
            max_attempts,
        }
    }

    /// Reject options no session can run with
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::invalid_value(
                "page_size",
                format!("must be between 1 and {MAX_PAGE_SIZE}, got {}", self.page_size),
            ));
        }
        if self.max_attempts == 0 {
            return Err(Error::invalid_value("max_attempts", "must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// Starts rate-governed fetch sessions
pub struct Fetcher {
    client: Arc<dyn PageClient>,
    config: FetcherConfig,
    cache: Option<Arc<dyn PageCache>>,
    coordinators: Mutex<HashMap<Credential, Arc<CredentialCoordinator>>>,
}

impl Fetcher {
    /// Create a fetcher over a page client
    pub fn new(client: Arc<dyn PageClient>, config: FetcherConfig) -> Self {
        Self {
            client,
            config,
            cache: None,
            coordinators: Mutex::new(HashMap::new()),
        }
    }

    /// Serve pages from `cache` when possible and store fetched pages in it
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn PageCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build a fetcher from settings: HTTP client, page client flavor and cache
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = HttpClient::with_config(settings.http_config())?;
        let client: Arc<dyn PageClient> = match settings.api.flavor {
            ApiFlavor::Rest => Arc::new(RestPageClient::new(http)),
            ApiFlavor::Graphql => Arc::new(GraphQlPageClient::new(
                http,
                settings.api.graphql_url.clone(),
            )),
        };

        let config = FetcherConfig::new()
            .with_page_size(settings.fetch.page_size)
            .with_backoff(settings.backoff())
            .with_request_interval(settings.request_interval());

        let fetcher = Self::new(client, config);
        if !settings.cache.enabled {
            return Ok(fetcher);
        }

        let cache = match settings.cache_ttl() {
            Some(ttl) => MemoryPageCache::with_ttl(ttl),
            None => MemoryPageCache::new(),
        };
        Ok(fetcher.with_cache(Arc::new(cache)))
    }

    /// Fetcher defaults
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Page client name
    pub fn client_name(&self) -> &'static str {
        self.client.name()
    }

    /// Coordinator for `credential`, created on first use
    pub fn coordinator(&self, credential: &Credential) -> Arc<CredentialCoordinator> {
        let mut coordinators = self
            .coordinators
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(coordinators.entry(credential.clone()).or_insert_with(|| {
            debug!(anonymous = credential.is_anonymous(), "creating credential coordinator");
            Arc::new(CredentialCoordinator::new(
                credential.clone(),
                RequestPacer::new(self.config.request_interval),
            ))
        }))
    }

    /// Start a lazy fetch of every item of `key`.
    ///
    /// Options are validated before anything is requested. The returned
    /// stream issues its first request when first polled.
    pub fn start_fetch(
        &self,
        key: FetchKey,
        credential: &Credential,
        options: FetchOptions,
        cancel: CancellationToken,
    ) -> Result<FetchStream> {
        options.validate()?;

        info!(
            key = %key,
            kind = ?key.kind,
            page_size = options.page_size,
            max_attempts = options.max_attempts,
            client = self.client.name(),
            "starting fetch session"
        );

        let session = SessionConfig::new(
            options.page_size,
            self.config
                .backoff
                .clone()
                .with_max_attempts(options.max_attempts),
        );
        let mut driver = PaginationDriver::new(
            key,
            Arc::clone(&self.client),
            self.coordinator(credential),
            session,
            cancel,
        );
        if let Some(cache) = &self.cache {
            driver = driver.with_cache(Arc::clone(cache));
        }
        Ok(driver.into_stream())
    }

    /// Deduplicated stargazers of `owner/repo` with default options
    pub fn stargazers(
        &self,
        owner: &str,
        repo: &str,
        credential: &Credential,
        cancel: CancellationToken,
    ) -> Result<FetchStream> {
        let stream = self.start_fetch(
            FetchKey::stargazers(owner, repo),
            credential,
            self.config.default_options(),
            cancel,
        )?;
        Ok(dedup(stream).boxed())
    }

    /// Deduplicated repositories starred by `user` with default options
    pub fn starred(
        &self,
        user: &str,
        credential: &Credential,
        cancel: CancellationToken,
    ) -> Result<FetchStream> {
        let stream = self.start_fetch(
            FetchKey::starred(user),
            credential,
            self.config.default_options(),
            cancel,
        )?;
        Ok(dedup(stream).boxed())
    }

    /// Rate limit snapshot for `credential`
    pub fn rate_limit_status(&self, credential: &Credential) -> RateLimitStatus {
        self.coordinator(credential).status()
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("client", &self.client.name())
            .field("config", &self.config)
            .field("has_cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}
