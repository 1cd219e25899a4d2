//! Pagination driver
//!
//! Walks one listing page by page. Each step consults the cache, takes the
//! credential gate, honors the shared budget and the pacer, issues exactly
//! one page request and reacts to the classified outcome:
//!
//! | Outcome            | Reaction                                           |
//! |--------------------|----------------------------------------------------|
//! | `Success`          | observe headers, emit items, follow the next token |
//! | `NotModified`      | observe headers, emit the revalidated cached page  |
//! | `PrimaryLimited`   | observe headers, wait for the reset, same token    |
//! | `SecondaryLimited` | back off (hint wins), same token, spends an attempt|
//! | `RetryableError`   | back off, same token, spends an attempt            |
//! | `FatalError`       | terminal                                           |

use super::coordinator::CredentialCoordinator;
use super::types::{DriverState, FetchStream, SessionConfig, SessionStats};
use crate::cache::{CacheKey, PageCache};
use crate::error::{FailureKind, FetchFailure};
use crate::pagination::{Outcome, PageClient};
use crate::types::{FetchKey, Identity, Page, PageToken};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of one driver step
enum Step {
    /// A page was accepted
    Page(Vec<Identity>),
    /// Try the pending token again
    Again,
    /// The session ended with a failure
    Fail(FetchFailure),
}

/// State machine for one fetch session
pub struct PaginationDriver {
    key: FetchKey,
    client: Arc<dyn PageClient>,
    coordinator: Arc<CredentialCoordinator>,
    cache: Option<Arc<dyn PageCache>>,
    config: SessionConfig,
    cancel: CancellationToken,
    state: DriverState,
    confirmed_token: Option<PageToken>,
    pending_token: PageToken,
    attempt: u32,
    emitted: usize,
    stats: SessionStats,
}

impl PaginationDriver {
    /// Create a driver in the idle state
    pub fn new(
        key: FetchKey,
        client: Arc<dyn PageClient>,
        coordinator: Arc<CredentialCoordinator>,
        config: SessionConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            key,
            client,
            coordinator,
            cache: None,
            config,
            cancel,
            state: DriverState::Idle,
            confirmed_token: None,
            pending_token: PageToken::first(),
            attempt: 0,
            emitted: 0,
            stats: SessionStats::new(),
        }
    }

    /// Consult `cache` before every network call
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn PageCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Current state
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Token of the last consumed page, `None` before the first page
    pub fn confirmed_token(&self) -> Option<&PageToken> {
        self.confirmed_token.as_ref()
    }

    /// Token of the page being requested next
    pub fn pending_token(&self) -> &PageToken {
        &self.pending_token
    }

    /// Items emitted so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Session statistics
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Turn the driver into a lazy stream of identities
    pub fn into_stream(self) -> FetchStream {
        stream::unfold(self, |mut driver| async move {
            driver.next_page().await.map(|step| (step, driver))
        })
        .flat_map(|step| {
            let items = match step {
                Ok(items) => items.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(failure) => vec![Err(failure)],
            };
            stream::iter(items)
        })
        .boxed()
    }

    /// Advance to the next accepted page.
    ///
    /// Returns `Some(Ok(items))` per page, `Some(Err(_))` once on a terminal
    /// failure, then `None` forever.
    pub async fn next_page(&mut self) -> Option<Result<Vec<Identity>, FetchFailure>> {
        loop {
            match self.state {
                DriverState::Idle => {
                    debug!(key = %self.key, client = self.client.name(), "starting fetch");
                    self.pending_token = PageToken::first();
                    self.state = DriverState::Requesting;
                }
                state if state.is_terminal() => return None,
                _ => {}
            }

            if self.cancel.is_cancelled() {
                return Some(Err(self.cancelled()));
            }

            match self.step().await {
                Step::Page(items) => return Some(Ok(items)),
                Step::Again => {}
                Step::Fail(failure) => return Some(Err(failure)),
            }
        }
    }

    /// One pass through the `Requesting` state
    async fn step(&mut self) -> Step {
        let cache_key = self.cache.as_ref().map(|_| {
            CacheKey::new(
                self.key.clone(),
                self.config.page_size,
                self.pending_token.clone(),
            )
        });
        let stale = match (&self.cache, &cache_key) {
            (Some(cache), Some(cache_key)) => cache.lookup(cache_key),
            _ => None,
        };
        let stale = match stale {
            Some(cached) if cached.fresh => {
                debug!(key = %self.key, token = %self.pending_token, "page served from cache");
                return self.accept(cached.page, true);
            }
            stale => stale,
        };

        let coordinator = Arc::clone(&self.coordinator);
        let cancel = self.cancel.clone();

        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return Step::Fail(self.cancelled()),
            permit = coordinator.acquire() => permit,
        };
        let Ok(permit) = permit else {
            return Step::Fail(self.fail_fatal(None, "credential gate closed"));
        };

        if let Some(wake) = coordinator.must_wait_until() {
            let wait = coordinator.clock().until(wake);
            self.state = DriverState::Throttled;
            info!(
                key = %self.key,
                wait_ms = wait.as_millis() as u64,
                reset_at = %wake,
                "waiting for rate limit reset"
            );
            if !sleep_or_cancel(&cancel, wait).await {
                return Step::Fail(self.cancelled());
            }
            self.state = DriverState::Requesting;
        }

        if coordinator.pacer().is_paced() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Step::Fail(self.cancelled()),
                () = coordinator.pacer().ready() => {}
            }
        }

        if cancel.is_cancelled() {
            return Step::Fail(self.cancelled());
        }

        let outcome = match &stale {
            Some(cached) => {
                self.client
                    .fetch_page_if_modified(
                        &self.key,
                        &self.pending_token,
                        self.config.page_size,
                        coordinator.credential(),
                        &cached.validators,
                    )
                    .await
            }
            None => {
                self.client
                    .fetch_page(
                        &self.key,
                        &self.pending_token,
                        self.config.page_size,
                        coordinator.credential(),
                    )
                    .await
            }
        };
        self.stats.requests += 1;
        debug!(
            key = %self.key,
            token = %self.pending_token,
            attempt = self.attempt,
            outcome = outcome.label(),
            "page request finished"
        );

        match outcome {
            Outcome::Success {
                page,
                headers,
                validators,
            } => {
                coordinator.observe(&headers);
                drop(permit);
                if let (Some(cache), Some(cache_key)) = (&self.cache, cache_key) {
                    cache.store(cache_key, page.clone(), validators);
                }
                self.accept(page, false)
            }
            Outcome::NotModified { headers } => {
                coordinator.observe(&headers);
                drop(permit);
                match (stale, cache_key) {
                    (Some(cached), Some(cache_key)) => {
                        debug!(key = %self.key, token = %self.pending_token, "cached page revalidated");
                        if let Some(cache) = &self.cache {
                            cache.store(cache_key, cached.page.clone(), cached.validators);
                        }
                        self.stats.revalidated += 1;
                        self.accept(cached.page, true)
                    }
                    _ => Step::Fail(self.fail_fatal(Some(304), "not modified without a cached page")),
                }
            }
            Outcome::PrimaryLimited { headers } => {
                let state = coordinator.observe(&headers);
                self.stats.primary_limited += 1;
                self.state = DriverState::Throttled;
                warn!(
                    key = %self.key,
                    token = %self.pending_token,
                    reset = ?state.reset_at_epoch_seconds,
                    "primary rate limit reached"
                );
                Step::Again
            }
            Outcome::SecondaryLimited { retry_after } => {
                let detail = match retry_after {
                    Some(hint) => format!("secondary rate limit, retry after {}s", hint.as_secs()),
                    None => "secondary rate limit".to_string(),
                };
                self.retry(retry_after, detail, &cancel).await
            }
            Outcome::RetryableError { detail } => self.retry(None, detail, &cancel).await,
            Outcome::FatalError { status, detail } => {
                drop(permit);
                Step::Fail(self.fail_fatal(status, detail))
            }
        }
    }

    /// Back off before re-requesting the same page, or give up.
    ///
    /// Runs while the caller still holds the credential gate.
    async fn retry(
        &mut self,
        hint: Option<Duration>,
        detail: String,
        cancel: &CancellationToken,
    ) -> Step {
        let backoff = &self.config.backoff;
        if !backoff.should_retry(self.attempt) {
            let attempts = self.attempt + 1;
            warn!(key = %self.key, attempts, detail = %detail, "giving up on page");
            self.state = DriverState::Failed(FailureKind::RetriesExhausted);
            return Step::Fail(FetchFailure::retries_exhausted(
                self.emitted,
                self.pending_token.clone(),
                attempts,
                detail,
            ));
        }

        let delay = backoff.next_delay(self.attempt, hint);
        self.attempt += 1;
        self.stats.retries += 1;
        self.state = DriverState::Retrying;
        warn!(
            key = %self.key,
            attempt = self.attempt,
            max_attempts = backoff.max_attempts,
            wait_ms = delay.as_millis() as u64,
            detail = %detail,
            "retrying page"
        );

        if !sleep_or_cancel(cancel, delay).await {
            return Step::Fail(self.cancelled());
        }
        self.state = DriverState::Requesting;
        Step::Again
    }

    fn accept(&mut self, page: Page, from_cache: bool) -> Step {
        let Page { items, next_token } = page;
        self.attempt = 0;
        self.emitted += items.len();
        self.stats.add_page(items.len(), from_cache);

        let consumed = std::mem::replace(&mut self.pending_token, next_token);
        self.confirmed_token = Some(consumed);

        if self.pending_token.is_first() {
            self.state = DriverState::Done;
            info!(
                key = %self.key,
                items = self.emitted,
                pages = self.stats.pages,
                requests = self.stats.requests,
                "fetch complete"
            );
        } else {
            self.state = DriverState::Requesting;
        }
        Step::Page(items)
    }

    fn fail_fatal(&mut self, status: Option<u16>, detail: impl Into<String>) -> FetchFailure {
        let detail = detail.into();
        warn!(key = %self.key, status = ?status, detail = %detail, "fetch failed");
        self.state = DriverState::Failed(FailureKind::Fatal);
        FetchFailure::fatal(self.emitted, self.pending_token.clone(), status, detail)
    }

    fn cancelled(&mut self) -> FetchFailure {
        debug!(key = %self.key, items = self.emitted, "fetch cancelled");
        self.state = DriverState::Cancelled;
        FetchFailure::cancelled(self.emitted, self.pending_token.clone())
    }
}

impl std::fmt::Debug for PaginationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationDriver")
            .field("key", &self.key)
            .field("state", &self.state)
            .field("pending_token", &self.pending_token)
            .field("attempt", &self.attempt)
            .field("emitted", &self.emitted)
            .finish_non_exhaustive()
    }
}

/// Sleep for `duration`; `false` when cancelled first
async fn sleep_or_cancel(cancel: &CancellationToken, duration: Duration) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}
