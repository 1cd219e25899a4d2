//! Page cache module
//!
//! An optional collaborator of the pagination driver. A fresh cached page
//! stands in for a network call: the driver neither observes rate headers nor
//! takes the credential gate on a hit. A page past its time-to-live that kept
//! an `ETag` or `Last-Modified` is revalidated with a conditional request and
//! served again on a 304. Fetches behave identically without a cache.

mod memory;

pub use memory::MemoryPageCache;

use crate::pagination::Validators;
use crate::types::{FetchKey, Page, PageToken};

/// Addresses one page of one listing
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Listing the page belongs to
    pub key: FetchKey,
    /// Page size the page was requested with
    pub page_size: u8,
    /// Token the page was requested with
    pub token: PageToken,
}

impl CacheKey {
    /// Create a cache key
    pub fn new(key: FetchKey, page_size: u8, token: PageToken) -> Self {
        Self {
            key,
            page_size,
            token,
        }
    }
}

/// A page found in the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPage {
    /// Stored page
    pub page: Page,
    /// Validators the page was served with
    pub validators: Validators,
    /// Within its time-to-live; a stale page must be revalidated first
    pub fresh: bool,
}

/// Storage for previously fetched pages
pub trait PageCache: Send + Sync {
    /// Cached page for `key`, if any.
    ///
    /// Stale pages are only returned when they can be revalidated.
    fn lookup(&self, key: &CacheKey) -> Option<CachedPage>;

    /// Remember a page; storing again restarts its time-to-live
    fn store(&self, key: CacheKey, page: Page, validators: Validators);
}

#[cfg(test)]
mod tests;
