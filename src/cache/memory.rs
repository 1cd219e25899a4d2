//! In-memory page cache

use super::{CacheKey, CachedPage, PageCache};
use crate::pagination::Validators;
use crate::types::{FetchKey, Page};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    page: Page,
    validators: Validators,
    stored_at: Instant,
}

/// Process-local cache with an optional time-to-live
#[derive(Debug, Default)]
pub struct MemoryPageCache {
    entries: RwLock<HashMap<CacheKey, Entry>>,
    ttl: Option<Duration>,
}

impl MemoryPageCache {
    /// Cache whose entries never expire
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache whose entries expire after `ttl`
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::default(),
            ttl: Some(ttl),
        }
    }

    /// Configured time-to-live
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Drop every cached page of one listing; returns how many were removed
    pub fn remove(&self, key: &FetchKey) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|cache_key, _| &cache_key.key != key);
        before - entries.len()
    }

    /// Drop everything
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    /// Number of stored pages, expired ones included until next lookup
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_fresh(&self, entry: &Entry) -> bool {
        self.ttl.map_or(true, |ttl| entry.stored_at.elapsed() < ttl)
    }
}

impl PageCache for MemoryPageCache {
    fn lookup(&self, key: &CacheKey) -> Option<CachedPage> {
        let hit = {
            let entries = self.entries.read().ok()?;
            let entry = entries.get(key)?;
            let fresh = self.is_fresh(entry);
            (fresh || !entry.validators.is_empty()).then(|| CachedPage {
                page: entry.page.clone(),
                validators: entry.validators.clone(),
                fresh,
            })
        };

        if hit.is_none() {
            debug!(key = %key.key, token = %key.token, "evicting expired page");
            if let Ok(mut entries) = self.entries.write() {
                entries.remove(key);
            }
        }
        hit
    }

    fn store(&self, key: CacheKey, page: Page, validators: Validators) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                key,
                Entry {
                    page,
                    validators,
                    stored_at: Instant::now(),
                },
            );
        }
    }
}
