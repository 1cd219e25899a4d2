//! Tests for the page cache

use super::*;
use crate::types::{Identity, PageToken};
use std::time::Duration;

fn page(items: &[&str], next: Option<&str>) -> Page {
    Page::new(
        items.iter().map(|i| Identity::from(*i)).collect(),
        next.map(str::to_string),
    )
}

fn first(key: FetchKey) -> CacheKey {
    CacheKey::new(key, 30, PageToken::first())
}

fn etag(value: &str) -> Validators {
    Validators::new(Some(value.to_string()), None)
}

#[test]
fn test_lookup_miss_then_hit() {
    let cache = MemoryPageCache::new();
    let key = first(FetchKey::stargazers("octo", "hello"));

    assert!(cache.lookup(&key).is_none());
    cache.store(key.clone(), page(&["alice"], Some("next")), etag("\"v1\""));

    let hit = cache.lookup(&key).unwrap();
    assert!(hit.fresh);
    assert_eq!(hit.page.items, vec![Identity::from("alice")]);
    assert_eq!(hit.page.next_token.as_str(), Some("next"));
    assert_eq!(hit.validators, etag("\"v1\""));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_key_includes_page_size_and_token() {
    let cache = MemoryPageCache::new();
    let fetch_key = FetchKey::stargazers("octo", "hello");
    cache.store(
        first(fetch_key.clone()),
        page(&["alice"], None),
        Validators::default(),
    );

    assert!(cache
        .lookup(&CacheKey::new(fetch_key.clone(), 100, PageToken::first()))
        .is_none());
    assert!(cache
        .lookup(&CacheKey::new(fetch_key, 30, PageToken::from("p2")))
        .is_none());
}

#[test]
fn test_remove_only_drops_one_listing() {
    let cache = MemoryPageCache::new();
    let hello = FetchKey::stargazers("octo", "hello");
    let other = FetchKey::starred("octocat");

    cache.store(first(hello.clone()), page(&["a"], Some("p2")), Validators::default());
    cache.store(
        CacheKey::new(hello.clone(), 30, PageToken::from("p2")),
        page(&["b"], None),
        Validators::default(),
    );
    cache.store(
        first(other.clone()),
        page(&["rust-lang/rust"], None),
        Validators::default(),
    );

    assert_eq!(cache.remove(&hello), 2);
    assert_eq!(cache.len(), 1);
    assert!(cache.lookup(&first(other)).is_some());
}

#[test]
fn test_clear() {
    let cache = MemoryPageCache::new();
    cache.store(first(FetchKey::starred("a")), page(&["x/y"], None), Validators::default());
    assert!(!cache.is_empty());
    cache.clear();
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ttl_expiry_evicts_page_without_validators() {
    let cache = MemoryPageCache::with_ttl(Duration::from_millis(20));
    assert_eq!(cache.ttl(), Some(Duration::from_millis(20)));
    let key = first(FetchKey::starred("octocat"));
    cache.store(key.clone(), page(&["x/y"], None), Validators::default());

    assert!(cache.lookup(&key).is_some());
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(cache.lookup(&key).is_none());
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_expired_page_with_validators_is_kept_stale() {
    let cache = MemoryPageCache::with_ttl(Duration::from_millis(20));
    let key = first(FetchKey::starred("octocat"));
    let validators = Validators::new(None, Some("Wed, 21 Oct 2015 07:28:00 GMT".into()));
    cache.store(key.clone(), page(&["x/y"], None), validators.clone());

    tokio::time::sleep(Duration::from_millis(40)).await;
    let stale = cache.lookup(&key).unwrap();
    assert!(!stale.fresh);
    assert_eq!(stale.validators, validators);
    assert_eq!(cache.len(), 1);

    // storing again restarts the time-to-live
    cache.store(key.clone(), stale.page, stale.validators);
    assert!(cache.lookup(&key).unwrap().fresh);
}
