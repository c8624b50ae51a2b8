// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cache of rendered page payloads with path revalidation.
//!
//! Keys are a path plus its query string (`/?page=2`). Revalidating a path
//! drops the path and every query variant of it, so the next request
//! rebuilds from the store.

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Root page: the public image feed.
pub const ROOT_PATH: &str = "/";

/// Upper bound on cached pages.
pub const MAX_ENTRIES: usize = 512;

#[derive(Clone)]
struct CachedPage {
    body: serde_json::Value,
    cached_at: Instant,
}

/// Shared page cache. Safe to use from any request.
pub struct PageCache {
    entries: DashMap<String, CachedPage>,
    ttl: Duration,
    max_entries: usize,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries,
        }
    }

    /// Build the cache key for a path and optional query string.
    pub fn key(path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}?{}", path, q),
            _ => path.to_string(),
        }
    }

    /// Fresh cached payload for `key`, if any. Expired entries are dropped.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entry = self.entries.get(key)?;
        if entry.cached_at.elapsed() < self.ttl {
            return Some(entry.body.clone());
        }
        drop(entry);
        self.entries.remove(key);
        None
    }

    /// Cache `body` under `key`.
    ///
    /// When full, expired entries are swept first and then the oldest
    /// entries are evicted until there is room.
    pub fn put(&self, key: String, body: serde_json::Value) {
        if self.max_entries == 0 {
            return;
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            self.make_room();
        }
        self.entries.insert(
            key,
            CachedPage {
                body,
                cached_at: Instant::now(),
            },
        );
    }

    fn make_room(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, page| page.cached_at.elapsed() < ttl);

        while self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.cached_at)
                .map(|entry| entry.key().clone());
            let Some(oldest) = oldest else {
                break;
            };
            self.entries.remove(&oldest);
        }
        tracing::debug!(remaining = self.entries.len(), "Evicted cached pages");
    }

    /// Invalidate `path` and all of its query variants. Returns how many
    /// entries were dropped.
    pub fn revalidate_path(&self, path: &str) -> usize {
        let prefix = format!("{}?", path);
        let before = self.entries.len();
        self.entries
            .retain(|key, _| key != path && !key.starts_with(&prefix));
        let dropped = before.saturating_sub(self.entries.len());

        tracing::debug!(path, dropped, "Revalidated cached path");
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_revalidate_drops_path_and_variants_only() {
        let cache = PageCache::new(Duration::from_secs(60));
        cache.put(PageCache::key("/", None), json!(1));
        cache.put(PageCache::key("/", Some("page=2")), json!(2));
        cache.put(PageCache::key("/profile", None), json!(3));

        assert_eq!(cache.revalidate_path("/"), 2);
        assert!(cache.get("/").is_none());
        assert!(cache.get("/?page=2").is_none());
        assert_eq!(cache.get("/profile"), Some(json!(3)));
    }

    #[test]
    fn test_expired_entries_are_not_served() {
        let cache = PageCache::new(Duration::ZERO);
        cache.put("/".to_string(), json!("stale"));
        assert!(cache.get("/").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_size_is_bounded() {
        let cache = PageCache::with_capacity(Duration::from_secs(60), 3);
        for page in 1..=10 {
            cache.put(PageCache::key("/", Some(&format!("page={}", page))), json!(page));
            std::thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("/?page=10"), Some(json!(10)));
        assert!(cache.get("/?page=1").is_none());

        // Overwriting a cached key does not evict anything
        cache.put("/?page=10".to_string(), json!("again"));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("/?page=9"), Some(json!(9)));
    }

    #[test]
    fn test_expired_entries_are_swept_when_full() {
        let cache = PageCache::with_capacity(Duration::from_millis(20), 4);
        for page in 1..=4 {
            cache.put(format!("/?page={}", page), json!(page));
        }
        std::thread::sleep(Duration::from_millis(30));

        cache.put("/?page=5".to_string(), json!(5));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("/?page=5"), Some(json!(5)));
    }

    #[test]
    fn test_key_ignores_empty_query() {
        assert_eq!(PageCache::key("/", Some("")), "/");
        assert_eq!(PageCache::key("/", Some("page=1")), "/?page=1");
    }
}
