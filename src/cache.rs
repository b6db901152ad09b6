//! Generic TTL cache (§3 `CacheEntry`), backed by `DashMap` the same way the
//! teacher's `PendingNonceManager` keeps per-key state: lock-free reads,
//! per-key locking only when a value needs replacing.

use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// A process-local, TTL-evicted cache. Readers never block on a refresh;
/// `get` returns `None` once an entry is expired and the caller is
/// responsible for repopulating it (directly, or via a background
/// refresher — see [`crate::price`]).
pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
    max_keys: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_keys: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_keys,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Inserts a value with this cache's configured TTL. If the cache is at
    /// its size bound and `key` is new, evicts the entry with the earliest
    /// expiry (an approximation of LRU using expiry order, since we don't
    /// track last-access time separately).
    pub fn insert(&self, key: K, value: V) {
        if self.entries.len() >= self.max_keys && !self.entries.contains_key(&key) {
            if let Some(oldest_key) = self
                .entries
                .iter()
                .min_by_key(|entry| entry.expires_at)
                .map(|entry| entry.key().clone())
            {
                self.entries.remove(&oldest_key);
            }
        }
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
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

    #[test]
    fn returns_none_past_ttl() {
        let cache = TtlCache::new(Duration::from_millis(1), 10);
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn returns_value_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60), 10);
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[test]
    fn evicts_when_over_capacity() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
    }
}
