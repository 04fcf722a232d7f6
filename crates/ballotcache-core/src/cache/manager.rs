use std::marker::PhantomData;

use chrono::{Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::{Namespace, Store, StoreError};

use super::CacheKey;

/// Default lifetime of a cached API response.
pub const DEFAULT_CACHE_DURATION_HOURS: i64 = 24;

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    /// Milliseconds since the Unix epoch when the entry was written.
    pub timestamp: i64,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            timestamp: now_millis(),
        }
    }

    pub fn age_millis(&self) -> i64 {
        now_millis() - self.timestamp
    }

    pub fn age_minutes(&self) -> i64 {
        self.age_millis() / 60_000
    }

    pub fn age_display(&self) -> String {
        crate::utils::format_age_minutes(self.age_minutes())
    }

    /// Valid only while younger than `duration`.
    pub fn is_fresh(&self, duration: Duration) -> bool {
        self.age_millis() < duration.num_milliseconds()
    }
}

/// Item count and footprint of the response cache.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub items: usize,
    pub bytes: usize,
}

impl CacheStats {
    pub fn size_kb(&self) -> String {
        format!("{:.2}", self.bytes as f64 / 1024.0)
    }
}

/// Expiry-aware response cache over the `api_cache_` namespace.
///
/// Every failure here is logged and swallowed: a broken cache degrades to a
/// miss, it never fails the caller.
pub struct Cache<T> {
    space: Namespace,
    duration: Duration,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for Cache<T> {
    fn clone(&self) -> Self {
        Self {
            space: self.space.clone(),
            duration: self.duration,
            _payload: PhantomData,
        }
    }
}

impl<T> Cache<T> {
    pub fn new(store: &Store, duration: Duration) -> Self {
        Self {
            space: store.cache(),
            duration,
            _payload: PhantomData,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Reinterpret the same namespace with a different payload type.
    pub fn retyped<U>(&self) -> Cache<U> {
        Cache {
            space: self.space.clone(),
            duration: self.duration,
            _payload: PhantomData,
        }
    }

    pub fn delete(&self, key: &CacheKey) {
        if let Err(e) = self.space.remove(key.as_str()) {
            warn!(key = %key, error = %e, "Cache delete failed");
        }
    }

    /// Remove every entry whose key starts with `filter`; an empty filter
    /// empties the whole cache.
    pub fn clear(&self, filter: &str) -> Result<usize, StoreError> {
        let removed = self.space.clear(filter)?;
        debug!(filter, removed, "Cache cleared");
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        let items = self.space.keys("").map(|k| k.len()).unwrap_or(0);
        let bytes = self.space.size_bytes().unwrap_or(0);
        CacheStats { items, bytes }
    }
}

impl<T: DeserializeOwned> Cache<T> {
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        let raw = match self.space.get_raw(key.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key = %key, error = %e, "Dropping corrupt cache entry");
                self.delete(key);
                return None;
            }
        };

        if !entry.is_fresh(self.duration) {
            debug!(key = %key, age_ms = entry.age_millis(), "Cache entry expired");
            self.delete(key);
            return None;
        }

        Some(entry)
    }
}

impl<T: Serialize> Cache<T> {
    pub fn set(&self, key: &CacheKey, data: &T) {
        let entry = CacheEntry::new(data);
        if let Err(e) = self.space.set_json(key.as_str(), &entry) {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::QueryParams;
    use crate::store::MemoryMedium;
    use serde_json::json;
    use std::sync::Arc;

    fn cache() -> (Store, Cache<serde_json::Value>) {
        let store = Store::in_memory();
        let cache = Cache::new(&store, Duration::hours(DEFAULT_CACHE_DURATION_HOURS));
        (store, cache)
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::compute(name, &QueryParams::new())
    }

    #[test]
    fn test_set_then_get_returns_fresh_entry() {
        let (_, cache) = cache();
        let before = Utc::now().timestamp_millis();
        cache.set(&key("x"), &json!({"v": 1}));

        let entry = cache.get(&key("x")).unwrap();
        assert_eq!(entry.data, json!({"v": 1}));
        assert!(entry.timestamp >= before);
        assert!(entry.timestamp - before < 1000);
    }

    #[test]
    fn test_expired_entry_is_absent_and_removed() {
        let (store, cache) = cache();
        let old = CacheEntry {
            data: json!(1),
            timestamp: now_millis() - Duration::hours(25).num_milliseconds(),
        };
        store.cache().set_json(key("old").as_str(), &old).unwrap();

        assert!(cache.get(&key("old")).is_none());
        assert!(store.cache().get_raw(key("old").as_str()).unwrap().is_none());
    }

    #[test]
    fn test_entry_exactly_at_duration_is_expired() {
        let (store, cache) = cache();
        let edge = CacheEntry {
            data: json!(1),
            timestamp: now_millis() - Duration::hours(24).num_milliseconds(),
        };
        store.cache().set_json(key("edge").as_str(), &edge).unwrap();
        assert!(cache.get(&key("edge")).is_none());
    }

    #[test]
    fn test_corrupt_entry_is_a_silent_miss() {
        let (store, cache) = cache();
        store.cache().set_raw(key("bad").as_str(), "not json {").unwrap();

        assert!(cache.get(&key("bad")).is_none());
        assert!(store.cache().get_raw(key("bad").as_str()).unwrap().is_none());
        // Second read stays a miss without erroring
        assert!(cache.get(&key("bad")).is_none());
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let store = Store::new(Arc::new(MemoryMedium::with_quota(16)));
        let cache: Cache<String> = Cache::new(&store, Duration::hours(1));
        cache.set(&key("big"), &"x".repeat(100));
        assert!(cache.get(&key("big")).is_none());
    }

    #[test]
    fn test_stats_and_clear() {
        let (_, cache) = cache();
        cache.set(&key("/a"), &json!(1));
        cache.set(&key("/b"), &json!(2));

        let stats = cache.stats();
        assert_eq!(stats.items, 2);
        assert!(stats.bytes > 0);

        assert_eq!(cache.clear("/a").unwrap(), 1);
        assert_eq!(cache.stats().items, 1);
        assert_eq!(cache.clear("").unwrap(), 1);
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_cached_entry_age_display_just_now() {
        let entry = CacheEntry::new(vec![1, 2, 3]);
        assert_eq!(entry.age_display(), "just now");
    }
}
