//! Compatibility cache
//!
//! Memoizes (listing pair) → compatibility with a TTL. Purely an
//! optimization: a miss, an expired entry or a full cache only costs a
//! recomputation, never correctness, so the interface has no error channel.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use common::types::ListingId;

use crate::score::Compatibility;

/// Cache key for a listing pair, unordered
///
/// `score(a, b)` and `score(b, a)` share one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairKey(ListingId, ListingId);

impl PairKey {
    /// Build the canonical key for a pair
    pub fn new(a: ListingId, b: ListingId) -> Self {
        if a.0 <= b.0 {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }
}

/// Cache over compatibility results
#[async_trait]
pub trait CompatibilityCache: Send + Sync {
    /// A non-expired entry for the pair, if present
    async fn get(&self, key: PairKey) -> Option<Compatibility>;

    /// Store a result for the pair
    async fn put(&self, key: PairKey, value: Compatibility);
}

struct CacheEntry {
    value: Compatibility,
    expires_at: DateTime<Utc>,
}

/// In-memory TTL cache
pub struct InMemoryCompatibilityCache {
    entries: RwLock<HashMap<PairKey, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl InMemoryCompatibilityCache {
    /// Create a cache with the given TTL and capacity
    pub fn new(ttl_seconds: u64, max_entries: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_seconds as i64),
            max_entries: max_entries as usize,
        }
    }

    /// Drop a pair from the cache (e.g. after either listing changes)
    pub fn invalidate(&self, key: PairKey) {
        self.entries.write().unwrap().remove(&key);
    }

    /// Number of live entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// True when the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CompatibilityCache for InMemoryCompatibilityCache {
    async fn get(&self, key: PairKey) -> Option<Compatibility> {
        let entries = self.entries.read().unwrap();
        entries
            .get(&key)
            .filter(|entry| entry.expires_at > Utc::now())
            .map(|entry| entry.value.clone())
    }

    async fn put(&self, key: PairKey, value: Compatibility) {
        let mut entries = self.entries.write().unwrap();

        // At capacity, evict expired entries; if that frees nothing, skip
        // the insert rather than grow without bound
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let now = Utc::now();
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= self.max_entries {
                return;
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Utc::now() + self.ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compat(score: u8) -> Compatibility {
        Compatibility {
            score,
            analysis: String::new(),
        }
    }

    #[test]
    fn test_pair_key_is_unordered() {
        let (a, b) = (ListingId::new(), ListingId::new());
        assert_eq!(PairKey::new(a, b), PairKey::new(b, a));
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let cache = InMemoryCompatibilityCache::new(60, 100);
        let key = PairKey::new(ListingId::new(), ListingId::new());

        assert!(cache.get(key).await.is_none());
        cache.put(key, compat(80)).await;
        assert_eq!(cache.get(key).await.unwrap().score, 80);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = InMemoryCompatibilityCache::new(0, 100);
        let key = PairKey::new(ListingId::new(), ListingId::new());

        cache.put(key, compat(80)).await;
        assert!(cache.get(key).await.is_none());
    }

    #[tokio::test]
    async fn test_capacity_bound() {
        let cache = InMemoryCompatibilityCache::new(60, 2);
        for _ in 0..5 {
            let key = PairKey::new(ListingId::new(), ListingId::new());
            cache.put(key, compat(10)).await;
        }
        assert!(cache.len() <= 2);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = InMemoryCompatibilityCache::new(60, 100);
        let key = PairKey::new(ListingId::new(), ListingId::new());

        cache.put(key, compat(80)).await;
        cache.invalidate(key);
        assert!(cache.get(key).await.is_none());
    }
}
