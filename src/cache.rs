//! # Working-Result Cache
//!
//! In-memory TTL cache for matching results that are mid-correction. The
//! surrounding bot keeps the working copy here between callback turns so a
//! failed store write never loses the result the user is editing; the
//! Postgres store remains the durable copy keyed by receipt content hash.

use crate::config::CacheConfig;
use crate::editing::ChangedIndices;
use crate::matching::IngredientMatchingResult;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A matching result together with its caller-owned changed-index set.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkingResult {
    pub result: IngredientMatchingResult,
    pub changed_indices: ChangedIndices,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: WorkingResult,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: WorkingResult, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Total number of entries
    pub entries: usize,
    /// Number of hits
    pub hits: u64,
    /// Number of misses
    pub misses: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

/// Thread-safe TTL cache of working results keyed by (user, receipt hash).
pub struct MatchingResultCache {
    data: RwLock<HashMap<(i64, String), CacheEntry>>,
    stats: RwLock<CacheStats>,
    ttl: Duration,
    max_entries: usize,
}

impl MatchingResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            stats: RwLock::new(CacheStats::default()),
            ttl: Duration::from_secs(config.ttl_secs),
            max_entries: config.max_entries,
        }
    }

    /// Look up the working result for a user's receipt. Expired entries miss.
    pub fn get(&self, user_id: i64, receipt_hash: &str) -> Option<WorkingResult> {
        let data = self.data.read();
        let mut stats = self.stats.write();

        match data.get(&(user_id, receipt_hash.to_string())) {
            Some(entry) if !entry.is_expired() => {
                stats.hits += 1;
                Some(entry.value.clone())
            }
            _ => {
                stats.misses += 1;
                None
            }
        }
    }

    /// Insert or replace the working result for a user's receipt.
    ///
    /// When the cache is full, the entry closest to expiry is evicted first.
    pub fn insert(
        &self,
        user_id: i64,
        receipt_hash: &str,
        result: IngredientMatchingResult,
        changed_indices: ChangedIndices,
    ) {
        let key = (user_id, receipt_hash.to_string());
        let mut data = self.data.write();

        if !data.contains_key(&key) && data.len() >= self.max_entries {
            if let Some(oldest_key) = data
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(key, _)| key.clone())
            {
                data.remove(&oldest_key);
            }
        }

        data.insert(
            key,
            CacheEntry::new(
                WorkingResult {
                    result,
                    changed_indices,
                },
                self.ttl,
            ),
        );
    }

    /// Drop the working result for a user's receipt, e.g. on re-analysis.
    pub fn remove(&self, user_id: i64, receipt_hash: &str) -> Option<WorkingResult> {
        self.data
            .write()
            .remove(&(user_id, receipt_hash.to_string()))
            .map(|entry| entry.value)
    }

    /// Clear all expired entries.
    pub fn cleanup(&self) {
        self.data.write().retain(|_, entry| !entry.is_expired());
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.data.write().clear();
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.read().clone();
        stats.entries = self.data.read().len();
        let lookups = stats.hits + stats.misses;
        stats.hit_rate = if lookups > 0 {
            stats.hits as f64 / lookups as f64
        } else {
            0.0
        };
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn cache_with(ttl_secs: u64, max_entries: usize) -> MatchingResultCache {
        MatchingResultCache::new(CacheConfig {
            ttl_secs,
            max_entries,
        })
    }

    fn empty_result() -> IngredientMatchingResult {
        IngredientMatchingResult::new()
    }

    #[test]
    fn test_insert_and_get() {
        let cache = cache_with(60, 100);
        cache.insert(1, "hash-a", empty_result(), ChangedIndices::new());

        let hit = cache.get(1, "hash-a").unwrap();
        assert_eq!(hit.result, empty_result());
        assert!(cache.get(1, "hash-b").is_none());
        assert!(cache.get(2, "hash-a").is_none());
    }

    #[test]
    fn test_insert_replaces_existing() {
        let cache = cache_with(60, 100);
        let mut changed = ChangedIndices::new();
        cache.insert(1, "hash-a", empty_result(), changed.clone());

        changed.insert(3);
        cache.insert(1, "hash-a", empty_result(), changed.clone());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(1, "hash-a").unwrap().changed_indices, changed);
    }

    #[test]
    fn test_expiration() {
        let cache = cache_with(1, 100);
        cache.insert(1, "hash-a", empty_result(), ChangedIndices::new());
        assert!(cache.get(1, "hash-a").is_some());

        thread::sleep(Duration::from_secs(2));
        assert!(cache.get(1, "hash-a").is_none());
    }

    #[test]
    fn test_cleanup_drops_expired_entries() {
        let cache = cache_with(1, 100);
        cache.insert(1, "hash-a", empty_result(), ChangedIndices::new());
        thread::sleep(Duration::from_secs(2));

        cache.cleanup();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_max_entries_eviction() {
        let cache = cache_with(60, 2);
        cache.insert(1, "hash-a", empty_result(), ChangedIndices::new());
        cache.insert(1, "hash-b", empty_result(), ChangedIndices::new());
        cache.insert(1, "hash-c", empty_result(), ChangedIndices::new());

        assert_eq!(cache.len(), 2);
        assert!(cache.get(1, "hash-c").is_some());
    }

    #[test]
    fn test_remove() {
        let cache = cache_with(60, 100);
        cache.insert(1, "hash-a", empty_result(), ChangedIndices::new());

        assert!(cache.remove(1, "hash-a").is_some());
        assert!(cache.remove(1, "hash-a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats() {
        let cache = cache_with(60, 100);
        cache.insert(1, "hash-a", empty_result(), ChangedIndices::new());

        cache.get(1, "hash-a");
        cache.get(1, "hash-missing");

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }
}
