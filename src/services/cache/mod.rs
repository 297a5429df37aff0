//! Match result caching.
//!
//! In-process TTL cache for ranked match lists so repeated queries inside
//! the TTL window skip recomputation. Keys carry a candidate-set version so
//! a data refresh can never silently serve stale matches.
//!
//! - DashMap store: concurrent access never corrupts the structure
//! - Lazy expiry on access; `purge_expired` is an optional sweep
//! - Concurrent misses on one key may compute redundantly; last writer wins

use crate::models::Match;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Identity of one cached ranking.
///
/// `set_version` is the caller-supplied marker for the candidate set; bump
/// it when candidate data refreshes. Options that change the returned list
/// are part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub subject_id: String,
    pub set_version: u64,
    pub urgent: bool,
    pub limit: usize,
}

#[derive(Debug, Clone)]
struct CachedEntry {
    matches: Vec<Match>,
    expires_at: Instant,
}

impl CachedEntry {
    fn new(matches: Vec<Match>, ttl: Duration) -> Self {
        Self {
            matches,
            expires_at: Instant::now() + ttl,
        }
    }

    #[inline]
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

pub struct MatchCache {
    store: DashMap<CacheKey, CachedEntry>,
    ttl: Duration,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MatchCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        debug!(
            ttl_secs = ttl.as_secs(),
            max_entries, "Initializing match cache"
        );
        Self {
            store: DashMap::new(),
            ttl,
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Return the cached ranking for `key`, or run `compute` and store its
    /// result with a fresh expiry.
    pub async fn get_or_compute<F, Fut, E>(&self, key: CacheKey, compute: F) -> Result<Vec<Match>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Match>, E>>,
    {
        if let Some(entry) = self.store.get(&key) {
            if !entry.is_expired() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(subject_id = %key.subject_id, "Match cache hit");
                return Ok(entry.matches.clone());
            }
            drop(entry);
            self.evict(&key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(subject_id = %key.subject_id, "Match cache miss");

        let matches = compute().await?;

        self.enforce_entry_limit();
        self.store
            .insert(key, CachedEntry::new(matches.clone(), self.ttl));

        Ok(matches)
    }

    /// Drop every expired entry. Not required for correctness (expiry is
    /// checked on access); callers may run it periodically to bound memory.
    pub fn purge_expired(&self) -> usize {
        let expired: Vec<CacheKey> = self
            .store
            .iter()
            .filter(|entry| entry.value().is_expired())
            .map(|entry| entry.key().clone())
            .collect();

        let purged = expired.len();
        for key in expired {
            self.evict(&key);
        }
        if purged > 0 {
            debug!(purged, "Purged expired match cache entries");
        }
        purged
    }

    /// Invalidate every cached ranking for one subject, regardless of
    /// version or options.
    pub fn invalidate_subject(&self, subject_id: &str) {
        let keys: Vec<CacheKey> = self
            .store
            .iter()
            .filter(|entry| entry.key().subject_id == subject_id)
            .map(|entry| entry.key().clone())
            .collect();
        for key in keys {
            self.evict(&key);
        }
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.store.len(),
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            eviction_count: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn evict(&self, key: &CacheKey) {
        if self.store.remove(key).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    // Coarse eviction once the entry cap is reached: expired entries first,
    // then an arbitrary slice. Precise LRU is not a requirement here.
    fn enforce_entry_limit(&self) {
        if self.store.len() < self.max_entries {
            return;
        }

        self.purge_expired();
        if self.store.len() < self.max_entries {
            return;
        }

        let evict_count = (self.store.len() / 10).max(1);
        warn!(
            entries = self.store.len(),
            evict_count, "Match cache entry limit reached, evicting"
        );
        let victims: Vec<CacheKey> = self
            .store
            .iter()
            .take(evict_count)
            .map(|entry| entry.key().clone())
            .collect();
        for key in victims {
            self.evict(&key);
        }
    }
}

/// Cache performance counters.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entries: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceTier, FactorScores};

    fn key(subject: &str) -> CacheKey {
        CacheKey {
            subject_id: subject.to_string(),
            set_version: 1,
            urgent: false,
            limit: 10,
        }
    }

    fn sample_matches() -> Vec<Match> {
        vec![Match {
            request_id: "req-1".to_string(),
            candidate_id: "mfg-1".to_string(),
            score: 0.8,
            confidence: ConfidenceTier::VeryGood,
            breakdown: FactorScores::default(),
            predicted_cost: 1200.0,
            predicted_delivery_days: 14.0,
            success_probability: 0.85,
            risk_factors: vec![],
            advantages: vec![],
        }]
    }

    #[tokio::test]
    async fn test_hit_skips_recompute() {
        let cache = MatchCache::new(Duration::from_secs(60), 100);
        let mut computed = 0;

        let first: Result<_, std::convert::Infallible> = cache
            .get_or_compute(key("req-1"), || async {
                computed += 1;
                Ok(sample_matches())
            })
            .await;
        let first = first.unwrap();

        let second: Result<_, std::convert::Infallible> = cache
            .get_or_compute(key("req-1"), || async {
                computed += 1;
                Ok(sample_matches())
            })
            .await;
        let second = second.unwrap();

        assert_eq!(computed, 1, "second call must be served from cache");
        assert_eq!(first, second);
        assert_eq!(cache.stats().hit_count, 1);
    }

    #[tokio::test]
    async fn test_expiry_triggers_recompute() {
        let cache = MatchCache::new(Duration::from_millis(40), 100);
        let mut computed = 0;

        for _ in 0..2 {
            let _: Result<_, std::convert::Infallible> = cache
                .get_or_compute(key("req-1"), || async {
                    computed += 1;
                    Ok(sample_matches())
                })
                .await;
        }
        assert_eq!(computed, 1);

        tokio::time::sleep(Duration::from_millis(60)).await;

        let _: Result<_, std::convert::Infallible> = cache
            .get_or_compute(key("req-1"), || async {
                computed += 1;
                Ok(sample_matches())
            })
            .await;
        assert_eq!(computed, 2, "expired entry must recompute");
    }

    #[tokio::test]
    async fn test_version_bump_is_a_different_key() {
        let cache = MatchCache::new(Duration::from_secs(60), 100);
        let mut computed = 0;

        let mut stale_key = key("req-1");
        let _: Result<_, std::convert::Infallible> = cache
            .get_or_compute(stale_key.clone(), || async {
                computed += 1;
                Ok(sample_matches())
            })
            .await;

        stale_key.set_version = 2;
        let _: Result<_, std::convert::Infallible> = cache
            .get_or_compute(stale_key, || async {
                computed += 1;
                Ok(sample_matches())
            })
            .await;

        assert_eq!(computed, 2, "new candidate-set version must not reuse stale entries");
    }

    #[tokio::test]
    async fn test_purge_and_invalidate() {
        let cache = MatchCache::new(Duration::from_millis(10), 100);
        let _: Result<_, std::convert::Infallible> = cache
            .get_or_compute(key("req-1"), || async { Ok(sample_matches()) })
            .await;
        let _: Result<_, std::convert::Infallible> = cache
            .get_or_compute(key("req-2"), || async { Ok(sample_matches()) })
            .await;
        assert_eq!(cache.stats().entries, 2);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.stats().entries, 0);

        let _: Result<_, std::convert::Infallible> = cache
            .get_or_compute(key("req-3"), || async { Ok(sample_matches()) })
            .await;
        cache.invalidate_subject("req-3");
        assert_eq!(cache.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_compute_error_is_not_cached() {
        let cache = MatchCache::new(Duration::from_secs(60), 100);

        let failed: Result<Vec<Match>, &str> = cache
            .get_or_compute(key("req-1"), || async { Err("downstream unavailable") })
            .await;
        assert!(failed.is_err());

        let mut computed = 0;
        let _: Result<_, &str> = cache
            .get_or_compute(key("req-1"), || async {
                computed += 1;
                Ok(sample_matches())
            })
            .await;
        assert_eq!(computed, 1, "failed compute must not leave an entry behind");
    }
}
