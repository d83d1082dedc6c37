//! In-process TTL cache backed by DashMap for lock-free concurrent access.
//! Holds fetched source snapshots between refresh cycles; an expired entry is
//! kept as the last-good value until it is replaced.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Keyed snapshot cache with a time-to-live and last-good fallback.
pub struct SnapshotCache<V> {
    store: Arc<DashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    retain_last_good: bool,
}

impl<V: Clone> SnapshotCache<V> {
    pub fn new(ttl_secs: u64, retain_last_good: bool) -> Self {
        Self::with_ttl(Duration::from_secs(ttl_secs), retain_last_good)
    }

    pub fn with_ttl(ttl: Duration, retain_last_good: bool) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            ttl,
            retain_last_good,
        }
    }

    /// Get a value that is still within its TTL.
    pub fn get_fresh(&self, key: &str) -> Option<V> {
        match self.store.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                metrics::counter!("cache.snapshot.hit").increment(1);
                Some(entry.value.clone())
            }
            _ => {
                metrics::counter!("cache.snapshot.miss").increment(1);
                None
            }
        }
    }

    /// Get the most recent value regardless of age.
    pub fn get_last_good(&self, key: &str) -> Option<V> {
        self.store.get(key).map(|entry| entry.value.clone())
    }

    /// Age of the entry under `key`, if any.
    pub fn age(&self, key: &str) -> Option<Duration> {
        self.store.get(key).map(|entry| entry.inserted_at.elapsed())
    }

    /// Insert or replace a value, restarting its TTL.
    pub fn put(&self, key: impl Into<String>, value: V) {
        self.store.insert(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.store.remove(key).is_some()
    }

    /// Remove expired entries unless last-good retention is on.
    pub fn evict_expired(&self) -> usize {
        if self.retain_last_good {
            return 0;
        }
        let before = self.store.len();
        self.store
            .retain(|_, entry| entry.inserted_at.elapsed() <= self.ttl);
        let evicted = before - self.store.len();
        if evicted > 0 {
            debug!(evicted = evicted, "Snapshot cache eviction complete");
        }
        evicted
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
