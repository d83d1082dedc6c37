//! Refresh cycle: serve the cached snapshot while fresh, refetch when
//! stale, and fall back to the last good snapshot when a refetch fails.

use crate::source_set::SourceSet;
use campaign_cache::SnapshotCache;
use campaign_core::config::CacheConfig;
use campaign_core::types::SourceSnapshot;
use campaign_core::DashboardResult;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const SNAPSHOT_KEY: &str = "snapshot";

/// Where a served snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    Cache,
    Fetched,
    /// Refetch failed; an older snapshot is being served.
    LastGood,
}

#[derive(Debug, Clone)]
pub struct Refreshed {
    pub snapshot: Arc<SourceSnapshot>,
    pub origin: SnapshotOrigin,
}

pub struct Refresher {
    sources: SourceSet,
    cache: SnapshotCache<Arc<SourceSnapshot>>,
    refresh_lock: Mutex<()>,
}

impl Refresher {
    pub fn new(sources: SourceSet, config: &CacheConfig) -> Self {
        Self::with_cache(
            sources,
            SnapshotCache::new(config.ttl_secs, config.retain_last_good),
        )
    }

    pub fn with_cache(sources: SourceSet, cache: SnapshotCache<Arc<SourceSnapshot>>) -> Self {
        Self {
            sources,
            cache,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Current snapshot, fetching only when the cached one has expired.
    pub async fn snapshot(&self) -> DashboardResult<Refreshed> {
        if let Some(snapshot) = self.cache.get_fresh(SNAPSHOT_KEY) {
            return Ok(Refreshed {
                snapshot,
                origin: SnapshotOrigin::Cache,
            });
        }
        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(snapshot) = self.cache.get_fresh(SNAPSHOT_KEY) {
            return Ok(Refreshed {
                snapshot,
                origin: SnapshotOrigin::Cache,
            });
        }
        self.fetch_locked().await
    }

    /// Refetch regardless of the cached entry's age.
    pub async fn refresh(&self) -> DashboardResult<Refreshed> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_locked().await
    }

    /// Last snapshot that was fetched successfully, whatever its age.
    pub fn last_good(&self) -> Option<Arc<SourceSnapshot>> {
        self.cache.get_last_good(SNAPSHOT_KEY)
    }

    /// Time since the cached snapshot was fetched.
    pub fn snapshot_age(&self) -> Option<Duration> {
        self.cache.age(SNAPSHOT_KEY)
    }

    async fn fetch_locked(&self) -> DashboardResult<Refreshed> {
        match self.sources.fetch_snapshot().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.cache.put(SNAPSHOT_KEY, Arc::clone(&snapshot));
                self.cache.evict_expired();
                info!(ttl_secs = self.cache.ttl().as_secs(), "Snapshot refreshed");
                Ok(Refreshed {
                    snapshot,
                    origin: SnapshotOrigin::Fetched,
                })
            }
            Err(e) => {
                metrics::counter!("sources.fetch.failures").increment(1);
                match self.cache.get_last_good(SNAPSHOT_KEY) {
                    Some(snapshot) => {
                        warn!(error = %e, "Refresh failed, serving last good snapshot");
                        Ok(Refreshed {
                            snapshot,
                            origin: SnapshotOrigin::LastGood,
                        })
                    }
                    None => {
                        error!(error = %e, "Refresh failed and no snapshot is cached");
                        Err(e)
                    }
                }
            }
        }
    }
}
