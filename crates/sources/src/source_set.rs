//! The set of sources that make up one snapshot.

use crate::fetcher::{FileFetcher, SheetFetcher, SourceFetcher};
use campaign_core::config::{SourceLocation, SourcesConfig};
use campaign_core::types::{Platform, RawTable, SourceSnapshot, SITE_SOURCE};
use campaign_core::{DashboardError, DashboardResult};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::info;

/// One fetcher per ad platform plus the site fetcher.
#[derive(Clone)]
pub struct SourceSet {
    ads: BTreeMap<Platform, Arc<dyn SourceFetcher>>,
    site: Arc<dyn SourceFetcher>,
}

impl SourceSet {
    pub fn new(site: Arc<dyn SourceFetcher>) -> Self {
        Self {
            ads: BTreeMap::new(),
            site,
        }
    }

    pub fn with_ads(mut self, platform: Platform, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.ads.insert(platform, fetcher);
        self
    }

    /// Build fetchers from configuration. A local path takes precedence over
    /// a sheet tab; a platform with neither is left out.
    pub fn from_config(config: &SourcesConfig) -> DashboardResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.fetch_timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| DashboardError::Config(format!("HTTP client setup failed: {e}")))?;

        let build = |name: &str, location: &SourceLocation| -> Option<Arc<dyn SourceFetcher>> {
            if let Some(path) = &location.path {
                return Some(Arc::new(FileFetcher::new(name, path)));
            }
            location.gid.as_ref().map(|gid| {
                Arc::new(SheetFetcher::with_client(name, config.export_url(gid), client.clone()))
                    as Arc<dyn SourceFetcher>
            })
        };

        let site = build(SITE_SOURCE, &config.site).ok_or_else(|| {
            DashboardError::Config("sources.site needs either a path or a gid".into())
        })?;
        let mut set = Self::new(site);
        for platform in Platform::ALL {
            if let Some(fetcher) = build(platform.as_str(), config.location(platform)) {
                set = set.with_ads(platform, fetcher);
            }
        }
        Ok(set)
    }

    pub fn platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.ads.keys().copied()
    }

    /// Fetch every source concurrently. Any single failure fails the whole
    /// snapshot.
    pub async fn fetch_snapshot(&self) -> DashboardResult<SourceSnapshot> {
        let mut tasks: JoinSet<(Option<Platform>, DashboardResult<RawTable>)> = JoinSet::new();
        for (platform, fetcher) in &self.ads {
            let platform = *platform;
            let fetcher = Arc::clone(fetcher);
            tasks.spawn(async move { (Some(platform), fetcher.fetch().await) });
        }
        let site = Arc::clone(&self.site);
        tasks.spawn(async move { (None, site.fetch().await) });

        let mut ad_tables = BTreeMap::new();
        let mut site_table = None;
        while let Some(joined) = tasks.join_next().await {
            let (platform, result) =
                joined.map_err(|e| DashboardError::Internal(anyhow::anyhow!("fetch task failed: {e}")))?;
            let table = result?;
            match platform {
                Some(p) => {
                    ad_tables.insert(p, table);
                }
                None => site_table = Some(table),
            }
        }

        let site_table = site_table.ok_or_else(|| DashboardError::fetch(SITE_SOURCE, "no table returned"))?;
        info!(
            ad_sources = ad_tables.len(),
            site_rows = site_table.len(),
            "Source snapshot fetched"
        );
        Ok(SourceSnapshot {
            ad_tables,
            site_table,
            fetched_at: Some(Utc::now()),
        })
    }
}
