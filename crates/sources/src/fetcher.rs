//! Fetchers: where a raw table's bytes come from.

use crate::table::parse_csv;
use async_trait::async_trait;
use campaign_core::types::RawTable;
use campaign_core::{DashboardError, DashboardResult};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// One raw table source. Implementations must be cheap to call repeatedly;
/// caching happens above this layer.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    async fn fetch(&self) -> DashboardResult<RawTable>;
}

/// Downloads one tab of a hosted spreadsheet as CSV.
pub struct SheetFetcher {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl SheetFetcher {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> DashboardResult<Self> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| DashboardError::fetch(&name, format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            name,
            url: url.into(),
            client,
        })
    }

    /// Share one HTTP client between fetchers.
    pub fn with_client(name: impl Into<String>, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SourceFetcher for SheetFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> DashboardResult<RawTable> {
        debug!(source = %self.name, url = %self.url, "Fetching sheet export");
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DashboardError::fetch(&self.name, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(source = %self.name, status = status.as_u16(), "Sheet export returned an error status");
            return Err(DashboardError::fetch(&self.name, format!("HTTP {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DashboardError::fetch(&self.name, e.to_string()))?;
        parse_csv(&self.name, &body)
    }
}

/// Reads a CSV export from the local filesystem.
pub struct FileFetcher {
    name: String,
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl SourceFetcher for FileFetcher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> DashboardResult<RawTable> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            DashboardError::fetch(&self.name, format!("{}: {e}", self.path.display()))
        })?;
        parse_csv(&self.name, &bytes)
    }
}
