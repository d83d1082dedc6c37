//! API server: HTTP report surface plus an optional Prometheus exporter.

use crate::rest::{self, AppState};
use axum::routing::{get, post};
use axum::Router;
use campaign_core::config::AppConfig;
use campaign_sources::Refresher;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Route table with middleware, ready to serve `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/report", get(rest::get_report))
        .route("/v1/refresh", post(rest::post_refresh))
        .route("/health", get(rest::health_check))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct ApiServer {
    config: Arc<AppConfig>,
    refresher: Arc<Refresher>,
}

impl ApiServer {
    pub fn new(config: AppConfig, refresher: Arc<Refresher>) -> Self {
        Self {
            config: Arc::new(config),
            refresher,
        }
    }

    /// Warm the snapshot cache, then serve HTTP until the listener fails.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        if let Err(e) = self.refresher.snapshot().await {
            warn!(error = %e, "Initial fetch failed; reports return 502 until a refresh succeeds");
        }

        let state = AppState {
            config: self.config.clone(),
            refresher: self.refresher.clone(),
            start_time: Instant::now(),
        };
        let app = router(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);
        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }

    /// Install the Prometheus recorder and its scrape listener.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
