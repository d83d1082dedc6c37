//! REST handlers for the report surface and operational endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use campaign_core::config::{AppConfig, ReportConfig};
use campaign_core::types::{Granularity, OrganicPolicy, Platform};
use campaign_core::DashboardError;
use campaign_reporting::{Report, ReportPipeline};
use campaign_sources::{Refresher, SnapshotOrigin};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub refresher: Arc<Refresher>,
    pub start_time: Instant,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Query string of `GET /v1/report`. Lists are comma-separated.
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub granularity: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub platforms: Option<String>,
    pub campaigns: Option<String>,
    pub organic: Option<String>,
}

impl ReportQuery {
    /// Layer the query over the configured report settings.
    pub fn apply(&self, base: &ReportConfig) -> Result<ReportConfig, String> {
        let mut config = base.clone();
        if let Some(g) = non_empty(&self.granularity) {
            config.granularity = g.parse::<Granularity>()?;
        }
        if let Some(p) = non_empty(&self.organic) {
            config.organic_policy = p.parse::<OrganicPolicy>()?;
        }
        if let Some(s) = non_empty(&self.start) {
            config.start_date = Some(parse_date("start", s)?);
        }
        if let Some(e) = non_empty(&self.end) {
            config.end_date = Some(parse_date("end", e)?);
        }
        if let Some(list) = non_empty(&self.platforms) {
            config.platforms = split_list(list)
                .map(str::parse::<Platform>)
                .collect::<Result<_, _>>()?;
        }
        if let Some(list) = non_empty(&self.campaigns) {
            config.campaigns = split_list(list).map(str::to_string).collect();
        }
        Ok(config)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("'{field}' must be a YYYY-MM-DD date, got '{value}'"))
}

fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

/// Map a pipeline or source failure onto an HTTP status.
fn dashboard_error(e: DashboardError) -> (StatusCode, Json<ErrorResponse>) {
    metrics::counter!("api.errors").increment(1);
    match e {
        DashboardError::Fetch { .. } => {
            error_response(StatusCode::BAD_GATEWAY, "source_unavailable", e.to_string())
        }
        DashboardError::SchemaMismatch { .. } => {
            error_response(StatusCode::BAD_GATEWAY, "source_schema_mismatch", e.to_string())
        }
        other => {
            error!(error = %other, "Report request failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal processing error",
            )
        }
    }
}

/// GET /v1/report: aggregated report over the current snapshot.
pub async fn get_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<ReportResponse> {
    let report_config = query.apply(&state.config.report).map_err(|msg| {
        warn!(error = %msg, "Report query validation failed");
        metrics::counter!("api.validation_errors").increment(1);
        error_response(StatusCode::BAD_REQUEST, "invalid_report_query", msg)
    })?;

    let refreshed = state.refresher.snapshot().await.map_err(dashboard_error)?;
    let config = AppConfig {
        report: report_config,
        ..(*state.config).clone()
    };
    let report = ReportPipeline::from_config(&config)
        .run(&refreshed.snapshot)
        .map_err(dashboard_error)?;

    metrics::counter!("api.reports").increment(1);
    Ok(Json(ReportResponse {
        origin: refreshed.origin,
        report,
    }))
}

/// POST /v1/refresh: refetch every source now.
pub async fn post_refresh(State(state): State<AppState>) -> ApiResult<RefreshResponse> {
    let refreshed = state.refresher.refresh().await.map_err(dashboard_error)?;
    let snapshot = &refreshed.snapshot;
    Ok(Json(RefreshResponse {
        origin: refreshed.origin,
        fetched_at: snapshot.fetched_at,
        ad_sources: snapshot.ad_tables.keys().copied().collect(),
        site_rows: snapshot.site_table.len(),
    }))
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let last_good = state.refresher.last_good();
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        snapshot_fetched_at: last_good.and_then(|s| s.fetched_at),
        snapshot_age_secs: state.refresher.snapshot_age().map(|age| age.as_secs()),
    })
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub origin: SnapshotOrigin,
    #[serde(flatten)]
    pub report: Report,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub origin: SnapshotOrigin,
    pub fetched_at: Option<DateTime<Utc>>,
    pub ad_sources: Vec<Platform>,
    pub site_rows: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub snapshot_fetched_at: Option<DateTime<Utc>>,
    pub snapshot_age_secs: Option<u64>,
}
