//! End-to-end report generation: shape, filter, allocate, merge,
//! aggregate and derive, in that order.

use crate::aggregator::Aggregator;
use crate::allocator;
use crate::breakdown::{self, CampaignSummary, PlatformPeriod};
use crate::filter::ReportFilter;
use crate::kpi::{self, KpiSummary};
use crate::loader::{SourceShaper, SourceStats};
use crate::merger;
use campaign_core::config::AppConfig;
use campaign_core::types::{
    AggregatedRecord, Granularity, OrganicPolicy, RawRecord, RowDiagnostic, SourceSnapshot,
};
use campaign_core::{DashboardError, DashboardResult};
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

/// Non-fatal conditions the caller should surface next to the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportWarning {
    /// No site day survived the filter.
    EmptyResult,
    InvertedRange { start: NaiveDate, end: NaiveDate },
    /// Ad activity on days the site table does not cover.
    UnanchoredAdDays { count: usize },
    DuplicateSiteDates { count: usize },
    MissingColumns { source: String, columns: Vec<String> },
}

/// Data-quality details of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    pub sources: Vec<SourceStats>,
    pub rows: Vec<RowDiagnostic>,
    pub ad_only_dates: Vec<NaiveDate>,
    pub duplicate_site_dates: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub granularity: Granularity,
    pub week_start: Weekday,
    pub organic_policy: OrganicPolicy,
    pub filter: ReportFilter,
    pub rows: Vec<AggregatedRecord>,
    pub kpis: KpiSummary,
    pub platform_trend: Vec<PlatformPeriod>,
    pub campaigns: Vec<CampaignSummary>,
    /// Filtered source rows, newest start date first.
    pub detail: Vec<RawRecord>,
    pub diagnostics: PipelineDiagnostics,
    pub warnings: Vec<ReportWarning>,
    /// When the underlying tables were fetched, if known.
    pub snapshot_fetched_at: Option<DateTime<Utc>>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// [`DashboardError::EmptyResult`] for callers that treat an empty
    /// report as a failure.
    pub fn require_rows(self) -> DashboardResult<Self> {
        if self.is_empty() {
            Err(DashboardError::EmptyResult)
        } else {
            Ok(self)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportPipeline {
    shaper: SourceShaper,
    aggregator: Aggregator,
    filter: ReportFilter,
}

impl ReportPipeline {
    pub fn new(shaper: SourceShaper, aggregator: Aggregator, filter: ReportFilter) -> Self {
        Self {
            shaper,
            aggregator,
            filter,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            SourceShaper::new(&config.schema),
            Aggregator::from_config(&config.report),
            ReportFilter::from_config(&config.report),
        )
    }

    pub fn with_filter(mut self, filter: ReportFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn filter(&self) -> &ReportFilter {
        &self.filter
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Produce a report from one snapshot. Pure over its input: the same
    /// snapshot and settings always give the same report.
    ///
    /// Fails only when the site table has no date column, since the site
    /// timeline anchors every output row.
    pub fn run(&self, snapshot: &SourceSnapshot) -> DashboardResult<Report> {
        let started = Instant::now();
        let mut diagnostics = PipelineDiagnostics::default();
        let mut warnings = Vec::new();

        let site = self.shaper.load_site(&snapshot.site_table);
        if !site.has_date_column {
            return Err(DashboardError::SchemaMismatch {
                column: self.shaper.schema().site.date.clone(),
            });
        }

        let mut records: Vec<RawRecord> = Vec::new();
        for (platform, table) in &snapshot.ad_tables {
            let shaped = self.shaper.load_and_shape(table, *platform);
            records.extend(shaped.records);
            diagnostics.rows.extend(shaped.diagnostics);
            diagnostics.sources.push(shaped.stats);
        }
        diagnostics.rows.extend(site.diagnostics);
        diagnostics.sources.push(site.stats);

        for stats in &diagnostics.sources {
            if !stats.missing_columns.is_empty() {
                warnings.push(ReportWarning::MissingColumns {
                    source: stats.source.clone(),
                    columns: stats.missing_columns.clone(),
                });
            }
        }

        if let (true, Some(start), Some(end)) =
            (self.filter.is_inverted(), self.filter.start, self.filter.end)
        {
            warn!(%start, %end, "Report range is inverted");
            warnings.push(ReportWarning::InvertedRange { start, end });
        }

        let records = self.filter.select_records(records);
        let daily = self.filter.select_days(allocator::explode_all(&records));
        let site_rows = self.filter.select_site(&site.records);

        let merged = merger::merge(&daily, &site_rows);
        if !merged.ad_only_dates.is_empty() {
            warnings.push(ReportWarning::UnanchoredAdDays {
                count: merged.ad_only_dates.len(),
            });
        }
        if merged.duplicate_site_dates > 0 {
            warnings.push(ReportWarning::DuplicateSiteDates {
                count: merged.duplicate_site_dates,
            });
        }
        diagnostics.ad_only_dates = merged.ad_only_dates;
        diagnostics.duplicate_site_dates = merged.duplicate_site_dates;

        let rows = self.aggregator.aggregate(&merged.records);
        if rows.is_empty() {
            warnings.push(ReportWarning::EmptyResult);
        }

        let kpis = kpi::summarize(&merged.records, &daily, self.aggregator.organic_policy);
        let platform_trend =
            breakdown::platform_trend(&daily, self.aggregator.granularity, self.aggregator.week_start);
        let campaigns = breakdown::campaign_breakdown(&daily, &records);
        let detail = self.filter.select_detail(&records);

        let elapsed = started.elapsed();
        metrics::counter!("reporting.pipeline.runs").increment(1);
        metrics::histogram!("reporting.pipeline.duration_ms").record(elapsed.as_secs_f64() * 1000.0);
        info!(
            rows = rows.len(),
            daily_ad_rows = daily.len(),
            site_days = site_rows.len(),
            warnings = warnings.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Report generated"
        );

        Ok(Report {
            granularity: self.aggregator.granularity,
            week_start: self.aggregator.week_start,
            organic_policy: self.aggregator.organic_policy,
            filter: self.filter.clone(),
            rows,
            kpis,
            platform_trend,
            campaigns,
            detail,
            diagnostics,
            warnings,
            snapshot_fetched_at: snapshot.fetched_at,
        })
    }
}

impl Default for ReportPipeline {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
