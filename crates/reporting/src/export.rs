//! CSV and JSON export of a generated report.

use crate::pipeline::Report;
use campaign_core::types::AggregatedRecord;
use campaign_core::{DashboardError, DashboardResult};
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// Flat CSV row. Field order is the column order.
#[derive(Debug, Serialize)]
struct ExportRow {
    period: NaiveDate,
    ad_spend: f64,
    ad_revenue: f64,
    ad_impressions: f64,
    ad_clicks: f64,
    ad_conversions: f64,
    site_revenue: f64,
    site_traffic: f64,
    orders: f64,
    new_members: f64,
    roas: f64,
    cpa: f64,
    cpc: f64,
    ctr: f64,
    cvr: f64,
    organic_revenue: f64,
    organic_traffic: f64,
    aov: f64,
}

impl From<&AggregatedRecord> for ExportRow {
    fn from(r: &AggregatedRecord) -> Self {
        let ratios = &r.derived.ratios;
        Self {
            period: r.period,
            ad_spend: r.ads.spend,
            ad_revenue: r.ads.revenue,
            ad_impressions: r.ads.impressions,
            ad_clicks: r.ads.clicks,
            ad_conversions: r.ads.conversions,
            site_revenue: r.site.revenue,
            site_traffic: r.site.traffic,
            orders: r.site.orders,
            new_members: r.site.new_members,
            roas: ratios.roas,
            cpa: ratios.cpa,
            cpc: ratios.cpc,
            ctr: ratios.ctr,
            cvr: ratios.cvr,
            organic_revenue: r.derived.organic_revenue,
            organic_traffic: r.derived.organic_traffic,
            aov: r.derived.aov,
        }
    }
}

pub const CSV_COLUMNS: &[&str] = &[
    "period",
    "ad_spend",
    "ad_revenue",
    "ad_impressions",
    "ad_clicks",
    "ad_conversions",
    "site_revenue",
    "site_traffic",
    "orders",
    "new_members",
    "roas",
    "cpa",
    "cpc",
    "ctr",
    "cvr",
    "organic_revenue",
    "organic_traffic",
    "aov",
];

/// Serialize aggregated rows as CSV. The header is written even when there
/// are no rows.
pub fn rows_to_csv(rows: &[AggregatedRecord]) -> DashboardResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(CSV_COLUMNS)
        .map_err(|e| DashboardError::Export(e.to_string()))?;
    for row in rows {
        writer
            .serialize(ExportRow::from(row))
            .map_err(|e| DashboardError::Export(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| DashboardError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DashboardError::Export(e.to_string()))
}

pub fn report_to_json(report: &Report) -> DashboardResult<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn write_csv(report: &Report, path: impl AsRef<Path>) -> DashboardResult<()> {
    let path = path.as_ref();
    fs::write(path, rows_to_csv(&report.rows)?)?;
    info!(path = %path.display(), rows = report.rows.len(), "CSV export written");
    Ok(())
}

pub fn write_json(report: &Report, path: impl AsRef<Path>) -> DashboardResult<()> {
    let path = path.as_ref();
    fs::write(path, report_to_json(report)?)?;
    info!(path = %path.display(), "JSON export written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::types::{AdMetrics, DerivedMetrics, SiteMetrics};
    use campaign_core::types::OrganicPolicy;
    use std::collections::BTreeMap;

    fn record() -> AggregatedRecord {
        let r = AggregatedRecord {
            period: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            days: 1,
            ads: AdMetrics {
                spend: 100.0,
                revenue: 250.0,
                impressions: 1000.0,
                clicks: 20.0,
                conversions: 2.0,
            },
            by_platform: BTreeMap::new(),
            site: SiteMetrics {
                revenue: 400.0,
                traffic: 80.0,
                orders: 4.0,
                new_members: 1.0,
            },
            derived: DerivedMetrics::default(),
        };
        crate::derived::derive(&r, OrganicPolicy::Raw)
    }

    #[test]
    fn test_csv_header_and_row() {
        let csv = rows_to_csv(&[record()]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), CSV_COLUMNS.join(","));
        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(row.len(), CSV_COLUMNS.len());
        assert_eq!(row[0], "2024-01-01");
        assert_eq!(row[1].parse::<f64>().unwrap(), 100.0);
        assert_eq!(row[10].parse::<f64>().unwrap(), 2.5);
        assert_eq!(row[15].parse::<f64>().unwrap(), 150.0);
        assert_eq!(row[17].parse::<f64>().unwrap(), 100.0);
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_empty_rows_still_have_header() {
        let csv = rows_to_csv(&[]).unwrap();
        assert_eq!(csv.trim_end(), CSV_COLUMNS.join(","));
    }
}
