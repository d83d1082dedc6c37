//! Source loader/shaper: applies the field normalizer column by column,
//! parses dates and tags rows with their platform.
//!
//! Row-level problems never abort a load: the row is excluded and a
//! [`RowDiagnostic`] is kept so the caller can see what was dropped.

use crate::normalize::FieldNormalizer;
use campaign_core::config::SchemaConfig;
use campaign_core::types::{
    AdMetrics, CellValue, DiagnosticKind, Platform, RawRecord, RawTable, RowDiagnostic,
    SiteMetrics, SiteRecord, SITE_SOURCE,
};
use campaign_core::DashboardError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Per-source load statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceStats {
    pub source: String,
    pub rows_read: usize,
    pub records_kept: usize,
    pub dropped_unknown_date: usize,
    pub dropped_format_error: usize,
    pub missing_columns: Vec<String>,
}

/// Result of shaping one ad-platform table.
#[derive(Debug, Clone)]
pub struct ShapedAds {
    pub platform: Platform,
    pub records: Vec<RawRecord>,
    pub stats: SourceStats,
    pub diagnostics: Vec<RowDiagnostic>,
}

/// Result of shaping the site table.
#[derive(Debug, Clone)]
pub struct ShapedSite {
    pub records: Vec<SiteRecord>,
    pub stats: SourceStats,
    pub diagnostics: Vec<RowDiagnostic>,
    /// False when the date column itself is absent.
    pub has_date_column: bool,
}

#[derive(Clone, Copy)]
enum FieldKind {
    Currency,
    Count,
}

/// Shapes raw tables into typed records using the configured schema.
#[derive(Debug, Clone)]
pub struct SourceShaper {
    schema: SchemaConfig,
    normalizer: FieldNormalizer,
}

impl SourceShaper {
    pub fn new(schema: &SchemaConfig) -> Self {
        Self {
            schema: schema.clone(),
            normalizer: FieldNormalizer::from_schema(schema),
        }
    }

    pub fn schema(&self) -> &SchemaConfig {
        &self.schema
    }

    pub fn normalizer(&self) -> &FieldNormalizer {
        &self.normalizer
    }

    /// Shape one ad-platform export into [`RawRecord`]s.
    pub fn load_and_shape(&self, table: &RawTable, platform: Platform) -> ShapedAds {
        let cols = &self.schema.ad;
        let source = platform.as_str().to_string();
        let mut stats = SourceStats {
            source: source.clone(),
            ..Default::default()
        };
        let mut diagnostics = Vec::new();

        let campaign_idx = self.locate(table, &cols.campaign, &source, &mut stats, &mut diagnostics);
        let start_idx = self.locate(table, &cols.start_date, &source, &mut stats, &mut diagnostics);
        // A missing end column is the normal single-day export, not a mismatch.
        let end_idx = table.column_index(&cols.end_date);

        let metric_columns = [
            (cols.spend.as_str(), FieldKind::Currency),
            (cols.impressions.as_str(), FieldKind::Count),
            (cols.clicks.as_str(), FieldKind::Count),
            (cols.conversions.as_str(), FieldKind::Count),
            (cols.revenue.as_str(), FieldKind::Currency),
            (cols.cpc.as_str(), FieldKind::Currency),
            (cols.cpa.as_str(), FieldKind::Currency),
        ];
        let metric_idx: Vec<Option<usize>> = metric_columns
            .iter()
            .map(|(name, _)| self.locate(table, name, &source, &mut stats, &mut diagnostics))
            .collect();

        let mut records = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            if is_blank_row(table, row) {
                continue;
            }
            stats.rows_read += 1;
            let line = row + 1;

            let Some(start_date) = start_idx.and_then(|i| self.parse_date(table.cell(row, i))) else {
                stats.dropped_unknown_date += 1;
                diagnostics.push(RowDiagnostic {
                    source: source.clone(),
                    row: Some(line),
                    column: Some(cols.start_date.clone()),
                    raw_value: start_idx.map(|i| table.cell(row, i).display_value()),
                    kind: DiagnosticKind::UnknownDate,
                    message: "start date missing or unparseable; row excluded".into(),
                });
                continue;
            };

            let mut values = [0.0f64; 7];
            let mut present = [false; 7];
            let mut failed = false;
            for (slot, ((name, kind), idx)) in metric_columns.iter().zip(&metric_idx).enumerate() {
                let Some(idx) = idx else { continue };
                let cell = table.cell(row, *idx);
                present[slot] = !cell.is_blank();
                match self.normalize(*kind, name, cell) {
                    Ok(v) => values[slot] = v,
                    Err(e) => {
                        failed = true;
                        diagnostics.push(format_diagnostic(&source, line, e));
                    }
                }
            }
            if failed {
                stats.dropped_format_error += 1;
                metrics::counter!("reporting.rows.format_error").increment(1);
                continue;
            }

            let mut end_date = start_date;
            if let Some(i) = end_idx {
                let cell = table.cell(row, i);
                if !cell.is_blank() {
                    match self.parse_date(cell) {
                        Some(end) if end >= start_date => end_date = end,
                        Some(_) => diagnostics.push(RowDiagnostic {
                            source: source.clone(),
                            row: Some(line),
                            column: Some(cols.end_date.clone()),
                            raw_value: Some(cell.display_value()),
                            kind: DiagnosticKind::EndDateDefaulted,
                            message: "end date before start date; treated as a single day".into(),
                        }),
                        None => diagnostics.push(RowDiagnostic {
                            source: source.clone(),
                            row: Some(line),
                            column: Some(cols.end_date.clone()),
                            raw_value: Some(cell.display_value()),
                            kind: DiagnosticKind::EndDateDefaulted,
                            message: "end date unparseable; treated as a single day".into(),
                        }),
                    }
                }
            }

            let campaign = campaign_idx
                .map(|i| table.cell(row, i).display_value().trim().to_string())
                .unwrap_or_default();

            records.push(RawRecord {
                platform,
                campaign,
                start_date,
                end_date,
                metrics: AdMetrics {
                    spend: values[0],
                    impressions: values[1],
                    clicks: values[2],
                    conversions: values[3],
                    revenue: values[4],
                },
                reported_cpc: present[5].then_some(values[5]),
                reported_cpa: present[6].then_some(values[6]),
            });
        }

        stats.records_kept = records.len();
        if stats.dropped_unknown_date > 0 {
            metrics::counter!("reporting.rows.unknown_date").increment(stats.dropped_unknown_date as u64);
        }
        debug!(
            source = %source,
            rows = stats.rows_read,
            kept = stats.records_kept,
            unknown_date = stats.dropped_unknown_date,
            format_errors = stats.dropped_format_error,
            "Ad source shaped"
        );

        ShapedAds {
            platform,
            records,
            stats,
            diagnostics,
        }
    }

    /// Shape the storefront-backend export into [`SiteRecord`]s.
    pub fn load_site(&self, table: &RawTable) -> ShapedSite {
        let cols = &self.schema.site;
        let source = SITE_SOURCE.to_string();
        let mut stats = SourceStats {
            source: source.clone(),
            ..Default::default()
        };
        let mut diagnostics = Vec::new();

        let date_idx = self.locate(table, &cols.date, &source, &mut stats, &mut diagnostics);
        let metric_columns = [
            (cols.revenue.as_str(), FieldKind::Currency),
            (cols.traffic.as_str(), FieldKind::Count),
            (cols.orders.as_str(), FieldKind::Count),
            (cols.new_members.as_str(), FieldKind::Count),
            (cols.aov.as_str(), FieldKind::Currency),
        ];
        let metric_idx: Vec<Option<usize>> = metric_columns
            .iter()
            .map(|(name, _)| self.locate(table, name, &source, &mut stats, &mut diagnostics))
            .collect();

        let mut records = Vec::with_capacity(table.len());
        for row in 0..table.len() {
            if is_blank_row(table, row) {
                continue;
            }
            stats.rows_read += 1;
            let line = row + 1;

            let Some(date) = date_idx.and_then(|i| self.parse_date(table.cell(row, i))) else {
                stats.dropped_unknown_date += 1;
                diagnostics.push(RowDiagnostic {
                    source: source.clone(),
                    row: Some(line),
                    column: Some(cols.date.clone()),
                    raw_value: date_idx.map(|i| table.cell(row, i).display_value()),
                    kind: DiagnosticKind::UnknownDate,
                    message: "date missing or unparseable; row excluded".into(),
                });
                continue;
            };

            // The reported AOV is validated but not kept; AOV is always
            // recomputed from revenue and orders.
            let mut values = [0.0f64; 5];
            let mut failed = false;
            for (slot, ((name, kind), idx)) in metric_columns.iter().zip(&metric_idx).enumerate() {
                let Some(idx) = idx else { continue };
                let cell = table.cell(row, *idx);
                match self.normalize(*kind, name, cell) {
                    Ok(v) => values[slot] = v,
                    Err(e) => {
                        failed = true;
                        diagnostics.push(format_diagnostic(&source, line, e));
                    }
                }
            }
            if failed {
                stats.dropped_format_error += 1;
                metrics::counter!("reporting.rows.format_error").increment(1);
                continue;
            }

            records.push(SiteRecord {
                date,
                metrics: SiteMetrics {
                    revenue: values[0],
                    traffic: values[1],
                    orders: values[2],
                    new_members: values[3],
                },
            });
        }

        stats.records_kept = records.len();
        debug!(
            rows = stats.rows_read,
            kept = stats.records_kept,
            unknown_date = stats.dropped_unknown_date,
            format_errors = stats.dropped_format_error,
            "Site source shaped"
        );

        ShapedSite {
            records,
            stats,
            diagnostics,
            has_date_column: date_idx.is_some(),
        }
    }

    /// Parse a date cell with the configured formats. Datetime values keep
    /// their date part; `None` marks the unknown-date sentinel.
    pub fn parse_date(&self, cell: &CellValue) -> Option<NaiveDate> {
        let text = match cell {
            CellValue::Missing => return None,
            CellValue::Number(n) if n.fract() == 0.0 && *n > 0.0 => format!("{}", *n as i64),
            CellValue::Number(_) => return None,
            CellValue::Text(s) => s.trim().to_string(),
        };
        if text.is_empty() {
            return None;
        }

        for fmt in &self.schema.date_formats {
            if let Ok(date) = NaiveDate::parse_from_str(&text, fmt) {
                return Some(date);
            }
            for time_fmt in ["%H:%M:%S", "%H:%M"] {
                let full = format!("{fmt} {time_fmt}");
                if let Ok(dt) = NaiveDateTime::parse_from_str(&text, &full) {
                    return Some(dt.date());
                }
            }
        }

        // ISO timestamps such as 2024-01-05T00:00:00Z
        let head = text.split(&['T', ' '][..]).next().unwrap_or_default();
        if head.len() < text.len() {
            return self
                .schema
                .date_formats
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok());
        }
        None
    }

    fn normalize(&self, kind: FieldKind, column: &str, cell: &CellValue) -> Result<f64, DashboardError> {
        match kind {
            FieldKind::Currency => self.normalizer.normalize_currency(column, cell),
            FieldKind::Count => self.normalizer.normalize_count(column, cell),
        }
    }

    fn locate(
        &self,
        table: &RawTable,
        column: &str,
        source: &str,
        stats: &mut SourceStats,
        diagnostics: &mut Vec<RowDiagnostic>,
    ) -> Option<usize> {
        let idx = table.column_index(column);
        if idx.is_none() {
            warn!(source = source, column = column, "Configured column absent, skipping its transform");
            stats.missing_columns.push(column.to_string());
            diagnostics.push(RowDiagnostic {
                source: source.to_string(),
                row: None,
                column: Some(column.to_string()),
                raw_value: None,
                kind: DiagnosticKind::SchemaMismatch,
                message: DashboardError::SchemaMismatch {
                    column: column.to_string(),
                }
                .to_string(),
            });
        }
        idx
    }
}

fn is_blank_row(table: &RawTable, row: usize) -> bool {
    table.rows[row].iter().all(CellValue::is_blank)
}

fn format_diagnostic(source: &str, line: usize, err: DashboardError) -> RowDiagnostic {
    let message = err.to_string();
    let (column, raw_value) = match err {
        DashboardError::Format { column, value } => (Some(column), Some(value)),
        _ => (None, None),
    };
    RowDiagnostic {
        source: source.to_string(),
        row: Some(line),
        column,
        raw_value,
        kind: DiagnosticKind::FormatError,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AD_HEADERS: &[&str] = &[
        "廣告活動",
        "廣告期間(起)",
        "廣告期間(迄)",
        "費用",
        "曝光次數",
        "點擊數",
        "CPC",
        "轉換",
        "單次轉換費用",
        "轉換金額",
    ];

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn shaper() -> SourceShaper {
        SourceShaper::new(&SchemaConfig::default())
    }

    #[test]
    fn test_shape_full_row() {
        let table = RawTable::from_strings(
            AD_HEADERS,
            &[&[
                "Spring Sale",
                "2024/01/01",
                "2024/01/03",
                "NT$300",
                "1,000",
                "50",
                "NT$6",
                "3",
                "NT$100",
                "NT$600",
            ]],
        );
        let shaped = shaper().load_and_shape(&table, Platform::Google);
        assert_eq!(shaped.records.len(), 1);
        let r = &shaped.records[0];
        assert_eq!(r.platform, Platform::Google);
        assert_eq!(r.campaign, "Spring Sale");
        assert_eq!(r.start_date, date("2024-01-01"));
        assert_eq!(r.end_date, date("2024-01-03"));
        assert!((r.metrics.spend - 300.0).abs() < 1e-9);
        assert!((r.metrics.impressions - 1000.0).abs() < 1e-9);
        assert!((r.metrics.revenue - 600.0).abs() < 1e-9);
        assert_eq!(r.reported_cpc, Some(6.0));
        assert!(shaped.stats.missing_columns.is_empty());
    }

    #[test]
    fn test_missing_columns_degrade() {
        let table = RawTable::from_strings(
            &["廣告活動", "廣告期間(起)", "費用"],
            &[&["A", "2024-02-01", "NT$50"]],
        );
        let shaped = shaper().load_and_shape(&table, Platform::Meta);
        assert_eq!(shaped.records.len(), 1);
        let r = &shaped.records[0];
        assert_eq!(r.end_date, r.start_date);
        assert!((r.metrics.revenue).abs() < 1e-9);
        assert!((r.metrics.clicks).abs() < 1e-9);
        assert_eq!(r.reported_cpc, None);
        assert!(shaped.stats.missing_columns.contains(&"轉換金額".to_string()));
        assert!(shaped
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::SchemaMismatch));
    }

    #[test]
    fn test_unknown_date_dropped_and_counted() {
        let table = RawTable::from_strings(
            &["廣告活動", "廣告期間(起)", "費用"],
            &[
                &["A", "not a date", "NT$50"],
                &["B", "", "NT$50"],
                &["C", "2024-02-01", "NT$50"],
            ],
        );
        let shaped = shaper().load_and_shape(&table, Platform::Google);
        assert_eq!(shaped.records.len(), 1);
        assert_eq!(shaped.stats.dropped_unknown_date, 2);
        assert_eq!(shaped.stats.rows_read, 3);
    }

    #[test]
    fn test_format_error_excludes_row_with_diagnostic() {
        let table = RawTable::from_strings(
            &["廣告活動", "廣告期間(起)", "費用"],
            &[&["A", "2024-02-01", "about 50"], &["B", "2024-02-01", "NT$50"]],
        );
        let shaped = shaper().load_and_shape(&table, Platform::Google);
        assert_eq!(shaped.records.len(), 1);
        assert_eq!(shaped.records[0].campaign, "B");
        assert_eq!(shaped.stats.dropped_format_error, 1);

        let diag = shaped
            .diagnostics
            .iter()
            .find(|d| d.kind == DiagnosticKind::FormatError)
            .unwrap();
        assert_eq!(diag.row, Some(1));
        assert_eq!(diag.column.as_deref(), Some("費用"));
        assert_eq!(diag.raw_value.as_deref(), Some("about 50"));
    }

    #[test]
    fn test_inverted_or_bad_end_date_defaults_to_start() {
        let table = RawTable::from_strings(
            &["廣告活動", "廣告期間(起)", "廣告期間(迄)"],
            &[
                &["A", "2024-02-05", "2024-02-01"],
                &["B", "2024-02-05", "soon"],
                &["C", "2024-02-05", ""],
            ],
        );
        let shaped = shaper().load_and_shape(&table, Platform::Google);
        assert_eq!(shaped.records.len(), 3);
        for r in &shaped.records {
            assert_eq!(r.end_date, date("2024-02-05"));
        }
        let defaulted = shaped
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::EndDateDefaulted)
            .count();
        assert_eq!(defaulted, 2);
    }

    #[test]
    fn test_blank_rows_skipped() {
        let table = RawTable::from_strings(
            &["廣告活動", "廣告期間(起)"],
            &[&["", ""], &["A", "2024-02-01"]],
        );
        let shaped = shaper().load_and_shape(&table, Platform::Google);
        assert_eq!(shaped.stats.rows_read, 1);
        assert_eq!(shaped.records.len(), 1);
    }

    #[test]
    fn test_parse_date_variants() {
        let s = shaper();
        let expected = Some(date("2024-01-05"));
        assert_eq!(s.parse_date(&CellValue::from("2024-01-05")), expected);
        assert_eq!(s.parse_date(&CellValue::from("2024/1/5")), expected);
        assert_eq!(s.parse_date(&CellValue::from("2024-01-05 13:45:00")), expected);
        assert_eq!(s.parse_date(&CellValue::from("2024-01-05T00:00:00Z")), expected);
        assert_eq!(s.parse_date(&CellValue::Number(20240105.0)), expected);
        assert_eq!(s.parse_date(&CellValue::from("05/01/2024x")), None);
        assert_eq!(s.parse_date(&CellValue::Missing), None);
    }

    #[test]
    fn test_load_site() {
        let table = RawTable::from_strings(
            &["日期", "客單價", "營業額", "流量", "訂單數", "新會員數"],
            &[
                &["2024-01-01", "NT$250", "NT$500", "1,000", "2", "1"],
                &["bad", "", "NT$1", "1", "1", "0"],
                &["2024-01-02", "", "oops", "1", "1", "0"],
            ],
        );
        let shaped = shaper().load_site(&table);
        assert!(shaped.has_date_column);
        assert_eq!(shaped.records.len(), 1);
        let r = &shaped.records[0];
        assert!((r.metrics.revenue - 500.0).abs() < 1e-9);
        assert!((r.metrics.traffic - 1000.0).abs() < 1e-9);
        assert_eq!(shaped.stats.dropped_unknown_date, 1);
        assert_eq!(shaped.stats.dropped_format_error, 1);
    }

    #[test]
    fn test_malformed_site_aov_excludes_row() {
        let table = RawTable::from_strings(
            &["日期", "客單價", "營業額"],
            &[&["2024-01-01", "n/a", "NT$500"], &["2024-01-02", "NT$250", "NT$500"]],
        );
        let shaped = shaper().load_site(&table);
        assert_eq!(shaped.records.len(), 1);
        assert_eq!(shaped.records[0].date, date("2024-01-02"));
        assert_eq!(shaped.stats.dropped_format_error, 1);
        assert_eq!(shaped.stats.source, SITE_SOURCE);
        assert!(shaped.diagnostics.iter().all(|d| d.source == SITE_SOURCE));
    }

    #[test]
    fn test_site_without_date_column() {
        let table = RawTable::from_strings(&["營業額"], &[&["NT$5"]]);
        let shaped = shaper().load_site(&table);
        assert!(!shaped.has_date_column);
        assert!(shaped.records.is_empty());
        assert_eq!(shaped.stats.dropped_unknown_date, 1);
    }
}
