use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// Ad platform a source table was exported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Platform {
    #[serde(alias = "google")]
    Google,
    #[serde(alias = "meta")]
    Meta,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Google, Platform::Meta];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Meta => "Meta",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "meta" | "facebook" => Ok(Self::Meta),
            other => Err(format!("unknown platform '{other}'")),
        }
    }
}

/// Time bucket size for the aggregated output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Daily,
    Weekly,
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" | "d" => Ok(Self::Daily),
            "weekly" | "week" | "w" => Ok(Self::Weekly),
            other => Err(format!("unknown granularity '{other}'")),
        }
    }
}

/// How organic residuals (site total minus ad-attributed) are reported when
/// ad platforms over-attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrganicPolicy {
    /// Keep the residual as-is, negative values included.
    #[default]
    Raw,
    /// Clamp the residual at zero.
    FloorZero,
}

impl FromStr for OrganicPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "raw" => Ok(Self::Raw),
            "floor-zero" => Ok(Self::FloorZero),
            other => Err(format!("unknown organic policy '{other}'")),
        }
    }
}

// ─── Raw tables ─────────────────────────────────────────────────────────────

/// A single cell of a raw source table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Missing,
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Number(_) => false,
            Self::Text(s) => s.trim().is_empty(),
        }
    }

    /// Textual form used for diagnostics.
    pub fn display_value(&self) -> String {
        match self {
            Self::Missing => String::new(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// A header row plus loosely typed rows, as delivered by a source fetcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

static MISSING: CellValue = CellValue::Missing;

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { headers, rows }
    }

    /// Build a table from string literals; handy for fixtures.
    pub fn from_strings(headers: &[&str], rows: &[&[&str]]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| CellValue::from(*c)).collect())
                .collect(),
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    /// Cell at `(row, col)`; short rows read as missing.
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&MISSING)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ─── Metric bundles ─────────────────────────────────────────────────────────

/// Additive ad-platform metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdMetrics {
    pub spend: f64,
    pub impressions: f64,
    pub clicks: f64,
    pub conversions: f64,
    pub revenue: f64,
}

impl AdMetrics {
    /// Every metric divided by `n`.
    pub fn divided_by(&self, n: f64) -> Self {
        Self {
            spend: self.spend / n,
            impressions: self.impressions / n,
            clicks: self.clicks / n,
            conversions: self.conversions / n,
            revenue: self.revenue / n,
        }
    }
}

impl Add for AdMetrics {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for AdMetrics {
    fn add_assign(&mut self, rhs: Self) {
        self.spend += rhs.spend;
        self.impressions += rhs.impressions;
        self.clicks += rhs.clicks;
        self.conversions += rhs.conversions;
        self.revenue += rhs.revenue;
    }
}

impl Sum for AdMetrics {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Additive storefront metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteMetrics {
    pub revenue: f64,
    pub traffic: f64,
    pub orders: f64,
    pub new_members: f64,
}

impl Add for SiteMetrics {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for SiteMetrics {
    fn add_assign(&mut self, rhs: Self) {
        self.revenue += rhs.revenue;
        self.traffic += rhs.traffic;
        self.orders += rhs.orders;
        self.new_members += rhs.new_members;
    }
}

impl Sum for SiteMetrics {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

// ─── Records ────────────────────────────────────────────────────────────────

/// One ad-platform row covering a campaign date interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub platform: Platform,
    pub campaign: String,
    pub start_date: NaiveDate,
    /// Equal to `start_date` when the source had no end date.
    pub end_date: NaiveDate,
    pub metrics: AdMetrics,
    /// Platform-reported ratios; informational only, never summed.
    pub reported_cpc: Option<f64>,
    pub reported_cpa: Option<f64>,
}

impl RawRecord {
    /// Number of calendar days covered, at least 1.
    pub fn span_days(&self) -> i64 {
        ((self.end_date - self.start_date).num_days() + 1).max(1)
    }
}

/// One storefront-backend row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub date: NaiveDate,
    pub metrics: SiteMetrics,
}

/// One day's share of a [`RawRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAdRecord {
    pub platform: Platform,
    pub campaign: String,
    pub date: NaiveDate,
    pub metrics: AdMetrics,
}

/// Site day joined with the summed ad activity of that day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedDailyRecord {
    pub date: NaiveDate,
    pub ads: AdMetrics,
    pub by_platform: BTreeMap<Platform, AdMetrics>,
    pub site: SiteMetrics,
}

/// Ad efficiency ratios. CTR and CVR are percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdRatios {
    pub roas: f64,
    pub cpa: f64,
    pub cpc: f64,
    pub ctr: f64,
    pub cvr: f64,
}

/// Ratios and residuals computed from additive fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    #[serde(flatten)]
    pub ratios: AdRatios,
    pub organic_revenue: f64,
    pub organic_traffic: f64,
    /// Average order value, site revenue over orders.
    pub aov: f64,
}

/// A merged bucket keyed by period start (the day itself under daily
/// granularity, the week start under weekly).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRecord {
    pub period: NaiveDate,
    pub days: u32,
    pub ads: AdMetrics,
    pub by_platform: BTreeMap<Platform, AdMetrics>,
    pub site: SiteMetrics,
    pub derived: DerivedMetrics,
}

/// Source name of the storefront-backend table in diagnostics and fetch
/// errors.
pub const SITE_SOURCE: &str = "site";

/// Raw tables of one refresh cycle: one ad table per platform plus the site
/// table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceSnapshot {
    pub ad_tables: BTreeMap<Platform, RawTable>,
    pub site_table: RawTable,
    pub fetched_at: Option<DateTime<Utc>>,
}

// ─── Diagnostics ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Cell could not be normalized; row excluded.
    FormatError,
    /// Start date missing or unparseable; row excluded.
    UnknownDate,
    /// End date unparseable; row kept as a single-day record.
    EndDateDefaulted,
    /// Configured column absent from the source; transform skipped.
    SchemaMismatch,
}

/// Row-level data-quality record kept alongside the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowDiagnostic {
    pub source: String,
    /// 1-based data row number, `None` for table-level findings.
    pub row: Option<usize>,
    pub column: Option<String>,
    pub raw_value: Option<String>,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parse_and_display() {
        assert_eq!("google".parse::<Platform>().unwrap(), Platform::Google);
        assert_eq!(" Meta ".parse::<Platform>().unwrap(), Platform::Meta);
        assert_eq!("facebook".parse::<Platform>().unwrap(), Platform::Meta);
        assert!("tiktok".parse::<Platform>().is_err());
        assert_eq!(Platform::Google.to_string(), "Google");
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("raw".parse::<OrganicPolicy>().unwrap(), OrganicPolicy::Raw);
        assert_eq!(
            "floor_zero".parse::<OrganicPolicy>().unwrap(),
            OrganicPolicy::FloorZero
        );
        assert_eq!("Weekly".parse::<Granularity>().unwrap(), Granularity::Weekly);
    }

    #[test]
    fn test_span_days_clamps_inverted_range() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let mut record = RawRecord {
            platform: Platform::Google,
            campaign: "A".into(),
            start_date: d("2024-01-01"),
            end_date: d("2024-01-03"),
            metrics: AdMetrics::default(),
            reported_cpc: None,
            reported_cpa: None,
        };
        assert_eq!(record.span_days(), 3);
        record.end_date = d("2023-12-25");
        assert_eq!(record.span_days(), 1);
    }

    #[test]
    fn test_short_rows_read_as_missing() {
        let table = RawTable::from_strings(&["a", "b"], &[&["1"]]);
        assert_eq!(table.column_index("b"), Some(1));
        assert_eq!(table.cell(0, 1), &CellValue::Missing);
        assert_eq!(table.cell(5, 0), &CellValue::Missing);
    }

    #[test]
    fn test_metric_sum() {
        let a = AdMetrics {
            spend: 1.0,
            clicks: 2.0,
            ..Default::default()
        };
        let total: AdMetrics = vec![a, a, a].into_iter().sum();
        assert!((total.spend - 3.0).abs() < f64::EPSILON);
        assert!((total.clicks - 6.0).abs() < f64::EPSILON);
    }
}
