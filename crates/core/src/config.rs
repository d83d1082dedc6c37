use crate::error::{DashboardError, DashboardResult};
use crate::types::{Granularity, OrganicPolicy, Platform};
use chrono::{NaiveDate, Weekday};
use serde::Deserialize;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `CAMPAIGN_DASHBOARD__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

// ─── Sources ────────────────────────────────────────────────────────────────

/// Where each raw table comes from. A `path` wins over a sheet `gid`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceLocation {
    #[serde(default)]
    pub gid: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub sheet_id: String,
    #[serde(default = "default_export_url_template")]
    pub export_url_template: String,
    #[serde(default = "default_google_source")]
    pub google: SourceLocation,
    #[serde(default = "default_meta_source")]
    pub meta: SourceLocation,
    #[serde(default)]
    pub site: SourceLocation,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl SourcesConfig {
    pub fn location(&self, platform: Platform) -> &SourceLocation {
        match platform {
            Platform::Google => &self.google,
            Platform::Meta => &self.meta,
        }
    }

    /// CSV export URL of one sheet tab.
    pub fn export_url(&self, gid: &str) -> String {
        self.export_url_template
            .replace("{sheet_id}", &self.sheet_id)
            .replace("{gid}", gid)
    }
}

// ─── Schema ─────────────────────────────────────────────────────────────────

/// Column names of the ad-platform exports.
#[derive(Debug, Clone, Deserialize)]
pub struct AdColumns {
    #[serde(default = "default_col_campaign")]
    pub campaign: String,
    #[serde(default = "default_col_start_date")]
    pub start_date: String,
    #[serde(default = "default_col_end_date")]
    pub end_date: String,
    #[serde(default = "default_col_spend")]
    pub spend: String,
    #[serde(default = "default_col_impressions")]
    pub impressions: String,
    #[serde(default = "default_col_clicks")]
    pub clicks: String,
    #[serde(default = "default_col_conversions")]
    pub conversions: String,
    #[serde(default = "default_col_revenue")]
    pub revenue: String,
    #[serde(default = "default_col_cpc")]
    pub cpc: String,
    #[serde(default = "default_col_cpa")]
    pub cpa: String,
}

/// Column names of the storefront-backend export.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteColumns {
    #[serde(default = "default_col_site_date")]
    pub date: String,
    #[serde(default = "default_col_site_aov")]
    pub aov: String,
    #[serde(default = "default_col_site_revenue")]
    pub revenue: String,
    #[serde(default = "default_col_site_traffic")]
    pub traffic: String,
    #[serde(default = "default_col_site_orders")]
    pub orders: String,
    #[serde(default = "default_col_site_new_members")]
    pub new_members: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub ad: AdColumns,
    #[serde(default)]
    pub site: SiteColumns,
    /// Stripped from currency cells, longest token first.
    #[serde(default = "default_currency_tokens")]
    pub currency_tokens: Vec<String>,
    #[serde(default = "default_thousands_separator")]
    pub thousands_separator: String,
    /// chrono format strings tried in order.
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
}

// ─── Cache / report / api ───────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_retain_last_good")]
    pub retain_last_good: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub granularity: Granularity,
    #[serde(default = "default_week_start")]
    pub week_start: Weekday,
    #[serde(default)]
    pub organic_policy: OrganicPolicy,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    /// Empty means every platform.
    #[serde(default)]
    pub platforms: Vec<Platform>,
    /// Empty means every campaign.
    #[serde(default)]
    pub campaigns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default functions
fn default_export_url_template() -> String {
    "https://docs.google.com/spreadsheets/d/{sheet_id}/export?format=csv&gid={gid}".to_string()
}
fn default_google_source() -> SourceLocation {
    SourceLocation {
        gid: Some("0".to_string()),
        path: None,
    }
}
fn default_meta_source() -> SourceLocation {
    SourceLocation {
        gid: Some("1891939344".to_string()),
        path: None,
    }
}
fn default_fetch_timeout_ms() -> u64 {
    15_000
}
fn default_col_campaign() -> String {
    "廣告活動".to_string()
}
fn default_col_start_date() -> String {
    "廣告期間(起)".to_string()
}
fn default_col_end_date() -> String {
    "廣告期間(迄)".to_string()
}
fn default_col_spend() -> String {
    "費用".to_string()
}
fn default_col_impressions() -> String {
    "曝光次數".to_string()
}
fn default_col_clicks() -> String {
    "點擊數".to_string()
}
fn default_col_conversions() -> String {
    "轉換".to_string()
}
fn default_col_revenue() -> String {
    "轉換金額".to_string()
}
fn default_col_cpc() -> String {
    "CPC".to_string()
}
fn default_col_cpa() -> String {
    "單次轉換費用".to_string()
}
fn default_col_site_date() -> String {
    "日期".to_string()
}
fn default_col_site_aov() -> String {
    "客單價".to_string()
}
fn default_col_site_revenue() -> String {
    "營業額".to_string()
}
fn default_col_site_traffic() -> String {
    "流量".to_string()
}
fn default_col_site_orders() -> String {
    "訂單數".to_string()
}
fn default_col_site_new_members() -> String {
    "新會員數".to_string()
}
fn default_currency_tokens() -> Vec<String> {
    vec!["NT$".to_string(), "$".to_string()]
}
fn default_thousands_separator() -> String {
    ",".to_string()
}
fn default_date_formats() -> Vec<String> {
    vec![
        "%Y-%m-%d".to_string(),
        "%Y/%m/%d".to_string(),
        "%Y.%m.%d".to_string(),
        "%Y%m%d".to_string(),
    ]
}
fn default_ttl_secs() -> u64 {
    600
}
fn default_retain_last_good() -> bool {
    true
}
fn default_week_start() -> Weekday {
    Weekday::Mon
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            sheet_id: String::new(),
            export_url_template: default_export_url_template(),
            google: default_google_source(),
            meta: default_meta_source(),
            site: SourceLocation::default(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl Default for AdColumns {
    fn default() -> Self {
        Self {
            campaign: default_col_campaign(),
            start_date: default_col_start_date(),
            end_date: default_col_end_date(),
            spend: default_col_spend(),
            impressions: default_col_impressions(),
            clicks: default_col_clicks(),
            conversions: default_col_conversions(),
            revenue: default_col_revenue(),
            cpc: default_col_cpc(),
            cpa: default_col_cpa(),
        }
    }
}

impl Default for SiteColumns {
    fn default() -> Self {
        Self {
            date: default_col_site_date(),
            aov: default_col_site_aov(),
            revenue: default_col_site_revenue(),
            traffic: default_col_site_traffic(),
            orders: default_col_site_orders(),
            new_members: default_col_site_new_members(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            ad: AdColumns::default(),
            site: SiteColumns::default(),
            currency_tokens: default_currency_tokens(),
            thousands_separator: default_thousands_separator(),
            date_formats: default_date_formats(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            retain_last_good: default_retain_last_good(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            granularity: Granularity::default(),
            week_start: default_week_start(),
            organic_policy: OrganicPolicy::default(),
            start_date: None,
            end_date: None,
            platforms: Vec::new(),
            campaigns: Vec::new(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then environment
    /// variables (which take precedence).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("CAMPAIGN_DASHBOARD")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("report.platforms")
                .with_list_parse_key("report.campaigns")
                .with_list_parse_key("schema.currency_tokens")
                .with_list_parse_key("schema.date_formats"),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> DashboardResult<()> {
        if self.schema.date_formats.is_empty() {
            return Err(DashboardError::Config(
                "schema.date_formats must list at least one format".into(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(DashboardError::Config("cache.ttl_secs must be > 0".into()));
        }
        let needs_sheet = Platform::ALL
            .iter()
            .map(|p| self.sources.location(*p))
            .chain(std::iter::once(&self.sources.site))
            .any(|loc| loc.path.is_none() && loc.gid.is_some());
        if needs_sheet && self.sources.sheet_id.trim().is_empty() {
            return Err(DashboardError::Config(
                "sources.sheet_id is required when a source is read from a sheet tab".into(),
            ));
        }
        if self.sources.site.path.is_none() && self.sources.site.gid.is_none() {
            return Err(DashboardError::Config(
                "sources.site needs either a path or a gid".into(),
            ));
        }
        Ok(())
    }
}
