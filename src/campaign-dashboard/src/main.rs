//! Campaign Dashboard: ad-platform and storefront reporting.
//!
//! `report` fetches every source once and writes the aggregated report;
//! `serve` exposes the same pipeline over HTTP with a cached snapshot.

use anyhow::Context;
use campaign_api::ApiServer;
use campaign_core::config::AppConfig;
use campaign_core::types::{Granularity, OrganicPolicy, Platform};
use campaign_reporting::export;
use campaign_reporting::pipeline::ReportWarning;
use campaign_reporting::ReportPipeline;
use campaign_sources::{Refresher, SourceSet};
use chrono::{NaiveDate, Weekday};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "campaign-dashboard")]
#[command(about = "Ad-performance and storefront reporting dashboard")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML); environment variables still apply
    #[arg(long, global = true, env = "CAMPAIGN_DASHBOARD_CONFIG")]
    config: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch sources once and write the report
    Report(ReportArgs),
    /// Serve the report over HTTP
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// daily or weekly
    #[arg(long)]
    granularity: Option<Granularity>,

    /// First day of the week for weekly buckets (e.g. mon, sun)
    #[arg(long)]
    week_start: Option<Weekday>,

    /// Inclusive start date (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Inclusive end date (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Restrict to a platform; repeatable
    #[arg(long = "platform")]
    platforms: Vec<Platform>,

    /// Restrict to a campaign; repeatable
    #[arg(long = "campaign")]
    campaigns: Vec<String>,

    /// raw or floor-zero
    #[arg(long)]
    organic: Option<OrganicPolicy>,

    /// Write the aggregated rows as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Exit non-zero when the filtered report has no rows
    #[arg(long, default_value_t = false)]
    fail_on_empty: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Bind address (overrides config)
    #[arg(long, env = "CAMPAIGN_DASHBOARD__API__HOST")]
    host: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "CAMPAIGN_DASHBOARD__API__HTTP_PORT")]
    port: Option<u16>,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "campaign_dashboard=info,campaign_reporting=info,campaign_sources=info,tower_http=info".into()
    });
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(path: Option<&str>) -> anyhow::Result<AppConfig> {
    match AppConfig::load(path) {
        Ok(config) => Ok(config),
        Err(e) if path.is_none() => {
            warn!(error = %e, "Failed to load config, using defaults");
            Ok(AppConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("loading config from {}", path.unwrap_or_default())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    info!("Campaign Dashboard starting up");
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Report(args) => {
            apply_report_overrides(&mut config, &args);
            config.validate()?;
            run_report(config, args).await
        }
        Command::Serve(args) => {
            if let Some(host) = args.host {
                config.api.host = host;
            }
            if let Some(port) = args.port {
                config.api.http_port = port;
            }
            config.validate()?;
            serve(config).await
        }
    }
}

fn apply_report_overrides(config: &mut AppConfig, args: &ReportArgs) {
    let report = &mut config.report;
    if let Some(granularity) = args.granularity {
        report.granularity = granularity;
    }
    if let Some(week_start) = args.week_start {
        report.week_start = week_start;
    }
    if let Some(policy) = args.organic {
        report.organic_policy = policy;
    }
    if args.start.is_some() {
        report.start_date = args.start;
    }
    if args.end.is_some() {
        report.end_date = args.end;
    }
    if !args.platforms.is_empty() {
        report.platforms = args.platforms.clone();
    }
    if !args.campaigns.is_empty() {
        report.campaigns = args.campaigns.clone();
    }
}

async fn run_report(config: AppConfig, args: ReportArgs) -> anyhow::Result<()> {
    info!(
        granularity = ?config.report.granularity,
        start = ?config.report.start_date,
        end = ?config.report.end_date,
        "Configuration loaded"
    );

    let refresher = Refresher::new(SourceSet::from_config(&config.sources)?, &config.cache);
    let refreshed = refresher.snapshot().await?;
    let report = ReportPipeline::from_config(&config).run(&refreshed.snapshot)?;

    for warning in &report.warnings {
        match warning {
            ReportWarning::EmptyResult => warn!("Report has no rows for the selected filters"),
            other => warn!(warning = ?other, "Report warning"),
        }
    }

    let kpis = &report.kpis;
    info!(
        spend = kpis.ads.spend,
        spend_incl_unanchored = kpis.ads_including_unanchored.spend,
        ad_revenue = kpis.ads.revenue,
        roas = kpis.derived.ratios.roas,
        cpa = kpis.derived.ratios.cpa,
        ctr = kpis.derived.ratios.ctr,
        site_revenue = kpis.site.revenue,
        organic_revenue = kpis.derived.organic_revenue,
        aov = kpis.derived.aov,
        rows = report.rows.len(),
        "KPI summary"
    );

    if let Some(path) = &args.csv {
        export::write_csv(&report, path)?;
    }
    if let Some(path) = &args.json {
        export::write_json(&report, path)?;
    }
    if args.csv.is_none() && args.json.is_none() {
        print!("{}", export::rows_to_csv(&report.rows)?);
    }

    if args.fail_on_empty {
        report.require_rows()?;
    }
    Ok(())
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let refresher = Arc::new(Refresher::new(
        SourceSet::from_config(&config.sources)?,
        &config.cache,
    ));
    let metrics_enabled = config.metrics.enabled;
    let api_server = ApiServer::new(config, refresher);

    if metrics_enabled {
        if let Err(e) = api_server.start_metrics() {
            error!(error = %e, "Failed to start metrics exporter");
        }
    }

    info!("Campaign Dashboard is ready to serve reports");
    api_server.start_http().await?;
    Ok(())
}
