//! Ad-side breakdowns that are not anchored on the site timeline: the
//! per-platform trend and the per-campaign totals.

use crate::aggregator::bucket_start;
use crate::derived::ad_ratios;
use campaign_core::types::{AdMetrics, AdRatios, DailyAdRecord, Granularity, Platform, RawRecord};
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// One platform's activity in one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformPeriod {
    pub period: NaiveDate,
    pub platform: Platform,
    pub metrics: AdMetrics,
    pub ratios: AdRatios,
}

/// Totals of one campaign on one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub platform: Platform,
    pub campaign: String,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub metrics: AdMetrics,
    pub ratios: AdRatios,
    /// Platform-reported CPC and CPA from the latest source row that carried
    /// one, shown next to the recomputed ratios.
    pub reported_cpc: Option<f64>,
    pub reported_cpa: Option<f64>,
}

/// Sum daily ad rows per (period, platform), ordered by period then platform.
pub fn platform_trend(
    daily: &[DailyAdRecord],
    granularity: Granularity,
    week_start: Weekday,
) -> Vec<PlatformPeriod> {
    let mut sums: BTreeMap<(NaiveDate, Platform), AdMetrics> = BTreeMap::new();
    for d in daily {
        let key = (bucket_start(d.date, granularity, week_start), d.platform);
        *sums.entry(key).or_default() += d.metrics;
    }
    sums.into_iter()
        .map(|((period, platform), metrics)| PlatformPeriod {
            period,
            platform,
            metrics,
            ratios: ad_ratios(&metrics),
        })
        .collect()
}

/// Sum daily ad rows per (platform, campaign). Sorted by spend descending,
/// ties broken by platform then campaign name. `records` are the source rows
/// the daily rows were allocated from; they supply the reported ratios.
pub fn campaign_breakdown(daily: &[DailyAdRecord], records: &[RawRecord]) -> Vec<CampaignSummary> {
    let mut sums: BTreeMap<(Platform, &str), (AdMetrics, NaiveDate, NaiveDate)> = BTreeMap::new();
    for d in daily {
        sums.entry((d.platform, d.campaign.as_str()))
            .and_modify(|(m, first, last)| {
                *m += d.metrics;
                *first = (*first).min(d.date);
                *last = (*last).max(d.date);
            })
            .or_insert((d.metrics, d.date, d.date));
    }

    let mut out: Vec<CampaignSummary> = sums
        .into_iter()
        .map(|((platform, campaign), (metrics, first_date, last_date))| {
            let source_rows: Vec<&RawRecord> = records
                .iter()
                .filter(|r| {
                    r.platform == platform
                        && r.campaign == campaign
                        && r.start_date <= last_date
                        && r.end_date >= first_date
                })
                .collect();
            CampaignSummary {
                platform,
                campaign: campaign.to_string(),
                first_date,
                last_date,
                metrics,
                ratios: ad_ratios(&metrics),
                reported_cpc: latest_reported(&source_rows, |r| r.reported_cpc),
                reported_cpa: latest_reported(&source_rows, |r| r.reported_cpa),
            }
        })
        .collect();

    out.sort_by(|a, b| {
        b.metrics
            .spend
            .partial_cmp(&a.metrics.spend)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.platform.cmp(&b.platform))
            .then_with(|| a.campaign.cmp(&b.campaign))
    });
    out
}

fn latest_reported(rows: &[&RawRecord], field: impl Fn(&RawRecord) -> Option<f64>) -> Option<f64> {
    rows.iter()
        .filter_map(|r| field(*r).map(|v| (r.start_date, v)))
        .max_by_key(|(start, _)| *start)
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn day(platform: Platform, campaign: &str, d: &str, spend: f64, revenue: f64) -> DailyAdRecord {
        DailyAdRecord {
            platform,
            campaign: campaign.into(),
            date: date(d),
            metrics: AdMetrics {
                spend,
                revenue,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_weekly_platform_trend() {
        let daily = vec![
            day(Platform::Meta, "B", "2024-01-02", 10.0, 10.0),
            day(Platform::Google, "A", "2024-01-01", 10.0, 40.0),
            day(Platform::Google, "A", "2024-01-03", 30.0, 0.0),
            day(Platform::Google, "A", "2024-01-09", 5.0, 5.0),
        ];
        let trend = platform_trend(&daily, Granularity::Weekly, Weekday::Mon);
        assert_eq!(trend.len(), 3);
        assert_eq!(trend[0].period, date("2024-01-01"));
        assert_eq!(trend[0].platform, Platform::Google);
        assert!((trend[0].metrics.spend - 40.0).abs() < 1e-9);
        assert!((trend[0].ratios.roas - 1.0).abs() < 1e-9);
        assert_eq!(trend[1].platform, Platform::Meta);
        assert_eq!(trend[2].period, date("2024-01-08"));
    }

    #[test]
    fn test_campaign_breakdown_sorted_by_spend() {
        let daily = vec![
            day(Platform::Google, "Brand", "2024-01-01", 5.0, 50.0),
            day(Platform::Meta, "Retargeting", "2024-01-02", 20.0, 10.0),
            day(Platform::Google, "Brand", "2024-01-05", 5.0, 0.0),
            day(Platform::Google, "Generic", "2024-01-03", 20.0, 0.0),
        ];
        let out = campaign_breakdown(&daily, &[]);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].campaign, "Generic");
        assert_eq!(out[1].campaign, "Retargeting");
        assert_eq!(out[2].campaign, "Brand");
        assert_eq!(out[2].first_date, date("2024-01-01"));
        assert_eq!(out[2].last_date, date("2024-01-05"));
        assert!((out[2].ratios.roas - 5.0).abs() < 1e-9);
        assert_eq!(out[2].reported_cpc, None);
    }

    #[test]
    fn test_reported_ratios_from_latest_source_row() {
        let source = |start: &str, end: &str, cpc: Option<f64>, cpa: Option<f64>| RawRecord {
            platform: Platform::Google,
            campaign: "Brand".into(),
            start_date: date(start),
            end_date: date(end),
            metrics: AdMetrics::default(),
            reported_cpc: cpc,
            reported_cpa: cpa,
        };
        let records = vec![
            source("2024-01-01", "2024-01-02", Some(4.0), Some(40.0)),
            source("2024-01-05", "2024-01-05", Some(6.0), None),
            // Outside the allocated days; ignored.
            source("2024-02-01", "2024-02-01", Some(99.0), Some(99.0)),
        ];
        let daily = vec![
            day(Platform::Google, "Brand", "2024-01-01", 5.0, 0.0),
            day(Platform::Google, "Brand", "2024-01-05", 5.0, 0.0),
        ];
        let out = campaign_breakdown(&daily, &records);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].reported_cpc, Some(6.0));
        assert_eq!(out[0].reported_cpa, Some(40.0));
    }

    #[test]
    fn test_same_name_on_two_platforms_kept_apart() {
        let daily = vec![
            day(Platform::Google, "Sale", "2024-01-01", 1.0, 0.0),
            day(Platform::Meta, "Sale", "2024-01-01", 1.0, 0.0),
        ];
        assert_eq!(campaign_breakdown(&daily, &[]).len(), 2);
    }
}
