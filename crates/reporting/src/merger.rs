//! Multi-source merger: left join of the site timeline with per-day ad
//! totals.

use campaign_core::types::{AdMetrics, DailyAdRecord, MergedDailyRecord, Platform, SiteMetrics, SiteRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Ad activity of one calendar day, totalled and per platform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayAds {
    pub total: AdMetrics,
    pub by_platform: BTreeMap<Platform, AdMetrics>,
}

/// Output of [`merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub records: Vec<MergedDailyRecord>,
    /// Days with ad activity but no site row; not part of `records`.
    pub ad_only_dates: Vec<NaiveDate>,
    /// Site dates that appeared more than once and were summed.
    pub duplicate_site_dates: usize,
}

/// Sum daily ad rows per date across campaigns and platforms.
pub fn sum_ads_by_date(daily: &[DailyAdRecord]) -> BTreeMap<NaiveDate, DayAds> {
    let mut by_date: BTreeMap<NaiveDate, DayAds> = BTreeMap::new();
    for record in daily {
        let day = by_date.entry(record.date).or_default();
        day.total += record.metrics;
        *day.by_platform.entry(record.platform).or_default() += record.metrics;
    }
    by_date
}

/// Sum site rows per date. Returns the per-date totals and the number of
/// dates that had more than one row.
pub fn sum_site_by_date(site: &[SiteRecord]) -> (BTreeMap<NaiveDate, SiteMetrics>, usize) {
    let mut by_date: BTreeMap<NaiveDate, (SiteMetrics, usize)> = BTreeMap::new();
    for record in site {
        let entry = by_date.entry(record.date).or_default();
        entry.0 += record.metrics;
        entry.1 += 1;
    }
    let duplicates = by_date.values().filter(|(_, rows)| *rows > 1).count();
    let totals = by_date.into_iter().map(|(date, (m, _))| (date, m)).collect();
    (totals, duplicates)
}

/// Join site days with ad days. Every site date appears exactly once, in
/// ascending order; days without ad activity get zeroed ad metrics.
pub fn merge(daily: &[DailyAdRecord], site: &[SiteRecord]) -> MergeOutcome {
    let mut ads = sum_ads_by_date(daily);
    let (site_days, duplicate_site_dates) = sum_site_by_date(site);

    if duplicate_site_dates > 0 {
        warn!(duplicates = duplicate_site_dates, "Duplicate site dates summed");
    }

    let records: Vec<MergedDailyRecord> = site_days
        .into_iter()
        .map(|(date, site)| {
            let day = ads.remove(&date).unwrap_or_default();
            MergedDailyRecord {
                date,
                ads: day.total,
                by_platform: day.by_platform,
                site,
            }
        })
        .collect();

    let ad_only_dates: Vec<NaiveDate> = ads.into_keys().collect();
    debug!(
        merged = records.len(),
        ad_only = ad_only_dates.len(),
        "Site and ad timelines merged"
    );

    MergeOutcome {
        records,
        ad_only_dates,
        duplicate_site_dates,
    }
}
