//! Granularity aggregator: re-buckets the merged daily series and
//! recomputes ratios from the bucket sums.

use crate::derived;
use campaign_core::config::ReportConfig;
use campaign_core::types::{
    AdMetrics, AggregatedRecord, DerivedMetrics, Granularity, MergedDailyRecord, OrganicPolicy,
    Platform, SiteMetrics,
};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeMap;

/// First day of the bucket `date` falls into.
pub fn bucket_start(date: NaiveDate, granularity: Granularity, week_start: Weekday) -> NaiveDate {
    match granularity {
        Granularity::Daily => date,
        Granularity::Weekly => {
            let offset = (date.weekday().num_days_from_monday() + 7
                - week_start.num_days_from_monday())
                % 7;
            date - Duration::days(offset as i64)
        }
    }
}

#[derive(Default)]
struct Bucket {
    days: u32,
    ads: AdMetrics,
    by_platform: BTreeMap<Platform, AdMetrics>,
    site: SiteMetrics,
}

#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    pub granularity: Granularity,
    pub week_start: Weekday,
    pub organic_policy: OrganicPolicy,
}

impl Aggregator {
    pub fn new(granularity: Granularity, week_start: Weekday, organic_policy: OrganicPolicy) -> Self {
        Self {
            granularity,
            week_start,
            organic_policy,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.granularity, config.week_start, config.organic_policy)
    }

    pub fn bucket_of(&self, date: NaiveDate) -> NaiveDate {
        bucket_start(date, self.granularity, self.week_start)
    }

    /// Sum additive fields per bucket, then derive ratios from the sums.
    /// Output is ordered by period.
    pub fn aggregate(&self, merged: &[MergedDailyRecord]) -> Vec<AggregatedRecord> {
        let mut buckets: BTreeMap<NaiveDate, Bucket> = BTreeMap::new();
        for record in merged {
            let bucket = buckets.entry(self.bucket_of(record.date)).or_default();
            bucket.days += 1;
            bucket.ads += record.ads;
            bucket.site += record.site;
            for (platform, metrics) in &record.by_platform {
                *bucket.by_platform.entry(*platform).or_default() += *metrics;
            }
        }

        let summed: Vec<AggregatedRecord> = buckets
            .into_iter()
            .map(|(period, b)| AggregatedRecord {
                period,
                days: b.days,
                ads: b.ads,
                by_platform: b.by_platform,
                site: b.site,
                derived: DerivedMetrics::default(),
            })
            .collect();

        derived::derive_all(&summed, self.organic_policy)
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::from_config(&ReportConfig::default())
    }
}
