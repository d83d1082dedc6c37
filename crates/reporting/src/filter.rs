//! Caller-selected subsets: date range, platforms and campaigns.

use campaign_core::config::ReportConfig;
use campaign_core::types::{DailyAdRecord, Platform, RawRecord, SiteRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Empty platform/campaign sets mean "no restriction". Date bounds are
/// inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub platforms: BTreeSet<Platform>,
    pub campaigns: BTreeSet<String>,
}

impl ReportFilter {
    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            start: config.start_date,
            end: config.end_date,
            platforms: config.platforms.iter().copied().collect(),
            campaigns: config.campaigns.iter().cloned().collect(),
        }
    }

    pub fn with_date_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    pub fn with_platforms(mut self, platforms: impl IntoIterator<Item = Platform>) -> Self {
        self.platforms = platforms.into_iter().collect();
        self
    }

    pub fn with_campaigns<S: Into<String>>(mut self, campaigns: impl IntoIterator<Item = S>) -> Self {
        self.campaigns = campaigns.into_iter().map(Into::into).collect();
        self
    }

    /// Start after end: nothing can match.
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.end), (Some(s), Some(e)) if s > e)
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| date >= s) && self.end.is_none_or(|e| date <= e)
    }

    pub fn accepts_platform(&self, platform: Platform) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&platform)
    }

    pub fn accepts_campaign(&self, campaign: &str) -> bool {
        self.campaigns.is_empty() || self.campaigns.contains(campaign)
    }

    /// Platform and campaign subset, applied before allocation and merging.
    pub fn select_records(&self, records: Vec<RawRecord>) -> Vec<RawRecord> {
        records
            .into_iter()
            .filter(|r| self.accepts_platform(r.platform) && self.accepts_campaign(&r.campaign))
            .collect()
    }

    /// Date range on allocated days, applied before aggregation so weekly
    /// buckets at the boundary only hold in-range days.
    pub fn select_days(&self, daily: Vec<DailyAdRecord>) -> Vec<DailyAdRecord> {
        daily
            .into_iter()
            .filter(|d| self.contains_date(d.date))
            .collect()
    }

    /// Source rows whose start date is in range, newest first. Ties are
    /// ordered by platform then campaign.
    pub fn select_detail(&self, records: &[RawRecord]) -> Vec<RawRecord> {
        let mut detail: Vec<RawRecord> = records
            .iter()
            .filter(|r| self.contains_date(r.start_date))
            .cloned()
            .collect();
        detail.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then_with(|| a.platform.cmp(&b.platform))
                .then_with(|| a.campaign.cmp(&b.campaign))
        });
        detail
    }

    pub fn select_site(&self, site: &[SiteRecord]) -> Vec<SiteRecord> {
        site.iter()
            .filter(|s| self.contains_date(s.date))
            .cloned()
            .collect()
    }
}
