//! Headline KPIs over the filtered period.

use crate::derived;
use campaign_core::types::{AdMetrics, DailyAdRecord, DerivedMetrics, MergedDailyRecord, OrganicPolicy, SiteMetrics};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiSummary {
    /// Ad totals over site-anchored days; the side the residuals subtract.
    pub ads: AdMetrics,
    /// Ad totals over every in-range day, including days with no site row.
    pub ads_including_unanchored: AdMetrics,
    pub site: SiteMetrics,
    pub derived: DerivedMetrics,
    pub site_days: usize,
}

/// Totals are summed first; every ratio comes from the totals. Ad and site
/// totals cover the same merged days, so the organic residual equals the
/// sum of the per-row residuals under the raw policy.
pub fn summarize(merged: &[MergedDailyRecord], daily: &[DailyAdRecord], policy: OrganicPolicy) -> KpiSummary {
    let ads: AdMetrics = merged.iter().map(|m| m.ads).sum();
    let site: SiteMetrics = merged.iter().map(|m| m.site).sum();

    KpiSummary {
        ads,
        ads_including_unanchored: daily.iter().map(|d| d.metrics).sum(),
        site,
        derived: derived::derived_metrics(&ads, &site, policy),
        site_days: merged.len(),
    }
}
