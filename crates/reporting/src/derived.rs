//! Metric deriver: ratios and organic residuals computed from additive
//! fields only.
//!
//! | metric | formula | zero denominator |
//! |---|---|---|
//! | ROAS | revenue / spend | 0 |
//! | CPA | spend / conversions | 0 |
//! | CPC | spend / clicks | 0 |
//! | CTR | clicks / impressions × 100 | 0 |
//! | CVR | conversions / clicks × 100 | 0 |
//! | AOV | site revenue / orders | 0 |

use campaign_core::types::{AdMetrics, AdRatios, AggregatedRecord, DerivedMetrics, OrganicPolicy, SiteMetrics};
use rayon::prelude::*;

/// `num / den`, or 0 when the denominator is 0 or the result is not finite.
pub fn safe_ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        return 0.0;
    }
    let ratio = num / den;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

pub fn ad_ratios(ads: &AdMetrics) -> AdRatios {
    AdRatios {
        roas: safe_ratio(ads.revenue, ads.spend),
        cpa: safe_ratio(ads.spend, ads.conversions),
        cpc: safe_ratio(ads.spend, ads.clicks),
        ctr: safe_ratio(ads.clicks, ads.impressions) * 100.0,
        cvr: safe_ratio(ads.conversions, ads.clicks) * 100.0,
    }
}

pub fn derived_metrics(ads: &AdMetrics, site: &SiteMetrics, policy: OrganicPolicy) -> DerivedMetrics {
    let mut organic_revenue = site.revenue - ads.revenue;
    let mut organic_traffic = site.traffic - ads.clicks;
    if policy == OrganicPolicy::FloorZero {
        organic_revenue = organic_revenue.max(0.0);
        organic_traffic = organic_traffic.max(0.0);
    }
    DerivedMetrics {
        ratios: ad_ratios(ads),
        organic_revenue,
        organic_traffic,
        aov: safe_ratio(site.revenue, site.orders),
    }
}

/// Attach derived metrics to a bucket.
pub fn derive(record: &AggregatedRecord, policy: OrganicPolicy) -> AggregatedRecord {
    AggregatedRecord {
        derived: derived_metrics(&record.ads, &record.site, policy),
        ..record.clone()
    }
}

/// [`derive`] over every bucket; buckets are independent.
pub fn derive_all(records: &[AggregatedRecord], policy: OrganicPolicy) -> Vec<AggregatedRecord> {
    records.par_iter().map(|r| derive(r, policy)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn bucket(ads: AdMetrics, site: SiteMetrics) -> AggregatedRecord {
        AggregatedRecord {
            period: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            days: 1,
            ads,
            by_platform: BTreeMap::new(),
            site,
            derived: DerivedMetrics::default(),
        }
    }

    #[test]
    fn test_zero_spend_roas_is_zero() {
        let r = derive(&bucket(AdMetrics::default(), SiteMetrics::default()), OrganicPolicy::Raw);
        let ratios = r.derived.ratios;
        assert_eq!(ratios.roas, 0.0);
        assert_eq!(ratios.cpa, 0.0);
        assert_eq!(ratios.cpc, 0.0);
        assert_eq!(ratios.ctr, 0.0);
        assert_eq!(ratios.cvr, 0.0);
        assert_eq!(r.derived.aov, 0.0);
    }

    #[test]
    fn test_ratio_formulas() {
        let ads = AdMetrics {
            spend: 200.0,
            impressions: 10_000.0,
            clicks: 100.0,
            conversions: 4.0,
            revenue: 800.0,
        };
        let site = SiteMetrics {
            revenue: 1000.0,
            traffic: 500.0,
            orders: 8.0,
            new_members: 2.0,
        };
        let d = derive(&bucket(ads, site), OrganicPolicy::Raw).derived;
        assert!((d.ratios.roas - 4.0).abs() < 1e-9);
        assert!((d.ratios.cpa - 50.0).abs() < 1e-9);
        assert!((d.ratios.cpc - 2.0).abs() < 1e-9);
        assert!((d.ratios.ctr - 1.0).abs() < 1e-9);
        assert!((d.ratios.cvr - 4.0).abs() < 1e-9);
        assert!((d.organic_revenue - 200.0).abs() < 1e-9);
        assert!((d.organic_traffic - 400.0).abs() < 1e-9);
        assert!((d.aov - 125.0).abs() < 1e-9);
    }

    #[test]
    fn test_over_attribution_policies() {
        let ads = AdMetrics {
            revenue: 900.0,
            clicks: 60.0,
            ..Default::default()
        };
        let site = SiteMetrics {
            revenue: 500.0,
            traffic: 50.0,
            ..Default::default()
        };
        let raw = derived_metrics(&ads, &site, OrganicPolicy::Raw);
        assert!((raw.organic_revenue + 400.0).abs() < 1e-9);
        assert!((raw.organic_traffic + 10.0).abs() < 1e-9);

        let floored = derived_metrics(&ads, &site, OrganicPolicy::FloorZero);
        assert_eq!(floored.organic_revenue, 0.0);
        assert_eq!(floored.organic_traffic, 0.0);
    }

    #[test]
    fn test_safe_ratio_never_non_finite() {
        assert_eq!(safe_ratio(1.0, 0.0), 0.0);
        assert_eq!(safe_ratio(0.0, 0.0), 0.0);
        assert_eq!(safe_ratio(f64::MAX, f64::MIN_POSITIVE), 0.0);
        assert!((safe_ratio(3.0, 2.0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_derive_all_keeps_order() {
        let mut a = bucket(AdMetrics { spend: 1.0, revenue: 2.0, ..Default::default() }, SiteMetrics::default());
        let mut b = a.clone();
        a.period = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        b.period = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let out = derive_all(&[a, b], OrganicPolicy::Raw);
        assert_eq!(out[0].period, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert!((out[1].derived.ratios.roas - 2.0).abs() < 1e-9);
    }
}
