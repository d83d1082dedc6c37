//! Local CSV exports through the refresh cycle and into a report.

#[cfg(test)]
mod tests {
    use campaign_core::config::{CacheConfig, SourceLocation, SourcesConfig};
    use campaign_core::types::Platform;
    use campaign_reporting::ReportPipeline;
    use campaign_sources::{Refresher, SnapshotOrigin, SourceSet};
    use std::path::PathBuf;

    const GOOGLE_CSV: &str = "\
廣告活動,廣告期間(起),廣告期間(迄),費用,曝光次數,點擊數,轉換,轉換金額,CPC,單次轉換費用
Brand,2024-01-01,2024-01-03,\"NT$3,000\",\"30,000\",300,30,\"NT$9,000\",10,100
";
    const META_CSV: &str = "\
廣告活動,廣告期間(起),廣告期間(迄),費用,曝光次數,點擊數,轉換,轉換金額,CPC,單次轉換費用
Retargeting,2024/01/02,2024/01/02,$500,5000,50,5,$1000,10,100
";
    const SITE_CSV: &str = "\
日期,客單價,營業額,流量,訂單數,新會員數
2024-01-01,NT$500,\"NT$10,000\",2000,20,3
2024-01-02,NT$500,\"NT$12,000\",2500,24,5
2024-01-03,NT$500,\"NT$8,000\",1800,16,1
";

    fn write_fixture(dir: &PathBuf, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn file_config(tag: &str) -> SourcesConfig {
        let dir = std::env::temp_dir().join(format!("campaign-dashboard-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut config = SourcesConfig::default();
        config.google = SourceLocation {
            gid: None,
            path: Some(write_fixture(&dir, "google.csv", GOOGLE_CSV)),
        };
        config.meta = SourceLocation {
            gid: None,
            path: Some(write_fixture(&dir, "meta.csv", META_CSV)),
        };
        config.site = SourceLocation {
            gid: None,
            path: Some(write_fixture(&dir, "site.csv", SITE_CSV)),
        };
        config
    }

    #[tokio::test]
    async fn test_file_snapshot_to_report() {
        let sources = SourceSet::from_config(&file_config("report")).unwrap();
        let refresher = Refresher::new(sources, &CacheConfig::default());

        let refreshed = refresher.snapshot().await.unwrap();
        assert_eq!(refreshed.origin, SnapshotOrigin::Fetched);
        assert!(refreshed.snapshot.fetched_at.is_some());
        assert_eq!(refreshed.snapshot.ad_tables.len(), 2);

        let report = ReportPipeline::default().run(&refreshed.snapshot).unwrap();
        assert_eq!(report.rows.len(), 3);
        // Google spends 1000 per day; Meta adds 500 on 01-02.
        assert!((report.rows[1].ads.spend - 1500.0).abs() < 1e-9);
        assert!((report.rows[1].by_platform[&Platform::Meta].revenue - 1000.0).abs() < 1e-9);
        assert!((report.rows[1].site.revenue - 12_000.0).abs() < 1e-9);
        assert!((report.kpis.ads.spend - 3500.0).abs() < 1e-9);
        assert!(report.warnings.is_empty());

        let cached = refresher.snapshot().await.unwrap();
        assert_eq!(cached.origin, SnapshotOrigin::Cache);
    }

    #[tokio::test]
    async fn test_missing_file_without_last_good_fails() {
        let mut config = file_config("missing");
        config.site.path = Some("/nonexistent/campaign-dashboard/site.csv".into());
        let refresher = Refresher::new(SourceSet::from_config(&config).unwrap(), &CacheConfig::default());
        assert!(refresher.snapshot().await.is_err());
    }
}
