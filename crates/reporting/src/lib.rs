//! Ad-performance reporting pipeline: field normalization, source shaping,
//! range-to-daily allocation, site/ad merging, granularity bucketing and
//! derived metrics.

pub mod aggregator;
pub mod allocator;
pub mod breakdown;
pub mod derived;
pub mod export;
pub mod filter;
pub mod kpi;
pub mod loader;
pub mod merger;
pub mod normalize;
pub mod pipeline;

pub use aggregator::Aggregator;
pub use filter::ReportFilter;
pub use loader::SourceShaper;
pub use normalize::FieldNormalizer;
pub use pipeline::{Report, ReportPipeline};
