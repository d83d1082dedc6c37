//! Source transport: turns spreadsheet or file CSV exports into raw tables
//! and keeps the latest snapshot cached between refresh cycles.

pub mod fetcher;
pub mod refresher;
pub mod source_set;
pub mod table;

pub use fetcher::{FileFetcher, SheetFetcher, SourceFetcher};
pub use refresher::{Refreshed, Refresher, SnapshotOrigin};
pub use source_set::SourceSet;
pub use table::parse_csv;
