//! Range-to-daily allocator: spreads each campaign interval evenly over the
//! calendar days it covers.

use campaign_core::types::{DailyAdRecord, RawRecord};
use rayon::prelude::*;

/// Expand one record into one [`DailyAdRecord`] per covered day, each carrying
/// `1/n` of every additive metric. An inverted interval is a single day.
pub fn explode(record: &RawRecord) -> Vec<DailyAdRecord> {
    let n = if record.end_date < record.start_date {
        1
    } else {
        record.span_days()
    };
    let share = record.metrics.divided_by(n as f64);

    record
        .start_date
        .iter_days()
        .take(n as usize)
        .map(|date| DailyAdRecord {
            platform: record.platform,
            campaign: record.campaign.clone(),
            date,
            metrics: share,
        })
        .collect()
}

/// Explode every record. Records are independent, so the work is spread over
/// the rayon pool; output order follows input order.
pub fn explode_all(records: &[RawRecord]) -> Vec<DailyAdRecord> {
    records.par_iter().flat_map_iter(explode).collect()
}
