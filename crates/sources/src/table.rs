//! CSV payload → [`RawTable`].

use campaign_core::types::{CellValue, RawTable};
use campaign_core::{DashboardError, DashboardResult};
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parse a CSV export. The first record is the header row; data rows may be
/// shorter or longer than it. Empty cells become [`CellValue::Missing`].
///
/// A payload with no header, or one that is an HTML page (what a private
/// spreadsheet returns instead of CSV), is a fetch error for `source`.
pub fn parse_csv(source: &str, bytes: &[u8]) -> DashboardResult<RawTable> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(64)]).to_ascii_lowercase();
    let head = head.trim_start();
    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        return Err(DashboardError::fetch(
            source,
            "received an HTML page instead of CSV; is the sheet shared publicly?",
        ));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DashboardError::fetch(source, format!("unreadable header row: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(DashboardError::fetch(source, "payload has no header row"));
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            DashboardError::fetch(source, format!("malformed CSV at data row {}: {e}", idx + 1))
        })?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        CellValue::Missing
                    } else {
                        CellValue::from(field)
                    }
                })
                .collect(),
        );
    }

    debug!(source = source, columns = headers.len(), rows = rows.len(), "CSV parsed");
    Ok(RawTable::new(headers, rows))
}
