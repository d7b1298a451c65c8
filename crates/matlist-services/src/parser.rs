//! Material-list parsing.
//!
//! Two source shapes exist in the wild: plain CSV exports (name and quantity
//! in the first two columns, header row first) and JSON row lists — either
//! saved snapshots or, confusingly, files with a `.csv` extension whose body
//! is actually a JSON array. The original deployment produced both, so the
//! sniff here goes by content, not extension.

use matlist_protocol::Row;
use tracing::{debug, warn};

use crate::packing::split_quantity;

/// Parse a material-list body, JSON or CSV.
pub fn parse_rows(content: &str) -> Result<Vec<Row>, serde_json::Error> {
    let trimmed = content.trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('[') {
        parse_json(trimmed)
    } else {
        Ok(parse_csv(trimmed))
    }
}

/// Parse a JSON row list. Rows may be records or legacy positional arrays.
pub fn parse_json(content: &str) -> Result<Vec<Row>, serde_json::Error> {
    serde_json::from_str::<Vec<Row>>(content)
}

/// Parse CSV content into rows.
///
/// The header row is skipped, rows with fewer than two cells or blank
/// name/quantity cells are dropped, and packing counts are derived from the
/// quantity. CSV parsing itself never fails — unreadable records are skipped
/// with a log entry.
pub fn parse_csv(content: &str) -> Vec<Row> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unreadable CSV record at line {}: {e}", line + 2);
                continue;
            }
        };
        if record.len() < 2 {
            continue;
        }
        let name = record[0].trim();
        let quantity = record[1].trim();
        if name.is_empty() || quantity.is_empty() {
            continue;
        }
        let (boxes, groups, pieces) = split_quantity(quantity);
        rows.push(Row::new(name, quantity, boxes, groups, pieces));
    }
    debug!("Parsed {} rows from CSV", rows.len());
    rows
}
