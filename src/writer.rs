//! Delimited file writing.
//!
//! Serializes a materialized result set to a delimited file using an
//! explicit column order as the header. Cells containing the delimiter, a
//! quote, or a newline get standard CSV quoting so the file re-reads to the
//! same rows.

use crate::error::{Result, SyncError};
use crate::types::Row;
use serde_json::Value;
use std::borrow::Cow;
use std::path::Path;

/// Render a cell for output. Missing and null cells become empty strings;
/// non-string scalars keep their JSON text form.
fn render_cell(value: Option<&Value>) -> Cow<'_, str> {
    match value {
        None | Some(Value::Null) => Cow::Borrowed(""),
        Some(Value::String(s)) => Cow::Borrowed(s.as_str()),
        Some(other) => Cow::Owned(other.to_string()),
    }
}

/// Write `rows` to `path` with the given delimiter, using `header` as both
/// the header line and the cell order. Returns the number of data rows
/// written.
pub fn write_delimited(path: &Path, delimiter: u8, header: &[String], rows: &[Row]) -> Result<u64> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| {
            SyncError::source(format!("failed to create output file {}: {e}", path.display()))
        })?;

    writer
        .write_record(header)
        .map_err(|e| SyncError::source(format!("failed to write header: {e}")))?;

    let mut count = 0u64;
    for row in rows {
        let record: Vec<Cow<'_, str>> = header
            .iter()
            .map(|column| render_cell(row.get(column.as_str())))
            .collect();
        writer
            .write_record(record.iter().map(|c| c.as_ref()))
            .map_err(|e| SyncError::source(format!("failed to write row: {e}")))?;
        count += 1;
    }

    writer
        .flush()
        .map_err(|e| SyncError::source(format!("failed to flush output file: {e}")))?;

    tracing::debug!("Wrote {count} rows to {}", path.display());
    Ok(count)
}
