//! Delimited file reading.
//!
//! [`RowStream`] turns a byte source into a lazy, single-pass sequence of
//! [`Row`] values. The header is read eagerly so callers can inspect column
//! names before pulling the first data row; everything after that is decoded
//! one record at a time, so files of any size are read in flat memory.
//!
//! Parsing is deliberately lenient: rows with fewer fields than the header
//! pad the missing trailing cells with empty strings, and extra fields are
//! dropped. A stream is not restartable; open a fresh one to read again.

use crate::error::{Result, SyncError};
use crate::types::{Column, Row};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// A lazy stream of rows from a delimited source.
pub struct RowStream {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<Box<dyn Read + Send>>,
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl RowStream {
    /// Open a delimited file from the local filesystem.
    pub fn open(path: &Path, delimiter: u8) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            SyncError::source(format!("failed to open file {}: {e}", path.display()))
        })?;
        Self::from_reader(Box::new(BufReader::new(file)), delimiter)
    }

    /// Wrap an arbitrary byte source.
    pub fn from_reader(input: Box<dyn Read + Send>, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(input);

        let headers = reader
            .headers()
            .map_err(|e| SyncError::source(format!("failed to read header row: {e}")))?
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<String>>();

        tracing::debug!("Delimited header: {headers:?}");

        Ok(RowStream {
            headers,
            records: reader.into_records(),
        })
    }

    /// Column names from the header row, in file order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Header columns as catalog-style columns, all typed as `String`.
    pub fn columns(&self) -> Vec<Column> {
        self.headers.iter().map(Column::string).collect()
    }
}

impl Iterator for RowStream {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => {
                return Some(Err(SyncError::source(format!(
                    "failed to read delimited record: {e}"
                ))))
            }
        };

        let mut row = Row::new();
        for (i, header) in self.headers.iter().enumerate() {
            let value = record.get(i).unwrap_or("");
            row.insert(header.clone(), Value::String(value.to_string()));
        }
        Some(Ok(row))
    }
}

/// Read up to `limit` rows for a preview, capped at 100.
///
/// When `columns` is non-empty, each previewed row keeps only the requested
/// columns; names not present in the file are simply omitted from the row
/// rather than treated as an error.
pub fn preview(path: &Path, delimiter: u8, columns: &[String], limit: usize) -> Result<Vec<Row>> {
    let limit = limit.min(crate::query::PREVIEW_LIMIT);
    let stream = RowStream::open(path, delimiter)?;

    let mut rows = Vec::new();
    for row in stream.take(limit) {
        let row = row?;
        if columns.is_empty() {
            rows.push(row);
        } else {
            let mut filtered = Row::new();
            for col in columns {
                if let Some(value) = row.get(col.as_str()) {
                    filtered.insert(col.clone(), value.clone());
                }
            }
            rows.push(filtered);
        }
    }
    Ok(rows)
}

/// Count data rows in a delimited file (header excluded).
pub fn row_count(path: &Path, delimiter: u8) -> Result<u64> {
    let stream = RowStream::open(path, delimiter)?;
    let mut count = 0u64;
    for row in stream {
        row?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_header_and_row_count() {
        let file = temp_csv("id,name\n1,Alice\n2,Bob\n3,Carol\n");
        let stream = RowStream::open(file.path(), b',').unwrap();
        assert_eq!(stream.headers(), &["id", "name"]);

        let rows: Vec<Row> = stream.map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get("id").unwrap(), "1");
        assert_eq!(rows[2].get("name").unwrap(), "Carol");
    }

    #[test]
    fn test_every_row_keyed_by_header() {
        let file = temp_csv("a;b;c\n1;2;3\n4;5;6\n");
        let stream = RowStream::open(file.path(), b';').unwrap();
        for row in stream {
            let row = row.unwrap();
            assert!(row.contains_key("a"));
            assert!(row.contains_key("b"));
            assert!(row.contains_key("c"));
        }
    }

    #[test]
    fn test_short_rows_pad_with_empty_cells() {
        let file = temp_csv("id,name,city\n1,Alice\n2\n");
        let stream = RowStream::open(file.path(), b',').unwrap();
        let rows: Vec<Row> = stream.map(|r| r.unwrap()).collect();
        assert_eq!(rows[0].get("city").unwrap(), "");
        assert_eq!(rows[1].get("name").unwrap(), "");
        assert_eq!(rows[1].get("id").unwrap(), "2");
    }

    #[test]
    fn test_extra_fields_are_dropped() {
        let file = temp_csv("id,name\n1,Alice,unexpected\n");
        let stream = RowStream::open(file.path(), b',').unwrap();
        let rows: Vec<Row> = stream.map(|r| r.unwrap()).collect();
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn test_missing_file_is_source_unavailable() {
        let err = RowStream::open(Path::new("/nonexistent/data.csv"), b',').unwrap_err();
        assert!(matches!(err, SyncError::SourceUnavailable { .. }));
    }

    #[test]
    fn test_preview_limit_and_column_filter() {
        let file = temp_csv("id,name\n1,Alice\n2,Bob\n3,Carol\n");
        let rows = preview(file.path(), b',', &["name".to_string()], 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[1].get("name").unwrap(), "Bob");
    }

    #[test]
    fn test_preview_omits_unknown_columns() {
        let file = temp_csv("id,name\n1,Alice\n");
        let columns = vec!["id".to_string(), "missing".to_string()];
        let rows = preview(file.path(), b',', &columns, 10).unwrap();
        assert_eq!(rows[0].len(), 1);
        assert!(rows[0].get("missing").is_none());
    }

    #[test]
    fn test_preview_caps_limit_at_100() {
        let mut contents = String::from("id\n");
        for i in 0..200 {
            contents.push_str(&format!("{i}\n"));
        }
        let file = temp_csv(&contents);
        let rows = preview(file.path(), b',', &[], 500).unwrap();
        assert_eq!(rows.len(), 100);
    }

    #[test]
    fn test_row_count() {
        let file = temp_csv("id\n1\n2\n3\n4\n");
        assert_eq!(row_count(file.path(), b',').unwrap(), 4);
    }
}
