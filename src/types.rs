//! Core data types for flatfile-sync.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single record: column name to raw cell value.
///
/// Rows travel on the wire as JSON objects (one per line, JSONEachRow), so
/// the in-memory representation is a JSON map. File-sourced cells are always
/// strings; store-sourced cells carry whatever JSON scalar the store reports.
/// Column order is tracked separately by whichever stage needs it.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A column as reported by the store catalog or inferred from a file header.
///
/// File-sourced columns always carry the generic `String` type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

impl Column {
    /// A column with the generic string type, as used for all file-sourced
    /// columns and for created tables.
    pub fn string(name: impl AsRef<str>) -> Self {
        Column {
            name: name.as_ref().to_string(),
            column_type: "String".to_string(),
        }
    }
}

/// Outcome of a file-to-store run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferResult {
    pub records_processed: u64,
    /// Column names dropped because they are not valid identifiers.
    pub ignored_columns: Vec<String>,
}

/// Outcome of a store-to-file run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportResult {
    pub records_processed: u64,
    pub output_file: PathBuf,
}

/// Configuration for a multi-table join export.
///
/// `join_conditions[i]` joins `tables[i + 1]` to the preceding accumulated
/// table set, so there must be exactly `tables.len() - 1` conditions.
/// Column names without a table qualifier belong to `tables[0]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinConfig {
    pub tables: Vec<String>,
    pub columns: Vec<String>,
    pub join_conditions: Vec<String>,
}

/// Lifecycle of a single pipeline run. `Completed` and `Failed` are terminal;
/// a failed run is never retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}
