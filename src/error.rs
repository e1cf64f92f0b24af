//! Error types for flatfile-sync.
//!
//! Every failure a pipeline run can surface maps to one [`SyncError`]
//! variant. Validation errors (`InvalidParameters`, `NoValidColumns`,
//! `EmptyProjection`) are raised before any stream is opened; mid-stream
//! failures carry the number of rows already committed so callers can
//! report partial progress.

use thiserror::Error;

/// Convenience alias used throughout the core modules.
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The flat file or the store could not be reached or read.
    #[error("source unavailable: {message}")]
    SourceUnavailable { message: String, rows_committed: u64 },

    /// A required parameter is missing or malformed; detected before any I/O.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// The effective column set is empty after validation and reconciliation.
    #[error("no valid columns remain after validation")]
    NoValidColumns,

    /// A projection was requested with an empty column list.
    #[error("projection requires at least one column")]
    EmptyProjection,

    /// The store rejected a batch insert. Prior batches stay committed.
    #[error("store write failed: {message}")]
    WriteFailed { rows_committed: u64, message: String },

    /// The caller cancelled the run mid-stream.
    #[error("run cancelled")]
    Cancelled { rows_committed: u64 },
}

impl SyncError {
    /// Build a `SourceUnavailable` with no committed rows yet.
    pub fn source(message: impl Into<String>) -> Self {
        SyncError::SourceUnavailable {
            message: message.into(),
            rows_committed: 0,
        }
    }

    /// Rows committed to the store before the failure, where that is
    /// meaningful for the variant. Validation errors never commit rows.
    pub fn rows_committed(&self) -> Option<u64> {
        match self {
            SyncError::SourceUnavailable { rows_committed, .. }
            | SyncError::WriteFailed { rows_committed, .. }
            | SyncError::Cancelled { rows_committed } => Some(*rows_committed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_human_readable() {
        let err = SyncError::source("file not found: data.csv");
        assert_eq!(err.to_string(), "source unavailable: file not found: data.csv");

        let err = SyncError::InvalidParameters("target table is required".into());
        assert_eq!(err.to_string(), "invalid parameters: target table is required");

        assert_eq!(
            SyncError::NoValidColumns.to_string(),
            "no valid columns remain after validation"
        );
    }

    #[test]
    fn test_rows_committed_accessor() {
        assert_eq!(SyncError::NoValidColumns.rows_committed(), None);
        assert_eq!(SyncError::EmptyProjection.rows_committed(), None);
        assert_eq!(
            SyncError::Cancelled { rows_committed: 42 }.rows_committed(),
            Some(42)
        );
        assert_eq!(
            SyncError::WriteFailed {
                rows_committed: 2000,
                message: "connection reset".into()
            }
            .rows_committed(),
            Some(2000)
        );
        assert_eq!(SyncError::source("gone").rows_committed(), Some(0));
    }
}
