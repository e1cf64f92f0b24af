//! Column name validation and reconciliation.
//!
//! Column names coming from file headers or caller requests are untrusted
//! text. Before a name reaches a CREATE TABLE or INSERT statement it must be
//! a structurally valid identifier: a letter or underscore followed by
//! letters, digits, or underscores. Names that fail the check are never
//! fatal; they are dropped and reported back as ignored columns.

use crate::error::{Result, SyncError};

/// Returns true if `name`, after trimming surrounding whitespace, is a valid
/// identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    let name = name.trim();
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The effective column set for a run, plus the discovered names that were
/// dropped for failing identifier validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    pub effective: Vec<String>,
    pub ignored: Vec<String>,
}

/// Reconcile the caller's requested column subset against the columns
/// discovered in the source.
///
/// An empty `requested` means "all discovered columns". Invalid names are
/// filtered out of both lists; discovered names that fail validation are
/// accumulated into `ignored` for reporting. Fails with [`SyncError::NoValidColumns`]
/// when nothing survives.
pub fn reconcile(requested: &[String], discovered: &[String]) -> Result<ColumnPlan> {
    let ignored: Vec<String> = discovered
        .iter()
        .filter(|name| !is_valid_identifier(name))
        .cloned()
        .collect();

    let effective: Vec<String> = if requested.is_empty() {
        discovered
            .iter()
            .filter(|name| is_valid_identifier(name))
            .map(|name| name.trim().to_string())
            .collect()
    } else {
        requested
            .iter()
            .filter(|name| is_valid_identifier(name))
            .map(|name| name.trim().to_string())
            .collect()
    };

    if effective.is_empty() {
        return Err(SyncError::NoValidColumns);
    }

    if !ignored.is_empty() {
        tracing::warn!("Ignoring invalid column names: {ignored:?}");
    }

    Ok(ColumnPlan { effective, ignored })
}
