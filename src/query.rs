//! Read-side query composition.
//!
//! Builds the SELECT statements sent to the store, in two modes: a plain
//! column projection from one table, or a multi-table join driven by a
//! [`JoinConfig`]. The store's query language has no parameterized
//! identifiers, so every dynamic table or column name is validated against
//! the identifier pattern before it is interpolated into query text; a name
//! that fails validation is rejected as `InvalidParameters` rather than
//! passed through.

use crate::error::{Result, SyncError};
use crate::schema::is_valid_identifier;
use crate::types::JoinConfig;

/// Row cap applied to preview queries.
pub const PREVIEW_LIMIT: usize = 100;

/// A composed read query: the statement text plus the output header and the
/// primary table, which store implementations that do not parse SQL (such as
/// the in-memory test store) use to answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub text: String,
    pub table: String,
    pub header: Vec<String>,
    pub limit: Option<usize>,
}

fn validated(name: &str, what: &str) -> Result<String> {
    if is_valid_identifier(name) {
        Ok(name.trim().to_string())
    } else {
        Err(SyncError::InvalidParameters(format!(
            "{what} {name:?} is not a valid identifier"
        )))
    }
}

/// Split an optionally table-qualified column name into its qualifier and
/// bare column name.
fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.trim().split_once('.') {
        Some((table, column)) => (Some(table), column),
        None => (None, name.trim()),
    }
}

/// Build a `SELECT <columns> FROM <table>` projection, with an optional row
/// cap for previews.
pub fn build_projection(table: &str, columns: &[String], limit: Option<usize>) -> Result<SelectQuery> {
    if columns.is_empty() {
        return Err(SyncError::EmptyProjection);
    }
    let table = validated(table, "table")?;
    let header = columns
        .iter()
        .map(|c| validated(c, "column"))
        .collect::<Result<Vec<String>>>()?;

    let mut text = format!("SELECT {} FROM {}", header.join(", "), table);
    if let Some(limit) = limit {
        text.push_str(&format!(" LIMIT {limit}"));
    }

    Ok(SelectQuery {
        text,
        table,
        header,
        limit,
    })
}

/// Build a join query from a [`JoinConfig`].
///
/// Unqualified column names are assumed to belong to the first table. Each
/// selected column is aliased to its bare name, which is also what appears
/// in the output header.
pub fn build_join(config: &JoinConfig) -> Result<SelectQuery> {
    if config.tables.is_empty() {
        return Err(SyncError::InvalidParameters(
            "join requires at least one table".to_string(),
        ));
    }
    if config.columns.is_empty() {
        return Err(SyncError::EmptyProjection);
    }
    if config.join_conditions.len() != config.tables.len() - 1 {
        return Err(SyncError::InvalidParameters(format!(
            "join over {} tables requires {} join conditions, got {}",
            config.tables.len(),
            config.tables.len() - 1,
            config.join_conditions.len()
        )));
    }

    let tables = config
        .tables
        .iter()
        .map(|t| validated(t, "table"))
        .collect::<Result<Vec<String>>>()?;

    let mut select_items = Vec::with_capacity(config.columns.len());
    let mut header = Vec::with_capacity(config.columns.len());
    for column in &config.columns {
        let (qualifier, bare) = split_qualified(column);
        let qualifier = match qualifier {
            Some(q) => validated(q, "table qualifier")?,
            None => tables[0].clone(),
        };
        let bare = validated(bare, "column")?;
        select_items.push(format!("{qualifier}.{bare} AS {bare}"));
        header.push(bare);
    }

    let mut text = format!("SELECT {} FROM {}", select_items.join(", "), tables[0]);
    for (table, condition) in tables[1..].iter().zip(&config.join_conditions) {
        let condition = validated_join_condition(condition)?;
        text.push_str(&format!(" JOIN {table} ON {condition}"));
    }

    Ok(SelectQuery {
        text,
        table: tables[0].clone(),
        header,
        limit: None,
    })
}

/// Validate a join condition of the form `<column> = <column>`, where each
/// side is an optionally table-qualified identifier. Anything else is
/// rejected before it can reach query text.
fn validated_join_condition(condition: &str) -> Result<String> {
    let invalid = || {
        SyncError::InvalidParameters(format!(
            "join condition {condition:?} must be of the form \"table.column = table.column\""
        ))
    };

    let (lhs, rhs) = condition.split_once('=').ok_or_else(invalid)?;
    let mut sides = Vec::with_capacity(2);
    for side in [lhs, rhs] {
        let (qualifier, bare) = split_qualified(side);
        if !is_valid_identifier(bare) || !qualifier.map_or(true, is_valid_identifier) {
            return Err(invalid());
        }
        sides.push(match qualifier {
            Some(q) => format!("{}.{}", q.trim(), bare),
            None => bare.to_string(),
        });
    }
    Ok(format!("{} = {}", sides[0], sides[1]))
}

/// Build the idempotent table-creation statement: every column gets the
/// generic string type and a trivial sort key.
pub fn build_create_table(table: &str, columns: &[String]) -> Result<String> {
    if columns.is_empty() {
        return Err(SyncError::NoValidColumns);
    }
    let table = validated(table, "table")?;
    let column_defs = columns
        .iter()
        .map(|c| validated(c, "column").map(|c| format!("`{c}` String")))
        .collect::<Result<Vec<String>>>()?;

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE = MergeTree() ORDER BY tuple()",
        table,
        column_defs.join(", ")
    ))
}

/// Build the bulk-insert statement prefix for a table.
pub fn build_insert(table: &str) -> Result<String> {
    let table = validated(table, "table")?;
    Ok(format!("INSERT INTO {table} FORMAT JSONEachRow"))
}
