//! Store-to-file export pipeline, previews, and catalog passthrough.
//!
//! The export direction composes a read query, materializes the result set
//! through the store client, and serializes it to a delimited file. Joins
//! follow the same path with the query built from a [`JoinConfig`].

use crate::error::{Result, SyncError};
use crate::query::{self, PREVIEW_LIMIT};
use crate::store::StoreClient;
use crate::types::{Column, ExportResult, JoinConfig, Row, RunState};
use crate::writer;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Configuration for one store-to-file run.
#[derive(Clone)]
pub struct ExportConfig {
    /// Source table name.
    pub table: String,

    /// Columns to export; must be non-empty.
    pub columns: Vec<String>,

    /// Destination file path.
    pub output_path: PathBuf,

    /// Single-byte field delimiter for the output file.
    pub delimiter: u8,
}

/// One store-to-file run, projection or join mode.
pub struct ExportPipeline {
    state: RunState,
}

impl ExportPipeline {
    pub fn new() -> Self {
        ExportPipeline {
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Export a single-table column projection, full table, no row cap.
    pub async fn run_projection(
        &mut self,
        store: &dyn StoreClient,
        config: &ExportConfig,
    ) -> Result<ExportResult> {
        let query = match query::build_projection(&config.table, &config.columns, None) {
            Ok(query) => query,
            Err(e) => {
                self.state = RunState::Failed;
                return Err(e);
            }
        };
        self.finish(store, query, &config.output_path, config.delimiter)
            .await
    }

    /// Export a multi-table join described by `join`.
    pub async fn run_join(
        &mut self,
        store: &dyn StoreClient,
        join: &JoinConfig,
        output_path: &Path,
        delimiter: u8,
    ) -> Result<ExportResult> {
        let query = match query::build_join(join) {
            Ok(query) => query,
            Err(e) => {
                self.state = RunState::Failed;
                return Err(e);
            }
        };
        self.finish(store, query, output_path, delimiter).await
    }

    async fn finish(
        &mut self,
        store: &dyn StoreClient,
        query: query::SelectQuery,
        output_path: &Path,
        delimiter: u8,
    ) -> Result<ExportResult> {
        self.state = RunState::Running;
        tracing::info!("Exporting query to {}", output_path.display());

        let result = async {
            let rows = store
                .query_rows(&query)
                .await
                .map_err(|e| SyncError::source(format!("store query failed: {e:#}")))?;
            let count = writer::write_delimited(output_path, delimiter, &query.header, &rows)?;
            tracing::info!("Export complete: {count} rows to {}", output_path.display());
            Ok(ExportResult {
                records_processed: count,
                output_file: output_path.to_path_buf(),
            })
        }
        .await;

        self.state = match result {
            Ok(_) => RunState::Completed,
            Err(_) => RunState::Failed,
        };
        result
    }
}

impl Default for ExportPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// List table names in the store's configured database.
pub async fn list_tables(store: &dyn StoreClient) -> Result<Vec<String>> {
    store
        .list_tables()
        .await
        .map_err(|e| SyncError::source(format!("failed to list tables: {e:#}")))
}

/// List a table's columns with their store-reported types.
pub async fn list_columns(store: &dyn StoreClient, table: &str) -> Result<Vec<Column>> {
    if !crate::schema::is_valid_identifier(table) {
        return Err(SyncError::InvalidParameters(format!(
            "table {table:?} is not a valid identifier"
        )));
    }
    store
        .list_columns(table)
        .await
        .map_err(|e| SyncError::source(format!("failed to list columns: {e:#}")))
}

/// Preview up to `limit` rows (capped at 100) of a store table.
///
/// Requested columns are cross-checked against the table's catalog metadata
/// and unknown names are silently dropped; an empty request means all catalog
/// columns. Fails with [`SyncError::NoValidColumns`] when nothing survives
/// the cross-check.
pub async fn preview_from_store(
    store: &dyn StoreClient,
    table: &str,
    columns: &[String],
    limit: usize,
) -> Result<Vec<Row>> {
    let catalog = list_columns(store, table).await?;
    let actual: HashSet<&str> = catalog.iter().map(|c| c.name.as_str()).collect();

    let effective: Vec<String> = if columns.is_empty() {
        catalog.iter().map(|c| c.name.clone()).collect()
    } else {
        columns
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| actual.contains(c.as_str()))
            .collect()
    };
    if effective.is_empty() {
        return Err(SyncError::NoValidColumns);
    }

    let query = query::build_projection(table, &effective, Some(limit.min(PREVIEW_LIMIT)))?;
    store
        .query_rows(&query)
        .await
        .map_err(|e| SyncError::source(format!("store query failed: {e:#}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use serde_json::json;

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table_with_rows(
            "orders",
            &["id", "total"],
            (1..=5)
                .map(|i| {
                    let mut row = Row::new();
                    row.insert("id".to_string(), json!(i.to_string()));
                    row.insert("total".to_string(), json!("9.99"));
                    row
                })
                .collect(),
        );
        store
    }

    #[tokio::test]
    async fn test_preview_cross_checks_catalog() {
        let store = seeded_store();
        let columns = vec!["id".to_string(), "ghost".to_string()];
        let rows = preview_from_store(&store, "orders", &columns, 10).await.unwrap();
        assert_eq!(rows.len(), 5);
        // "ghost" was dropped by the catalog cross-check.
        assert!(rows[0].get("ghost").is_none());
        assert!(rows[0].get("id").is_some());
    }

    #[tokio::test]
    async fn test_preview_all_unknown_columns_fails() {
        let store = seeded_store();
        let columns = vec!["ghost".to_string()];
        let err = preview_from_store(&store, "orders", &columns, 10)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NoValidColumns));
    }

    #[tokio::test]
    async fn test_preview_empty_request_uses_catalog() {
        let store = seeded_store();
        let rows = preview_from_store(&store, "orders", &[], 3).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].get("total").is_some());
    }

    #[tokio::test]
    async fn test_export_rejects_empty_projection() {
        let store = seeded_store();
        let mut pipeline = ExportPipeline::new();
        let config = ExportConfig {
            table: "orders".to_string(),
            columns: vec![],
            output_path: PathBuf::from("/tmp/out.csv"),
            delimiter: b',',
        };
        let err = pipeline.run_projection(&store, &config).await.unwrap_err();
        assert!(matches!(err, SyncError::EmptyProjection));
        assert_eq!(pipeline.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn test_list_columns_validates_table_name() {
        let store = seeded_store();
        let err = list_columns(&store, "orders; DROP TABLE x").await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidParameters(_)));
    }
}
