//! Test support utilities.
//!
//! [`MemoryStore`] is an in-memory [`StoreClient`] used by unit and
//! end-to-end tests so pipeline behavior can be exercised without a live
//! server. It answers composed queries from the query's table/header/limit
//! metadata rather than parsing SQL, and can be told to start rejecting
//! inserts after a number of successful batches to simulate mid-stream
//! write failures.

use crate::query::SelectQuery;
use crate::store::StoreClient;
use crate::types::{Column, Row};
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Default, Clone)]
struct TableData {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

#[derive(Default)]
struct MemoryState {
    tables: BTreeMap<String, TableData>,
    fail_after_batches: Option<usize>,
    batches_inserted: usize,
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Seed a table with string-typed columns and initial rows.
    pub fn create_table_with_rows(&self, name: &str, columns: &[&str], rows: Vec<Row>) {
        let mut state = self.state.lock().unwrap();
        state.tables.insert(
            name.to_string(),
            TableData {
                columns: columns.iter().map(Column::string).collect(),
                rows,
            },
        );
    }

    /// Reject every insert after `batches` successful ones.
    pub fn fail_after_batches(&self, batches: usize) {
        self.state.lock().unwrap().fail_after_batches = Some(batches);
    }

    /// Rows currently stored in a table.
    pub fn table_rows(&self, name: &str) -> Option<Vec<Row>> {
        let state = self.state.lock().unwrap();
        state.tables.get(name).map(|t| t.rows.clone())
    }

    /// Columns of a table, if it exists.
    pub fn table_columns(&self, name: &str) -> Option<Vec<Column>> {
        let state = self.state.lock().unwrap();
        state.tables.get(name).map(|t| t.columns.clone())
    }

    /// Number of insert batches accepted so far.
    pub fn batches_inserted(&self) -> usize {
        self.state.lock().unwrap().batches_inserted
    }
}

#[async_trait::async_trait]
impl StoreClient for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.tables.keys().cloned().collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<Column>> {
        let state = self.state.lock().unwrap();
        // A missing table has an empty catalog, as in the real store.
        Ok(state
            .tables
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    async fn query_rows(&self, query: &SelectQuery) -> Result<Vec<Row>> {
        let state = self.state.lock().unwrap();
        let table = state
            .tables
            .get(&query.table)
            .ok_or_else(|| anyhow::anyhow!("no such table: {}", query.table))?;

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(table
            .rows
            .iter()
            .take(limit)
            .map(|row| {
                let mut projected = Row::new();
                for column in &query.header {
                    if let Some(value) = row.get(column.as_str()) {
                        projected.insert(column.clone(), value.clone());
                    }
                }
                projected
            })
            .collect())
    }

    async fn ensure_table(&self, table: &str, columns: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .tables
            .entry(table.to_string())
            .or_insert_with(|| TableData {
                columns: columns.iter().map(Column::string).collect(),
                rows: vec![],
            });
        Ok(())
    }

    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(limit) = state.fail_after_batches {
            if state.batches_inserted >= limit {
                anyhow::bail!("injected write failure after {limit} batches");
            }
        }
        let data = state
            .tables
            .get_mut(table)
            .ok_or_else(|| anyhow::anyhow!("no such table: {table}"))?;
        data.rows.extend(rows.iter().cloned());
        state.batches_inserted += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::build_projection;
    use serde_json::json;

    fn row(id: &str) -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), json!(id));
        row
    }

    #[tokio::test]
    async fn test_query_projects_and_limits() {
        let store = MemoryStore::new();
        store.create_table_with_rows("t", &["id", "x"], vec![row("1"), row("2"), row("3")]);

        let query = build_projection("t", &["id".to_string()], Some(2)).unwrap();
        let rows = store.query_rows(&query).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id").unwrap(), "1");
    }

    #[tokio::test]
    async fn test_insert_into_missing_table_fails() {
        let store = MemoryStore::new();
        let err = store.insert_rows("absent", &[row("1")]).await.unwrap_err();
        assert!(err.to_string().contains("no such table"));
    }

    #[tokio::test]
    async fn test_fail_after_batches() {
        let store = MemoryStore::new();
        store
            .ensure_table("t", &["id".to_string()])
            .await
            .unwrap();
        store.fail_after_batches(1);
        store.insert_rows("t", &[row("1")]).await.unwrap();
        assert!(store.insert_rows("t", &[row("2")]).await.is_err());
        assert_eq!(store.batches_inserted(), 1);
    }
}
