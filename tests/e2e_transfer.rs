//! End-to-end transfer scenarios against the in-memory store.

use flatfile_sync::testing::MemoryStore;
use flatfile_sync::{
    ExportConfig, ExportPipeline, ImportConfig, ImportPipeline, Row, RowStream, RunState,
    StoreClient, SyncError,
};
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::{NamedTempFile, TempDir};
use tokio_util::sync::CancellationToken;

fn temp_csv(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file.flush().unwrap();
    file
}

fn import_config(file: &NamedTempFile, table: &str) -> ImportConfig {
    ImportConfig {
        path: file.path().to_path_buf(),
        target_table: table.to_string(),
        create_table: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_import_csv_with_requested_columns() {
    // Scenario: 3-row CSV, explicit column request, table created.
    let file = temp_csv("id,name\n1,Alice\n2,Bob\n3,Carol\n");
    let store = MemoryStore::new();
    let config = ImportConfig {
        columns: vec!["id".to_string(), "name".to_string()],
        ..import_config(&file, "t")
    };

    let mut pipeline = ImportPipeline::new();
    let result = pipeline
        .run(&store, &config, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.records_processed, 3);
    assert!(result.ignored_columns.is_empty());
    assert_eq!(pipeline.state(), RunState::Completed);

    let columns = store.table_columns("t").unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name"]);
    assert!(columns.iter().all(|c| c.column_type == "String"));

    let rows = store.table_rows("t").unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get("name").unwrap(), "Alice");
}

#[tokio::test]
async fn test_import_ignores_invalid_header_columns() {
    // Scenario: header with a space in one name, no caller-supplied filter.
    let file = temp_csv("id,user name\n1,Alice\n2,Bob\n3,Carol\n");
    let store = MemoryStore::new();
    let config = import_config(&file, "t");

    let result = ImportPipeline::new()
        .run(&store, &config, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.records_processed, 3);
    assert_eq!(result.ignored_columns, vec!["user name"]);

    let columns = store.table_columns("t").unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id"]);

    let rows = store.table_rows("t").unwrap();
    assert!(rows.iter().all(|r| r.len() == 1 && r.contains_key("id")));
}

#[tokio::test]
async fn test_export_large_table_to_file() {
    // Scenario: 10,000-row table exported with a ';' delimiter.
    let store = MemoryStore::new();
    let rows: Vec<Row> = (0..10_000)
        .map(|i| {
            let mut row = Row::new();
            row.insert("id".to_string(), json!(i.to_string()));
            row.insert("total".to_string(), json!(format!("{i}.00")));
            row.insert("extra".to_string(), json!("unused"));
            row
        })
        .collect();
    store.create_table_with_rows("orders", &["id", "total", "extra"], rows);

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("orders.csv");
    let config = ExportConfig {
        table: "orders".to_string(),
        columns: vec!["id".to_string(), "total".to_string()],
        output_path: output.clone(),
        delimiter: b';',
    };

    let mut pipeline = ExportPipeline::new();
    let result = pipeline.run_projection(&store, &config).await.unwrap();
    assert_eq!(result.records_processed, 10_000);
    assert_eq!(pipeline.state(), RunState::Completed);

    let contents = std::fs::read_to_string(&output).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next().unwrap(), "id;total");
    assert_eq!(lines.count(), 10_000);
}

#[tokio::test]
async fn test_round_trip_preserves_rows_and_escaping() {
    // Writing and re-reading with the same delimiter must reproduce the
    // rows exactly, including a cell containing the delimiter itself.
    let store = MemoryStore::new();
    let mut tricky = Row::new();
    tricky.insert("id".to_string(), json!("1"));
    tricky.insert("note".to_string(), json!("semi;colon and \"quote\""));
    let mut plain = Row::new();
    plain.insert("id".to_string(), json!("2"));
    plain.insert("note".to_string(), json!("line\nbreak"));
    store.create_table_with_rows("notes", &["id", "note"], vec![tricky, plain]);

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("notes.csv");
    let config = ExportConfig {
        table: "notes".to_string(),
        columns: vec!["id".to_string(), "note".to_string()],
        output_path: output.clone(),
        delimiter: b';',
    };
    ExportPipeline::new()
        .run_projection(&store, &config)
        .await
        .unwrap();

    let stream = RowStream::open(&output, b';').unwrap();
    assert_eq!(stream.headers(), &["id", "note"]);
    let rows: Vec<Row> = stream.map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("note").unwrap(), "semi;colon and \"quote\"");
    assert_eq!(rows[1].get("note").unwrap(), "line\nbreak");
}

#[tokio::test]
async fn test_ensure_table_is_idempotent() {
    let store = MemoryStore::new();
    let columns = vec!["id".to_string(), "name".to_string()];
    store.ensure_table("t", &columns).await.unwrap();
    let first = store.table_columns("t").unwrap();

    store.ensure_table("t", &columns).await.unwrap();
    let second = store.table_columns("t").unwrap();
    assert_eq!(first, second);
}

/// Store wrapper that cancels the run's token once a number of batches have
/// been committed, simulating a caller aborting mid-import.
struct CancellingStore {
    inner: MemoryStore,
    token: CancellationToken,
    cancel_after: usize,
    inserts: AtomicUsize,
}

#[async_trait::async_trait]
impl StoreClient for CancellingStore {
    async fn ping(&self) -> anyhow::Result<()> {
        self.inner.ping().await
    }

    async fn list_tables(&self) -> anyhow::Result<Vec<String>> {
        self.inner.list_tables().await
    }

    async fn list_columns(&self, table: &str) -> anyhow::Result<Vec<flatfile_sync::Column>> {
        self.inner.list_columns(table).await
    }

    async fn query_rows(
        &self,
        query: &flatfile_sync::SelectQuery,
    ) -> anyhow::Result<Vec<Row>> {
        self.inner.query_rows(query).await
    }

    async fn ensure_table(&self, table: &str, columns: &[String]) -> anyhow::Result<()> {
        self.inner.ensure_table(table, columns).await
    }

    async fn insert_rows(&self, table: &str, rows: &[Row]) -> anyhow::Result<()> {
        self.inner.insert_rows(table, rows).await?;
        if self.inserts.fetch_add(1, Ordering::SeqCst) + 1 == self.cancel_after {
            self.token.cancel();
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_cancellation_stops_after_committed_batches() {
    // 10 rows in batches of 2; the token fires after the second batch
    // commits, so exactly 4 rows land and the run fails as cancelled.
    let mut contents = String::from("id\n");
    for i in 0..10 {
        contents.push_str(&format!("{i}\n"));
    }
    let file = temp_csv(&contents);

    let token = CancellationToken::new();
    let store = CancellingStore {
        inner: MemoryStore::new(),
        token: token.clone(),
        cancel_after: 2,
        inserts: AtomicUsize::new(0),
    };

    let config = ImportConfig {
        path: file.path().to_path_buf(),
        target_table: "t".to_string(),
        create_table: true,
        batch_size: 2,
        ..Default::default()
    };

    let mut pipeline = ImportPipeline::new();
    let err = pipeline.run(&store, &config, token).await.unwrap_err();

    match err {
        SyncError::Cancelled { rows_committed } => assert_eq!(rows_committed, 4),
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert_eq!(pipeline.state(), RunState::Failed);
    assert_eq!(store.inner.table_rows("t").unwrap().len(), 4);
    assert_eq!(store.inserts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_no_valid_columns_fails_before_any_write() {
    let file = temp_csv("user name,1abc\nAlice,x\n");
    let store = MemoryStore::new();
    let config = import_config(&file, "t");

    let err = ImportPipeline::new()
        .run(&store, &config, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NoValidColumns));
    // Table creation never happened.
    assert!(store.table_columns("t").is_none());
}

#[tokio::test]
async fn test_import_without_create_table_hits_write_failure() {
    let file = temp_csv("id\n1\n");
    let store = MemoryStore::new();
    let config = ImportConfig {
        create_table: false,
        path: file.path().to_path_buf(),
        target_table: "absent".to_string(),
        ..Default::default()
    };

    let err = ImportPipeline::new()
        .run(&store, &config, CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        SyncError::WriteFailed { rows_committed, .. } => assert_eq!(rows_committed, 0),
        other => panic!("expected WriteFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_export_join_to_file() {
    let store = MemoryStore::new();
    let rows: Vec<Row> = (1..=3)
        .map(|i| {
            let mut row = Row::new();
            row.insert("id".to_string(), json!(i.to_string()));
            row.insert("name".to_string(), json!(format!("user{i}")));
            row
        })
        .collect();
    store.create_table_with_rows("orders", &["id", "name"], rows);
    store.create_table_with_rows("users", &["id", "name"], vec![]);

    let join = flatfile_sync::JoinConfig {
        tables: vec!["orders".to_string(), "users".to_string()],
        columns: vec!["id".to_string(), "orders.name".to_string()],
        join_conditions: vec!["orders.user_id = users.id".to_string()],
    };

    let dir = TempDir::new().unwrap();
    let output: PathBuf = dir.path().join("join.csv");
    let result = ExportPipeline::new()
        .run_join(&store, &join, &output, b',')
        .await
        .unwrap();
    assert_eq!(result.records_processed, 3);

    let contents = std::fs::read_to_string(&output).unwrap();
    assert!(contents.starts_with("id,name\n"));
}
