//! File-to-store import pipeline.
//!
//! Streams a delimited file into a store table in bounded batches. The CSV
//! decode loop runs on a blocking thread and hands batches to the async side
//! through a channel of depth one, so the reader suspends while the previous
//! batch's write is in flight and memory stays flat regardless of file size.
//! Batches are committed strictly in read order.
//!
//! A run moves `idle -> running -> {completed, failed}`. Failed runs are
//! never retried automatically; the error carries the rows committed before
//! the failure.

use crate::batch::{BatchAccumulator, BATCH_SIZE};
use crate::error::{Result, SyncError};
use crate::reader::RowStream;
use crate::schema::{self, is_valid_identifier};
use crate::store::StoreClient;
use crate::types::{Row, RunState, TransferResult};
use serde_json::Value;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Configuration for one file-to-store run.
#[derive(Clone)]
pub struct ImportConfig {
    /// Source file path.
    pub path: PathBuf,

    /// Single-byte field delimiter.
    pub delimiter: u8,

    /// Requested column subset; empty means all valid file columns.
    pub columns: Vec<String>,

    /// Destination table name.
    pub target_table: String,

    /// Create the destination table from the file header before writing.
    pub create_table: bool,

    /// Rows per store insert.
    pub batch_size: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            path: PathBuf::new(),
            delimiter: b',',
            columns: vec![],
            target_table: String::new(),
            create_table: false,
            batch_size: BATCH_SIZE,
        }
    }
}

/// One file-to-store run. Create a fresh pipeline per run; a finished
/// pipeline stays in its terminal state.
pub struct ImportPipeline {
    state: RunState,
}

impl ImportPipeline {
    pub fn new() -> Self {
        ImportPipeline {
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run the import. Cancelling `cancel` stops the reader, drops any
    /// uncommitted batches, and fails the run with [`SyncError::Cancelled`].
    pub async fn run(
        &mut self,
        store: &dyn StoreClient,
        config: &ImportConfig,
        cancel: CancellationToken,
    ) -> Result<TransferResult> {
        let result = self.execute(store, config, cancel).await;
        self.state = match result {
            Ok(_) => RunState::Completed,
            Err(_) => RunState::Failed,
        };
        result
    }

    async fn execute(
        &mut self,
        store: &dyn StoreClient,
        config: &ImportConfig,
        cancel: CancellationToken,
    ) -> Result<TransferResult> {
        if config.path.as_os_str().is_empty() {
            return Err(SyncError::InvalidParameters(
                "source file path is required".to_string(),
            ));
        }
        if config.target_table.trim().is_empty() {
            return Err(SyncError::InvalidParameters(
                "target table is required".to_string(),
            ));
        }
        if !is_valid_identifier(&config.target_table) {
            return Err(SyncError::InvalidParameters(format!(
                "target table {:?} is not a valid identifier",
                config.target_table
            )));
        }
        if config.batch_size == 0 {
            return Err(SyncError::InvalidParameters(
                "batch size must be positive".to_string(),
            ));
        }

        let mut stream = RowStream::open(&config.path, config.delimiter)?;
        let discovered = stream.headers().to_vec();
        let plan = schema::reconcile(&config.columns, &discovered)?;

        self.state = RunState::Running;
        tracing::info!(
            "Importing {} into table {} (columns: {:?})",
            config.path.display(),
            config.target_table,
            plan.effective
        );

        if config.create_table {
            // The created table carries every valid file column, not just
            // the requested subset.
            let table_columns: Vec<String> = discovered
                .iter()
                .filter(|name| is_valid_identifier(name))
                .map(|name| name.trim().to_string())
                .collect();
            store
                .ensure_table(&config.target_table, &table_columns)
                .await
                .map_err(|e| SyncError::WriteFailed {
                    rows_committed: 0,
                    message: format!("{e:#}"),
                })?;
        }

        // Depth-one queue: the reader blocks on send until the previous
        // batch's write settles.
        let (tx, mut rx) = mpsc::channel::<Vec<Row>>(1);
        let effective = plan.effective.clone();
        let batch_size = config.batch_size;
        let reader_cancel = cancel.clone();

        let reader = tokio::task::spawn_blocking(move || -> Result<()> {
            let mut accumulator = BatchAccumulator::new(batch_size);
            for row in &mut stream {
                if reader_cancel.is_cancelled() {
                    return Ok(());
                }
                let row = row?;
                let mut projected = Row::new();
                for column in &effective {
                    let cell = row
                        .get(column.as_str())
                        .cloned()
                        .unwrap_or_else(|| Value::String(String::new()));
                    projected.insert(column.clone(), cell);
                }
                if let Some(batch) = accumulator.push(projected) {
                    if tx.blocking_send(batch).is_err() {
                        // Consumer dropped the channel after a failure.
                        return Ok(());
                    }
                }
            }
            if let Some(batch) = accumulator.flush() {
                let _ = tx.blocking_send(batch);
            }
            Ok(())
        });

        let mut total = 0u64;
        let outcome: Result<()> = loop {
            if cancel.is_cancelled() {
                break Err(SyncError::Cancelled {
                    rows_committed: total,
                });
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    break Err(SyncError::Cancelled { rows_committed: total });
                }
                received = rx.recv() => match received {
                    Some(batch) => {
                        let rows = batch.len() as u64;
                        if let Err(e) = store.insert_rows(&config.target_table, &batch).await {
                            break Err(SyncError::WriteFailed {
                                rows_committed: total,
                                message: format!("{e:#}"),
                            });
                        }
                        total += rows;
                        tracing::debug!("Committed batch of {rows} rows ({total} total)");
                    }
                    None => break Ok(()),
                },
            }
        };

        match outcome {
            Ok(()) => {
                match reader.await {
                    Ok(Ok(())) => {}
                    Ok(Err(SyncError::SourceUnavailable { message, .. })) => {
                        return Err(SyncError::SourceUnavailable {
                            message,
                            rows_committed: total,
                        });
                    }
                    Ok(Err(e)) => return Err(e),
                    Err(e) => {
                        return Err(SyncError::SourceUnavailable {
                            message: format!("reader task failed: {e}"),
                            rows_committed: total,
                        })
                    }
                }
                if cancel.is_cancelled() {
                    return Err(SyncError::Cancelled {
                        rows_committed: total,
                    });
                }
                tracing::info!(
                    "Import complete: {total} rows into {}",
                    config.target_table
                );
                Ok(TransferResult {
                    records_processed: total,
                    ignored_columns: plan.ignored,
                })
            }
            Err(e) => {
                // Dropping the receiver unblocks a reader stuck on send.
                drop(rx);
                let _ = reader.await;
                Err(e)
            }
        }
    }
}

impl Default for ImportPipeline {
    fn default() -> Self {
        Self::new()
    }
}
