//! flatfile-sync library
//!
//! A library for moving tabular data between a ClickHouse store and
//! delimited flat files, in both directions.
//!
//! # Features
//!
//! - Streaming import: flat file to store table in bounded batches, with
//!   back-pressure so memory stays flat for files of any size
//! - Export: store table (or multi-table join) to a delimited file
//! - Column selection with permissive validation: invalid column names are
//!   dropped and reported, never fatal
//! - Previews: first rows of a file or a store table before committing
//! - Optional destination-table creation from the file header
//!
//! # Architecture
//!
//! The pipelines in [`ingest`] and [`export`] are the only entry points an
//! external caller needs. They are wired from small stages: [`reader`]
//! (lazy delimited rows), [`schema`] (column validation/reconciliation),
//! [`batch`] (bounded batching), [`query`] (read-query composition), and
//! [`writer`] (delimited output). All store access goes through the
//! [`store::StoreClient`] trait, injected per call; nothing here owns
//! process-wide connection state.
//!
//! # CLI Usage
//!
//! ```bash
//! # Import a CSV file into a table, creating it first
//! flatfile-sync import --file data.csv --table events --create-table
//!
//! # Export two columns of a table with a ';' delimiter
//! flatfile-sync export --table orders --columns id,total \
//!   --output orders.csv --delimiter ";"
//!
//! # Preview a store table before exporting
//! flatfile-sync preview-store --table orders --columns id,total
//! ```

pub mod batch;
pub mod error;
pub mod export;
pub mod ingest;
pub mod query;
pub mod reader;
pub mod schema;
pub mod store;
pub mod testing;
pub mod types;
pub mod writer;

pub use batch::{BatchAccumulator, BATCH_SIZE};
pub use error::{Result, SyncError};
pub use export::{list_columns, list_tables, preview_from_store, ExportConfig, ExportPipeline};
pub use ingest::{ImportConfig, ImportPipeline};
pub use query::{SelectQuery, PREVIEW_LIMIT};
pub use reader::{preview as preview_from_file, row_count, RowStream};
pub use store::{ClickHouseClient, ClickHouseOpts, StoreClient};
pub use types::{Column, ExportResult, JoinConfig, Row, RunState, TransferResult};
