//! Command-line interface for flatfile-sync
//!
//! # Usage Examples
//!
//! ## Import
//! ```bash
//! # Import a CSV file into a new table
//! flatfile-sync import \
//!   --file uploads/users.csv \
//!   --table users \
//!   --create-table
//!
//! # Import a subset of columns from a ';'-delimited file
//! flatfile-sync import \
//!   --file export.txt --delimiter ";" \
//!   --columns id,name \
//!   --table users
//! ```
//!
//! ## Export
//! ```bash
//! # Export a table to CSV
//! flatfile-sync export --table orders --columns id,total --output orders.csv
//!
//! # Export a two-table join
//! flatfile-sync export-join \
//!   --tables orders,users \
//!   --columns orders.id,users.name \
//!   --on "orders.user_id = users.id" \
//!   --output report.csv
//! ```
//!
//! Connection parameters default from the `CLICKHOUSE_ENDPOINT`,
//! `CLICKHOUSE_DATABASE`, `CLICKHOUSE_USERNAME`, and `CLICKHOUSE_PASSWORD`
//! environment variables.

use anyhow::Context;
use clap::{Parser, Subcommand};
use flatfile_sync::{
    export, reader, ClickHouseClient, ClickHouseOpts, ExportConfig, ExportPipeline, ImportConfig,
    ImportPipeline, JoinConfig, StoreClient, BATCH_SIZE, PREVIEW_LIMIT,
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "flatfile-sync")]
#[command(about = "Move tabular data between ClickHouse and delimited flat files")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check connectivity to the store
    Check {
        #[command(flatten)]
        store: ClickHouseOpts,
    },

    /// List tables in the configured database
    Tables {
        #[command(flatten)]
        store: ClickHouseOpts,
    },

    /// List columns of a store table
    Columns {
        #[command(flatten)]
        store: ClickHouseOpts,

        /// Table to describe
        #[arg(long)]
        table: String,
    },

    /// Preview the first rows of a store table
    PreviewStore {
        #[command(flatten)]
        store: ClickHouseOpts,

        /// Table to preview
        #[arg(long)]
        table: String,

        /// Columns to preview (comma-separated, default: all)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Maximum rows to show (capped at 100)
        #[arg(long, default_value_t = PREVIEW_LIMIT)]
        limit: usize,
    },

    /// List columns of a delimited file
    FileColumns {
        /// Source file path
        #[arg(long)]
        file: PathBuf,

        /// Field delimiter
        #[arg(long, default_value = ",")]
        delimiter: char,
    },

    /// Preview the first rows of a delimited file
    PreviewFile {
        /// Source file path
        #[arg(long)]
        file: PathBuf,

        /// Field delimiter
        #[arg(long, default_value = ",")]
        delimiter: char,

        /// Columns to preview (comma-separated, default: all)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Maximum rows to show (capped at 100)
        #[arg(long, default_value_t = PREVIEW_LIMIT)]
        limit: usize,
    },

    /// Count data rows in a delimited file
    Count {
        /// Source file path
        #[arg(long)]
        file: PathBuf,

        /// Field delimiter
        #[arg(long, default_value = ",")]
        delimiter: char,
    },

    /// Import a delimited file into a store table
    Import {
        #[command(flatten)]
        store: ClickHouseOpts,

        /// Source file path
        #[arg(long)]
        file: PathBuf,

        /// Field delimiter
        #[arg(long, default_value = ",")]
        delimiter: char,

        /// Columns to import (comma-separated, default: all valid file columns)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Destination table
        #[arg(long)]
        table: String,

        /// Create the destination table from the file header
        #[arg(long)]
        create_table: bool,

        /// Rows per insert batch
        #[arg(long, default_value_t = BATCH_SIZE)]
        batch_size: usize,
    },

    /// Export a store table to a delimited file
    Export {
        #[command(flatten)]
        store: ClickHouseOpts,

        /// Source table
        #[arg(long)]
        table: String,

        /// Columns to export (comma-separated)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Destination file path
        #[arg(long)]
        output: PathBuf,

        /// Field delimiter for the output file
        #[arg(long, default_value = ",")]
        delimiter: char,
    },

    /// Export a multi-table join to a delimited file
    ExportJoin {
        #[command(flatten)]
        store: ClickHouseOpts,

        /// Tables to join, first table is the join root (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tables: Vec<String>,

        /// Columns to select; unqualified names belong to the first table
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,

        /// Join conditions, one per joined table, e.g. "orders.user_id = users.id"
        #[arg(long = "on", value_name = "CONDITION")]
        join_conditions: Vec<String>,

        /// Destination file path
        #[arg(long)]
        output: PathBuf,

        /// Field delimiter for the output file
        #[arg(long, default_value = ",")]
        delimiter: char,
    },
}

fn parse_delimiter(delimiter: char) -> anyhow::Result<u8> {
    if delimiter.is_ascii() {
        Ok(delimiter as u8)
    } else {
        anyhow::bail!("delimiter must be a single ASCII character, got {delimiter:?}")
    }
}

/// Cancellation token wired to Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            signal_token.cancel();
        }
    });
    token
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { store } => {
            let client = ClickHouseClient::new(&store);
            client.ping().await.context("connection check failed")?;
            println!("Successfully connected to {}", store.endpoint);
        }

        Commands::Tables { store } => {
            let client = ClickHouseClient::new(&store);
            for table in export::list_tables(&client).await? {
                println!("{table}");
            }
        }

        Commands::Columns { store, table } => {
            let client = ClickHouseClient::new(&store);
            for column in export::list_columns(&client, &table).await? {
                println!("{}\t{}", column.name, column.column_type);
            }
        }

        Commands::PreviewStore {
            store,
            table,
            columns,
            limit,
        } => {
            let client = ClickHouseClient::new(&store);
            let rows = export::preview_from_store(&client, &table, &columns, limit).await?;
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
        }

        Commands::FileColumns { file, delimiter } => {
            let delimiter = parse_delimiter(delimiter)?;
            let stream = flatfile_sync::RowStream::open(&file, delimiter)?;
            for column in stream.columns() {
                println!("{}\t{}", column.name, column.column_type);
            }
        }

        Commands::PreviewFile {
            file,
            delimiter,
            columns,
            limit,
        } => {
            let delimiter = parse_delimiter(delimiter)?;
            let rows = reader::preview(&file, delimiter, &columns, limit)?;
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
        }

        Commands::Count { file, delimiter } => {
            let delimiter = parse_delimiter(delimiter)?;
            println!("{}", reader::row_count(&file, delimiter)?);
        }

        Commands::Import {
            store,
            file,
            delimiter,
            columns,
            table,
            create_table,
            batch_size,
        } => {
            let client = ClickHouseClient::new(&store);
            let config = ImportConfig {
                path: file,
                delimiter: parse_delimiter(delimiter)?,
                columns,
                target_table: table,
                create_table,
                batch_size,
            };
            let cancel = cancel_on_ctrl_c();
            let result = ImportPipeline::new().run(&client, &config, cancel).await?;
            if !result.ignored_columns.is_empty() {
                tracing::warn!("Ignored invalid columns: {:?}", result.ignored_columns);
            }
            println!(
                "Imported {} rows into {}",
                result.records_processed, config.target_table
            );
        }

        Commands::Export {
            store,
            table,
            columns,
            output,
            delimiter,
        } => {
            let client = ClickHouseClient::new(&store);
            let config = ExportConfig {
                table,
                columns,
                output_path: output,
                delimiter: parse_delimiter(delimiter)?,
            };
            let result = ExportPipeline::new().run_projection(&client, &config).await?;
            println!(
                "Exported {} rows to {}",
                result.records_processed,
                result.output_file.display()
            );
        }

        Commands::ExportJoin {
            store,
            tables,
            columns,
            join_conditions,
            output,
            delimiter,
        } => {
            let client = ClickHouseClient::new(&store);
            let join = JoinConfig {
                tables,
                columns,
                join_conditions,
            };
            let delimiter = parse_delimiter(delimiter)?;
            let result = ExportPipeline::new()
                .run_join(&client, &join, &output, delimiter)
                .await?;
            println!(
                "Exported {} rows to {}",
                result.records_processed,
                result.output_file.display()
            );
        }
    }

    Ok(())
}
