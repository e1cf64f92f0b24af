//! Store access: the `StoreClient` trait and its ClickHouse implementation.
//!
//! The pipeline never constructs its own connection; callers build a client
//! once and pass it into each operation. The trait keeps the orchestrator
//! independent of the wire protocol, which also lets tests run against the
//! in-memory store in [`crate::testing`].

use crate::query::{self, SelectQuery};
use crate::types::{Column, Row};
use anyhow::{Context, Result};
use clap::Parser;

/// Connection parameters for the ClickHouse HTTP interface.
#[derive(Parser, Clone, Debug)]
pub struct ClickHouseOpts {
    /// ClickHouse HTTP endpoint URL
    #[arg(
        long,
        default_value = "http://localhost:8123",
        env = "CLICKHOUSE_ENDPOINT"
    )]
    pub endpoint: String,

    /// Database to operate in
    #[arg(long, default_value = "default", env = "CLICKHOUSE_DATABASE")]
    pub database: String,

    /// ClickHouse username
    #[arg(long, default_value = "default", env = "CLICKHOUSE_USERNAME")]
    pub username: String,

    /// ClickHouse password or JWT token
    #[arg(long, default_value = "", env = "CLICKHOUSE_PASSWORD")]
    pub password: String,
}

/// Operations the pipeline needs from the destination/source store.
///
/// `insert_rows` must be atomic at batch granularity: one call either
/// commits the whole batch or fails without reporting partial success.
#[async_trait::async_trait]
pub trait StoreClient: Send + Sync {
    /// Cheap connectivity check.
    async fn ping(&self) -> Result<()>;

    /// List table names in the configured database, sorted by name.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// List columns of a table with their store-reported types, in table
    /// order.
    async fn list_columns(&self, table: &str) -> Result<Vec<Column>>;

    /// Run a composed read query and materialize the result rows.
    async fn query_rows(&self, query: &SelectQuery) -> Result<Vec<Row>>;

    /// Idempotently create a table with every column typed as the generic
    /// string type. Existing tables are left untouched.
    async fn ensure_table(&self, table: &str, columns: &[String]) -> Result<()>;

    /// Bulk-insert a batch of rows into a table.
    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<()>;
}

/// `StoreClient` over the ClickHouse HTTP interface, speaking JSONEachRow in
/// both directions.
pub struct ClickHouseClient {
    http: reqwest::Client,
    opts: ClickHouseOpts,
}

impl ClickHouseClient {
    pub fn new(opts: &ClickHouseOpts) -> Self {
        ClickHouseClient {
            http: reqwest::Client::new(),
            opts: opts.clone(),
        }
    }

    /// POST a statement to the store and return the response body.
    ///
    /// For inserts the statement goes into the `query` URL parameter and the
    /// row payload into the request body; for everything else the statement
    /// is the body. Data values (never identifiers) are bound through
    /// ClickHouse query parameters.
    async fn run(
        &self,
        statement: &str,
        params: &[(&str, &str)],
        payload: Option<String>,
    ) -> Result<String> {
        let mut request = self
            .http
            .post(&self.opts.endpoint)
            .header("X-ClickHouse-User", &self.opts.username)
            .header("X-ClickHouse-Key", &self.opts.password)
            .query(&[("database", self.opts.database.as_str())]);

        for (name, value) in params {
            request = request.query(&[(format!("param_{name}"), value)]);
        }

        request = match payload {
            Some(payload) => request.query(&[("query", statement)]).body(payload),
            None => request.body(statement.to_string()),
        };

        let response = request
            .send()
            .await
            .with_context(|| format!("store request failed: {}", self.opts.endpoint))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("failed to read store response")?;
        if !status.is_success() {
            anyhow::bail!("store returned {status}: {}", body.trim());
        }
        Ok(body)
    }
}

/// Decode a JSONEachRow response body into rows.
pub(crate) fn parse_json_each_row(body: &str) -> Result<Vec<Row>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str::<Row>(line)
                .with_context(|| format!("malformed row in store response: {line}"))
        })
        .collect()
}

#[async_trait::async_trait]
impl StoreClient for ClickHouseClient {
    async fn ping(&self) -> Result<()> {
        let url = format!("{}/ping", self.opts.endpoint.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("store unreachable: {url}"))?;
        if !response.status().is_success() {
            anyhow::bail!("store ping returned {}", response.status());
        }
        Ok(())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let body = self
            .run(
                "SELECT name FROM system.tables WHERE database = {database:String} \
                 ORDER BY name FORMAT JSONEachRow",
                &[("database", self.opts.database.as_str())],
                None,
            )
            .await?;
        Ok(parse_json_each_row(&body)?
            .into_iter()
            .filter_map(|row| row.get("name").and_then(|v| v.as_str()).map(String::from))
            .collect())
    }

    async fn list_columns(&self, table: &str) -> Result<Vec<Column>> {
        let body = self
            .run(
                "SELECT name, type FROM system.columns \
                 WHERE database = {database:String} AND table = {table:String} \
                 ORDER BY position FORMAT JSONEachRow",
                &[
                    ("database", self.opts.database.as_str()),
                    ("table", table),
                ],
                None,
            )
            .await?;
        body.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str::<Column>(line)
                    .with_context(|| format!("malformed column in store response: {line}"))
            })
            .collect()
    }

    async fn query_rows(&self, query: &SelectQuery) -> Result<Vec<Row>> {
        tracing::debug!("Running store query: {}", query.text);
        let body = self
            .run(&format!("{} FORMAT JSONEachRow", query.text), &[], None)
            .await?;
        parse_json_each_row(&body)
    }

    async fn ensure_table(&self, table: &str, columns: &[String]) -> Result<()> {
        let ddl = query::build_create_table(table, columns)?;
        tracing::info!("Ensuring table exists: {table}");
        self.run(&ddl, &[], None).await?;
        Ok(())
    }

    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<()> {
        let statement = query::build_insert(table)?;
        let mut payload = String::new();
        for row in rows {
            payload.push_str(&serde_json::to_string(row).context("failed to encode row")?);
            payload.push('\n');
        }
        self.run(&statement, &[], Some(payload)).await?;
        Ok(())
    }
}
