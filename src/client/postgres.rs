//! PostgreSQL row sink.
//!
//! Connections come from a deadpool pool; upserts are single multi-row
//! `INSERT ... ON CONFLICT DO UPDATE` statements built by [`build_upsert`],
//! so one table is always written by one atomic request.

use crate::etl::RowSink;
use crate::schema::TableSpec;
use eyre::{bail, eyre, Context, Result};
use serde_json::Value;
use std::time::Duration;

/// Connection settings for the relational store.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Key-value (`host=... user=...`) or URI (`postgresql://...`)
    /// connection string.
    pub connection_string: String,
    /// Maximum pooled connections. Tables are loaded sequentially, so a
    /// small pool is plenty.
    pub max_pool_size: usize,
    /// Per-statement timeout in seconds.
    pub query_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            connection_string: String::new(),
            max_pool_size: 4,
            query_timeout_secs: 30,
        }
    }
}

/// Pooled client for the relational store.
#[derive(Clone, Debug)]
pub struct PostgresClient {
    pool: deadpool_postgres::Pool,
    query_timeout: Duration,
}

impl PostgresClient {
    /// Parse the connection string and build the pool.
    ///
    /// Connectivity is not verified here; that happens on
    /// [`test_connection`](Self::test_connection) or the first statement.
    ///
    /// # Errors
    /// Returns an error when the connection string does not parse or the
    /// pool cannot be built.
    pub fn try_new(config: PostgresConfig) -> Result<Self> {
        let pg_config: tokio_postgres::Config = config
            .connection_string
            .parse()
            .context("Invalid PostgreSQL connection string")?;

        let mgr_config = deadpool_postgres::ManagerConfig {
            recycling_method: deadpool_postgres::RecyclingMethod::Fast,
        };
        let mgr =
            deadpool_postgres::Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
        let pool = deadpool_postgres::Pool::builder(mgr)
            .max_size(config.max_pool_size)
            .build()
            .map_err(|e| eyre!("Failed to build connection pool: {}", e))?;

        Ok(Self {
            pool,
            query_timeout: Duration::from_secs(config.query_timeout_secs),
        })
    }

    /// `SELECT 1` connectivity check.
    ///
    /// # Errors
    /// Returns an error when no connection can be pulled from the pool or
    /// the probe statement fails or times out.
    pub async fn test_connection(&self) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| eyre!("Failed to get connection from pool: {}", e))?;
        tokio::time::timeout(self.query_timeout, client.query_one("SELECT 1", &[]))
            .await
            .map_err(|_| eyre!("Connection check timed out after {:?}", self.query_timeout))?
            .context("Connection check failed")?;
        Ok(())
    }

    /// Execute one statement, returning the number of rows affected.
    async fn execute(&self, sql: &str) -> Result<u64> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| eyre!("Failed to get connection from pool: {}", e))?;
        let affected = tokio::time::timeout(self.query_timeout, client.execute(sql, &[]))
            .await
            .map_err(|_| eyre!("Statement timed out after {:?}", self.query_timeout))?
            .context("Statement failed")?;
        Ok(affected)
    }
}

impl RowSink for PostgresClient {
    async fn ping(&self) -> Result<()> {
        self.test_connection().await
    }

    async fn upsert(&self, spec: &TableSpec, rows: &[Value]) -> Result<u64> {
        let sql = build_upsert(spec, rows)?;
        log::trace!("{}", sql);
        self.execute(&sql)
            .await
            .with_context(|| format!("Upsert into '{}' failed", spec.table))
    }
}

/// Build one idempotent multi-row upsert statement for `spec`.
///
/// Inserts on absence; on conflict with the natural key, overwrites every
/// non-key column from the incoming row. Rows must be JSON objects carrying
/// every column of the table, which the loader guarantees.
///
/// # Errors
/// Returns an error when `rows` is empty, a row is not an object, or a
/// column is absent from a row.
pub fn build_upsert(spec: &TableSpec, rows: &[Value]) -> Result<String> {
    if rows.is_empty() {
        bail!("No rows to upsert into '{}'", spec.table);
    }

    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        let object = row
            .as_object()
            .ok_or_else(|| eyre!("Row for '{}' is not a JSON object", spec.table))?;
        let mut literals = Vec::with_capacity(spec.columns.len());
        for column in spec.columns {
            let value = object
                .get(*column)
                .ok_or_else(|| eyre!("Row for '{}' is missing column '{}'", spec.table, column))?;
            literals.push(sql_literal(value)?);
        }
        tuples.push(format!("({})", literals.join(", ")));
    }

    let assignments: Vec<String> = spec
        .value_columns()
        .map(|column| format!("{} = EXCLUDED.{}", column, column))
        .collect();

    let sql = if assignments.is_empty() {
        format!(
            "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) DO NOTHING",
            spec.table,
            spec.columns.join(", "),
            tuples.join(", "),
            spec.conflict_keys.join(", "),
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) DO UPDATE SET {}",
            spec.table,
            spec.columns.join(", "),
            tuples.join(", "),
            spec.conflict_keys.join(", "),
            assignments.join(", "),
        )
    };
    Ok(sql)
}

/// Render one canonical value as a SQL literal. Strings get single quotes
/// doubled; canonical rows never carry nested values.
fn sql_literal(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(true) => Ok("TRUE".to_string()),
        Value::Bool(false) => Ok("FALSE".to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        Value::Array(_) | Value::Object(_) => {
            bail!("Nested values cannot be rendered as SQL literals")
        }
    }
}
