//! Row loading into the relational store.

use crate::error::{ConnectionError, UpsertError};
use crate::report::LoadResult;
use crate::schema::{Kind, RowSets, TableSpec};
use eyre::Result;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Write side of the relational store.
///
/// Implemented by [`PostgresClient`](crate::client::PostgresClient) and by
/// the in-memory sinks the tests use.
pub trait RowSink: Send + Sync {
    /// Verify the store is reachable. Called once at the start of a run.
    ///
    /// # Errors
    /// Returns an error if the store cannot be reached; the run treats this
    /// as fatal.
    fn ping(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Upsert `rows` into the table described by `spec` as one atomic
    /// request: insert on absence, fully overwrite non-key columns on
    /// conflict. Returns the number of rows affected.
    ///
    /// # Errors
    /// Returns an error if the upsert fails; the run marks the table failed
    /// and continues.
    fn upsert(
        &self,
        spec: &TableSpec,
        rows: &[Value],
    ) -> impl std::future::Future<Output = Result<u64>> + Send;
}

/// Loads mapped row sets into a [`RowSink`], one upsert per table.
pub struct Loader<S> {
    sink: S,
}

impl<S: RowSink> Loader<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Verify the relational store connection.
    ///
    /// # Errors
    /// Returns a fatal [`ConnectionError`] when the store is unreachable.
    pub async fn ping(&self) -> Result<(), ConnectionError> {
        self.sink.ping().await.map_err(|e| ConnectionError {
            store: "relational store",
            message: format!("{e:#}"),
        })
    }

    /// Upsert every table's row set.
    ///
    /// A failure on one table never prevents the others from being
    /// attempted; each table gets its own [`LoadResult`]. Empty row sets
    /// skip the request entirely and count as loaded with zero rows.
    pub async fn load(&self, rows: &RowSets) -> BTreeMap<Kind, LoadResult> {
        let mut results = BTreeMap::new();

        for kind in Kind::ALL {
            let spec = kind.spec();
            let table_rows = collapse_conflicts(spec, rows.rows_for(kind));
            let result = if table_rows.is_empty() {
                log::debug!("No rows for table '{}', skipping upsert", spec.table);
                LoadResult::Loaded { rows_affected: 0 }
            } else {
                match self.sink.upsert(spec, &table_rows).await {
                    Ok(rows_affected) => {
                        log::info!("Upserted {} row(s) into '{}'", rows_affected, spec.table);
                        LoadResult::Loaded { rows_affected }
                    }
                    Err(e) => {
                        let error = UpsertError {
                            table: spec.table,
                            message: format!("{e:#}"),
                        };
                        log::warn!("{error}; continuing with the remaining tables");
                        LoadResult::Failed { error }
                    }
                }
            };
            results.insert(kind, result);
        }

        results
    }
}

/// Collapse rows sharing a conflict key down to the last occurrence.
///
/// A single multi-row `ON CONFLICT DO UPDATE` statement cannot touch the
/// same row twice; keeping the last occurrence matches what sequential
/// upserts of the duplicates would have left behind.
fn collapse_conflicts(spec: &TableSpec, rows: Vec<Value>) -> Vec<Value> {
    let total = rows.len();
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(total);
    let mut collapsed: Vec<Value> = Vec::with_capacity(total);

    for row in rows {
        let key = conflict_key_of(spec, &row);
        match seen.get(&key) {
            Some(&slot) => collapsed[slot] = row,
            None => {
                seen.insert(key, collapsed.len());
                collapsed.push(row);
            }
        }
    }

    if collapsed.len() < total {
        log::debug!(
            "Collapsed {} duplicate-key row(s) for '{}'",
            total - collapsed.len(),
            spec.table
        );
    }
    collapsed
}

fn conflict_key_of(spec: &TableSpec, row: &Value) -> String {
    let parts: Vec<String> = spec
        .conflict_keys
        .iter()
        .map(|key| row.get(*key).map(Value::to_string).unwrap_or_default())
        .collect();
    parts.join("\u{1f}")
}
