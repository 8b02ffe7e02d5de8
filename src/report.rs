//! Structured run reporting.
//!
//! The pipeline never throws recoverable failures across stage boundaries;
//! it accumulates them here. Callers read one [`RunReport`] to learn what
//! moved, what was dropped, and whether the run as a whole counts as a
//! success.

use crate::error::{CollectionFetchError, ConnectionError, MappingError, UpsertError};
use crate::etl::Stage;
use crate::schema::Kind;
use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of one table's upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadResult {
    /// The upsert went through; `rows_affected` counts inserts plus
    /// overwrites.
    Loaded { rows_affected: u64 },
    Failed { error: UpsertError },
}

impl LoadResult {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadResult::Loaded { .. })
    }
}

/// Read/mapped/dropped accounting for one collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionReport {
    /// Documents fetched from the source collection.
    pub read: usize,
    /// Documents that mapped to a canonical row.
    pub mapped: usize,
    /// Documents dropped by mapping failures.
    pub dropped: usize,
    pub errors: Vec<MappingError>,
    /// Set when the collection itself could not be fetched; `read` is then
    /// zero and the run carried on without it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<CollectionFetchError>,
}

impl CollectionReport {
    pub fn is_clean(&self) -> bool {
        self.dropped == 0 && self.fetch_error.is_none()
    }
}

/// Overall verdict of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every document mapped and every table loaded.
    Success,
    /// The run completed but dropped documents, skipped a collection, or
    /// failed a table.
    PartialFailure,
    /// A store connection could not be established; nothing was loaded.
    Fatal,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::PartialFailure => write!(f, "partial failure"),
            RunStatus::Fatal => write!(f, "fatal"),
        }
    }
}

/// Everything one pipeline run produced, keyed by record kind.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub overall: RunStatus,
    /// Terminal state of the run: `Done`, or `Failed` for fatal runs.
    pub stage: Stage,
    pub per_collection: BTreeMap<Kind, CollectionReport>,
    pub per_table: BTreeMap<Kind, LoadResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fatal: Option<ConnectionError>,
}

impl RunReport {
    /// Report for a run that could not establish a store connection.
    pub fn fatal(error: ConnectionError) -> Self {
        Self {
            overall: RunStatus::Fatal,
            stage: Stage::Failed,
            per_collection: BTreeMap::new(),
            per_table: BTreeMap::new(),
            fatal: Some(error),
        }
    }

    /// Assemble a completed run's report and derive the overall status.
    pub fn completed(
        per_collection: BTreeMap<Kind, CollectionReport>,
        per_table: BTreeMap<Kind, LoadResult>,
    ) -> Self {
        let clean = per_collection.values().all(CollectionReport::is_clean)
            && per_table.values().all(LoadResult::is_loaded);
        Self {
            overall: if clean {
                RunStatus::Success
            } else {
                RunStatus::PartialFailure
            },
            stage: Stage::Done,
            per_collection,
            per_table,
            fatal: None,
        }
    }

    /// `(read, mapped, dropped)` totals across all collections.
    pub fn document_totals(&self) -> (usize, usize, usize) {
        self.per_collection.values().fold((0, 0, 0), |acc, report| {
            (
                acc.0 + report.read,
                acc.1 + report.mapped,
                acc.2 + report.dropped,
            )
        })
    }

    pub fn tables_loaded(&self) -> usize {
        self.per_table.values().filter(|r| r.is_loaded()).count()
    }

    pub fn tables_failed(&self) -> usize {
        self.per_table.len() - self.tables_loaded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Expected;

    fn clean_collections() -> BTreeMap<Kind, CollectionReport> {
        Kind::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind,
                    CollectionReport {
                        read: 2,
                        mapped: 2,
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    fn loaded_tables() -> BTreeMap<Kind, LoadResult> {
        Kind::ALL
            .into_iter()
            .map(|kind| (kind, LoadResult::Loaded { rows_affected: 2 }))
            .collect()
    }

    #[test]
    fn test_clean_run_is_a_success() {
        let report = RunReport::completed(clean_collections(), loaded_tables());
        assert_eq!(report.overall, RunStatus::Success);
        assert_eq!(report.stage, Stage::Done);
        assert_eq!(report.document_totals(), (10, 10, 0));
        assert_eq!(report.tables_loaded(), 5);
        assert_eq!(report.tables_failed(), 0);
    }

    #[test]
    fn test_dropped_document_degrades_to_partial_failure() {
        let mut collections = clean_collections();
        let drivers = collections.get_mut(&Kind::Drivers).unwrap();
        drivers.mapped = 1;
        drivers.dropped = 1;
        drivers.errors.push(MappingError {
            kind: Kind::Drivers,
            document: "#1".to_string(),
            field: "team",
            expected: Expected::Text,
        });

        let report = RunReport::completed(collections, loaded_tables());
        assert_eq!(report.overall, RunStatus::PartialFailure);
        assert_eq!(report.stage, Stage::Done);
        assert_eq!(report.document_totals(), (10, 9, 1));
    }

    #[test]
    fn test_failed_table_degrades_to_partial_failure() {
        let mut tables = loaded_tables();
        tables.insert(
            Kind::Laps,
            LoadResult::Failed {
                error: UpsertError {
                    table: "laps",
                    message: "connection reset".to_string(),
                },
            },
        );

        let report = RunReport::completed(clean_collections(), tables);
        assert_eq!(report.overall, RunStatus::PartialFailure);
        assert_eq!(report.tables_loaded(), 4);
        assert_eq!(report.tables_failed(), 1);
    }

    #[test]
    fn test_fetch_error_degrades_to_partial_failure() {
        let mut collections = clean_collections();
        let laps = collections.get_mut(&Kind::Laps).unwrap();
        laps.read = 0;
        laps.mapped = 0;
        laps.fetch_error = Some(CollectionFetchError {
            collection: "laps",
            message: "timeout".to_string(),
        });

        let report = RunReport::completed(collections, loaded_tables());
        assert_eq!(report.overall, RunStatus::PartialFailure);
    }

    #[test]
    fn test_fatal_report_carries_the_connection_error() {
        let report = RunReport::fatal(ConnectionError {
            store: "relational store",
            message: "refused".to_string(),
        });
        assert_eq!(report.overall, RunStatus::Fatal);
        assert_eq!(report.stage, Stage::Failed);
        assert!(report.per_collection.is_empty());
        assert!(report.per_table.is_empty());
        assert_eq!(report.fatal.as_ref().unwrap().store, "relational store");
    }

    #[test]
    fn test_report_serializes_with_snake_case_keys() {
        let report = RunReport::completed(clean_collections(), loaded_tables());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["overall"], "success");
        assert_eq!(json["stage"], "done");
        assert_eq!(json["per_collection"]["latest_session"]["read"], 2);
        assert_eq!(json["per_table"]["laps"]["status"], "loaded");
        assert_eq!(json["per_table"]["laps"]["rows_affected"], 2);
        assert!(json.get("fatal").is_none());
    }
}
