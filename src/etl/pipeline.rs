//! Pipeline orchestration for one sync run.
//!
//! [`Pipeline::run`] drives the stages in order and always hands back a
//! [`RunReport`]: recoverable failures are accumulated, never thrown. The
//! only divergence from the forward path is a store connection failure,
//! which parks the run in [`Stage::Failed`] before any data moves.

use super::extract::{DocumentSource, Extractor};
use super::load::{Loader, RowSink};
use super::transform::transform_snapshot;
use crate::report::RunReport;
use crate::storage;
use serde::Serialize;
use std::path::PathBuf;

/// States of the run state machine, in forward order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Extracting,
    Transforming,
    Loading,
    Done,
    Failed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Extracting => "extracting",
            Stage::Transforming => "transforming",
            Stage::Loading => "loading",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Orchestrates one run from a document source into a row sink.
///
/// # Type Parameters
/// - `S`: the document source snapshots are extracted from
/// - `K`: the row sink mapped rows are upserted into
pub struct Pipeline<S, K> {
    extractor: Extractor<S>,
    loader: Loader<K>,
    raw_dump: Option<PathBuf>,
}

impl<S: DocumentSource, K: RowSink> Pipeline<S, K> {
    pub fn new(source: S, sink: K) -> Self {
        Self {
            extractor: Extractor::new(source),
            loader: Loader::new(sink),
            raw_dump: None,
        }
    }

    /// Also write the extracted snapshot to `path` before transforming.
    ///
    /// Inspection aid only; a dump failure is logged and does not affect
    /// the run.
    pub fn with_raw_dump(mut self, path: impl Into<PathBuf>) -> Self {
        self.raw_dump = Some(path.into());
        self
    }

    /// Run the pipeline once: attempt everything, report exhaustively.
    ///
    /// Steps:
    /// 1. Ping both stores; either failing is fatal
    /// 2. Extract whole-collection snapshots
    /// 3. Transform documents into canonical rows
    /// 4. Load each table with one idempotent upsert
    ///
    /// Never returns an error; the report's `overall` status says how much
    /// of the run succeeded.
    pub async fn run(&self) -> RunReport {
        let mut stage = Stage::Idle;
        log::info!("Starting telemetry sync run");

        // Both stores are held for the whole run; either one being
        // unreachable is fatal before any data moves.
        stage = advance(stage, Stage::Extracting);
        if let Err(error) = self.loader.ping().await {
            log::error!("{error}");
            advance(stage, Stage::Failed);
            return RunReport::fatal(error);
        }
        let snapshot = match self.extractor.extract().await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                log::error!("{error}");
                advance(stage, Stage::Failed);
                return RunReport::fatal(error);
            }
        };

        if let Some(path) = &self.raw_dump {
            match storage::write_snapshot(path, &snapshot) {
                Ok(()) => log::info!("Raw snapshot written to {}", path.display()),
                Err(e) => log::warn!("Raw snapshot dump failed: {e:#}"),
            }
        }

        stage = advance(stage, Stage::Transforming);
        let (rows, per_collection) = transform_snapshot(&snapshot);
        // Raw documents are read once per run and not kept around.
        drop(snapshot);
        log::info!("Mapped {} row(s) across {} kinds", rows.total_rows(), per_collection.len());

        stage = advance(stage, Stage::Loading);
        let per_table = self.loader.load(&rows).await;

        advance(stage, Stage::Done);
        let report = RunReport::completed(per_collection, per_table);
        log::info!(
            "Run complete: {} ({} tables loaded, {} failed)",
            report.overall,
            report.tables_loaded(),
            report.tables_failed()
        );
        report
    }
}

fn advance(from: Stage, to: Stage) -> Stage {
    log::debug!("Stage {from} -> {to}");
    to
}
