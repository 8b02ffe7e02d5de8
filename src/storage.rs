//! On-disk artifacts: the raw snapshot dump and the run report.
//!
//! Both are pretty-printed JSON written for operator inspection; nothing in
//! the pipeline reads them back.

use crate::etl::RawSnapshot;
use crate::report::RunReport;
use eyre::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Write the raw extraction snapshot as pretty JSON.
///
/// # Errors
/// Returns an error if serialization or the file write fails.
pub fn write_snapshot(path: impl AsRef<Path>, snapshot: &RawSnapshot) -> Result<()> {
    write_json(path.as_ref(), snapshot)
}

/// Write the run report as pretty JSON.
///
/// # Errors
/// Returns an error if serialization or the file write fails.
pub fn write_report(path: impl AsRef<Path>, report: &RunReport) -> Result<()> {
    write_json(path.as_ref(), report)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
    fs::write(path, format!("{}\n", json))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
