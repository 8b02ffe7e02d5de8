//! Schema mapping from raw documents to canonical rows.
//!
//! Each record kind has one mapping function holding the full field
//! contract for that kind: source field names, snake_case renames, strict
//! coercions, and the single documented default (`headshotUrl`). Coercion
//! never guesses: a required field that is missing or of the wrong shape
//! fails the whole document, and [`transform_snapshot`] turns that failure
//! into a [`MappingError`] while the sibling documents keep mapping.

use crate::error::{Expected, MappingError};
use crate::etl::extract::RawSnapshot;
use crate::report::CollectionReport;
use crate::schema::{DriverRow, Kind, LapRow, LatestSessionRow, PositionRow, RaceRow, RowSets};
use serde_json::Value;
use std::collections::BTreeMap;

/// A required field that was missing or failed strict coercion, before the
/// document's identity is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldFault {
    pub field: &'static str,
    pub expected: Expected,
}

/// Map one `races` document.
///
/// # Errors
/// Returns the first required field that is missing or uncoercible.
pub fn map_race(doc: &Value) -> Result<RaceRow, FieldFault> {
    Ok(RaceRow {
        session_key: require_i64(doc, "_id")?,
        year: require_i64(doc, "year")?,
        session_name: require_text(doc, "sessionName")?,
        country_name: require_text(doc, "countryName")?,
        circuit_name: require_text(doc, "circuitName")?,
    })
}

/// Map one `drivers` document.
///
/// `headshotUrl` is the only optional field in the whole schema; it
/// defaults to the empty string when absent or not a string.
///
/// # Errors
/// Returns the first required field that is missing or uncoercible.
pub fn map_driver(doc: &Value) -> Result<DriverRow, FieldFault> {
    Ok(DriverRow {
        driver_number: require_i64(doc, "driverNumber")?,
        full_name: require_text(doc, "_id")?,
        team: require_text(doc, "team")?,
        country_code: require_text(doc, "countryCode")?,
        headshot_url: text_or_empty(doc, "headshotUrl"),
    })
}

/// Map one `position` document.
///
/// # Errors
/// Returns the first required field that is missing or uncoercible.
pub fn map_position(doc: &Value) -> Result<PositionRow, FieldFault> {
    Ok(PositionRow {
        session_key: require_i64(doc, "sessionKey")?,
        driver_number: require_i64(doc, "driverNumber")?,
        position: require_i64(doc, "position")?,
    })
}

/// Map one `laps` document.
///
/// # Errors
/// Returns the first required field that is missing or uncoercible.
pub fn map_lap(doc: &Value) -> Result<LapRow, FieldFault> {
    Ok(LapRow {
        session_key: require_i64(doc, "sessionKey")?,
        driver_number: require_i64(doc, "driverNumber")?,
        lap_number: require_i64(doc, "lapNumber")?,
        lap_duration: require_f64(doc, "lapDuration")?,
        sector1: require_f64(doc, "sector1")?,
        sector2: require_f64(doc, "sector2")?,
        sector3: require_f64(doc, "sector3")?,
        speed_trap_speed: require_f64(doc, "speedTrapSpeed")?,
        is_pit_out_lap: require_bool(doc, "isPitOutLap")?,
    })
}

/// Map one `latest_session` document.
///
/// The end date is moved verbatim as text; the pipeline never parses it.
///
/// # Errors
/// Returns the first required field that is missing or uncoercible.
pub fn map_latest_session(doc: &Value) -> Result<LatestSessionRow, FieldFault> {
    Ok(LatestSessionRow {
        session_key: require_i64(doc, "sessionKey")?,
        session_end_date: require_text(doc, "sessionEndDate")?,
        session_name: require_text(doc, "sessionName")?,
    })
}

/// Map one full extraction snapshot into row sets plus per-kind reports.
///
/// Every document is attempted; a document that fails to map is dropped,
/// logged, and recorded in its collection's report without touching its
/// siblings. Fields outside a kind's contract are ignored.
pub fn transform_snapshot(snapshot: &RawSnapshot) -> (RowSets, BTreeMap<Kind, CollectionReport>) {
    let mut rows = RowSets::default();
    let mut reports = BTreeMap::new();

    for kind in Kind::ALL {
        let docs = snapshot.documents(kind);
        let mut report = match kind {
            Kind::Drivers => {
                let (mapped, report) = map_all(kind, docs, map_driver);
                rows.drivers = mapped;
                report
            }
            Kind::Races => {
                let (mapped, report) = map_all(kind, docs, map_race);
                rows.races = mapped;
                report
            }
            Kind::Position => {
                let (mapped, report) = map_all(kind, docs, map_position);
                rows.position = mapped;
                report
            }
            Kind::Laps => {
                let (mapped, report) = map_all(kind, docs, map_lap);
                rows.laps = mapped;
                report
            }
            Kind::LatestSession => {
                let (mapped, report) = map_all(kind, docs, map_latest_session);
                rows.latest_session = mapped;
                report
            }
        };
        report.fetch_error = snapshot.fetch_error(kind).cloned();
        log::debug!(
            "Mapped '{}': {} read, {} mapped, {} dropped",
            kind,
            report.read,
            report.mapped,
            report.dropped
        );
        reports.insert(kind, report);
    }

    (rows, reports)
}

/// Map every document of one collection, isolating per-document failures.
fn map_all<T>(
    kind: Kind,
    docs: &[Value],
    map_one: impl Fn(&Value) -> Result<T, FieldFault>,
) -> (Vec<T>, CollectionReport) {
    let mut rows = Vec::with_capacity(docs.len());
    let mut errors = Vec::new();

    for (index, doc) in docs.iter().enumerate() {
        match map_one(doc) {
            Ok(row) => rows.push(row),
            Err(fault) => {
                let error = MappingError {
                    kind,
                    document: document_identity(doc, index),
                    field: fault.field,
                    expected: fault.expected,
                };
                log::warn!("Dropping {error}");
                errors.push(error);
            }
        }
    }

    let report = CollectionReport {
        read: docs.len(),
        mapped: rows.len(),
        dropped: errors.len(),
        errors,
        fetch_error: None,
    };
    (rows, report)
}

/// Identity a dropped document is reported under: its `_id` when present,
/// otherwise its index within the collection.
fn document_identity(doc: &Value, index: usize) -> String {
    match doc.get("_id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => format!("#{index}"),
    }
}

fn require_i64(doc: &Value, field: &'static str) -> Result<i64, FieldFault> {
    match doc.get(field) {
        Some(Value::Number(n)) => coerce_i64(n).ok_or(FieldFault {
            field,
            expected: Expected::Integer,
        }),
        _ => Err(FieldFault {
            field,
            expected: Expected::Integer,
        }),
    }
}

/// An i64, or a float with no fractional part within i64 range. No string
/// parsing, no truncation.
fn coerce_i64(n: &serde_json::Number) -> Option<i64> {
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive;
    // -2^63 is exactly representable and stays inclusive.
    n.as_f64()
        .filter(|f| f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f))
        .map(|f| f as i64)
}

fn require_f64(doc: &Value, field: &'static str) -> Result<f64, FieldFault> {
    match doc.get(field) {
        // JSON numbers always widen losslessly enough for telemetry floats
        Some(Value::Number(n)) => n.as_f64().ok_or(FieldFault {
            field,
            expected: Expected::Float,
        }),
        _ => Err(FieldFault {
            field,
            expected: Expected::Float,
        }),
    }
}

fn require_bool(doc: &Value, field: &'static str) -> Result<bool, FieldFault> {
    match doc.get(field) {
        Some(Value::Bool(b)) => Ok(*b),
        _ => Err(FieldFault {
            field,
            expected: Expected::Boolean,
        }),
    }
}

fn require_text(doc: &Value, field: &'static str) -> Result<String, FieldFault> {
    match doc.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(FieldFault {
            field,
            expected: Expected::Text,
        }),
    }
}

fn text_or_empty(doc: &Value, field: &str) -> String {
    match doc.get(field) {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}
