//! Typed canonical rows produced by the mapper and consumed by the loader.
//!
//! Field names are the canonical snake_case column names; serializing a row
//! yields exactly the JSON object the row sink expects.

use super::Kind;
use serde::Serialize;
use serde_json::Value;

/// One row of the `races` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceRow {
    pub session_key: i64,
    pub year: i64,
    pub session_name: String,
    pub country_name: String,
    pub circuit_name: String,
}

/// One row of the `drivers` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverRow {
    pub driver_number: i64,
    pub full_name: String,
    pub team: String,
    pub country_code: String,
    /// Empty string when the source document has no usable headshot URL.
    pub headshot_url: String,
}

/// One row of the `position` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionRow {
    pub session_key: i64,
    pub driver_number: i64,
    pub position: i64,
}

/// One row of the `laps` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapRow {
    pub session_key: i64,
    pub driver_number: i64,
    pub lap_number: i64,
    pub lap_duration: f64,
    pub sector1: f64,
    pub sector2: f64,
    pub sector3: f64,
    pub speed_trap_speed: f64,
    pub is_pit_out_lap: bool,
}

/// One row of the `latest_session` table.
///
/// The end date stays an opaque string; the pipeline moves it without
/// interpreting it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestSessionRow {
    pub session_key: i64,
    pub session_end_date: String,
    pub session_name: String,
}

/// The mapped row sets of one run, ready for loading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSets {
    pub drivers: Vec<DriverRow>,
    pub races: Vec<RaceRow>,
    pub position: Vec<PositionRow>,
    pub laps: Vec<LapRow>,
    pub latest_session: Vec<LatestSessionRow>,
}

impl RowSets {
    /// Total mapped rows across all kinds.
    pub fn total_rows(&self) -> usize {
        self.drivers.len()
            + self.races.len()
            + self.position.len()
            + self.laps.len()
            + self.latest_session.len()
    }

    /// One kind's rows as JSON objects, as the row sink consumes them.
    pub fn rows_for(&self, kind: Kind) -> Vec<Value> {
        match kind {
            Kind::Drivers => to_values(&self.drivers),
            Kind::Races => to_values(&self.races),
            Kind::Position => to_values(&self.position),
            Kind::Laps => to_values(&self.laps),
            Kind::LatestSession => to_values(&self.latest_session),
        }
    }
}

fn to_values<T: Serialize>(rows: &[T]) -> Vec<Value> {
    rows.iter()
        .map(|row| {
            // Rows hold only JSON-safe primitives, so this cannot fail.
            serde_json::to_value(row).unwrap_or(Value::Null)
        })
        .collect()
}
