//! Canonical schema shared by the mapper and the loader.
//!
//! [`Kind`] names the five record kinds the pipeline moves, [`TableSpec`]
//! pins each target table's column order and conflict key, and the row
//! structs in [`rows`] carry the mapped values. The upsert builder and the
//! mapper both derive their column lists from here, so the two cannot drift
//! apart.

mod rows;

pub use rows::{DriverRow, LapRow, LatestSessionRow, PositionRow, RaceRow, RowSets};

use serde::Serialize;

/// The five record kinds moved by the pipeline, in extraction order.
///
/// Each kind names one source collection in the document store and one
/// target table in the relational store; the two share a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Drivers,
    Races,
    Position,
    Laps,
    LatestSession,
}

impl Kind {
    /// All kinds in extraction order; reports keep the same order.
    pub const ALL: [Kind; 5] = [
        Kind::Drivers,
        Kind::Races,
        Kind::Position,
        Kind::Laps,
        Kind::LatestSession,
    ];

    /// Source collection name in the document store.
    pub fn collection(self) -> &'static str {
        match self {
            Kind::Drivers => "drivers",
            Kind::Races => "races",
            Kind::Position => "position",
            Kind::Laps => "laps",
            Kind::LatestSession => "latest_session",
        }
    }

    /// Target table name in the relational store.
    pub fn table(self) -> &'static str {
        self.collection()
    }

    /// Column contract of the target table.
    pub fn spec(self) -> &'static TableSpec {
        match self {
            Kind::Drivers => &DRIVERS,
            Kind::Races => &RACES,
            Kind::Position => &POSITION,
            Kind::Laps => &LAPS,
            Kind::LatestSession => &LATEST_SESSION,
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.collection())
    }
}

/// Column contract for one target table: the canonical columns in insert
/// order plus the natural-key columns used as the upsert conflict target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub conflict_keys: &'static [&'static str],
}

impl TableSpec {
    /// Columns overwritten on conflict (everything that is not a key).
    pub fn value_columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .copied()
            .filter(|column| !self.conflict_keys.contains(column))
    }
}

static DRIVERS: TableSpec = TableSpec {
    table: "drivers",
    columns: &[
        "driver_number",
        "full_name",
        "team",
        "country_code",
        "headshot_url",
    ],
    conflict_keys: &["driver_number"],
};

static RACES: TableSpec = TableSpec {
    table: "races",
    columns: &[
        "session_key",
        "year",
        "session_name",
        "country_name",
        "circuit_name",
    ],
    conflict_keys: &["session_key"],
};

static POSITION: TableSpec = TableSpec {
    table: "position",
    columns: &["session_key", "driver_number", "position"],
    conflict_keys: &["session_key", "driver_number"],
};

static LAPS: TableSpec = TableSpec {
    table: "laps",
    columns: &[
        "session_key",
        "driver_number",
        "lap_number",
        "lap_duration",
        "sector1",
        "sector2",
        "sector3",
        "speed_trap_speed",
        "is_pit_out_lap",
    ],
    conflict_keys: &["session_key", "driver_number", "lap_number"],
};

static LATEST_SESSION: TableSpec = TableSpec {
    table: "latest_session",
    columns: &["session_key", "session_end_date", "session_name"],
    conflict_keys: &["session_key"],
};
