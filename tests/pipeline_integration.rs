//! Integration tests for the full sync pipeline
//!
//! The document store and the relational store are both replaced by
//! in-memory fakes; the warehouse fake applies real upsert semantics
//! (insert on absence, full overwrite on conflict) so re-run behavior is
//! exercised end to end.

use eyre::{bail, Result};
use race_telemetry_sync::etl::{DocumentSource, Pipeline, RowSink};
use race_telemetry_sync::report::{LoadResult, RunStatus};
use race_telemetry_sync::schema::{Kind, TableSpec};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct MockStore {
    fail_ping: bool,
    documents: BTreeMap<&'static str, Vec<Value>>,
}

impl MockStore {
    fn with_fixture() -> Self {
        let mut documents = BTreeMap::new();
        documents.insert(
            "drivers",
            vec![
                json!({
                    "_id": "Driver 1",
                    "driverNumber": 1,
                    "team": "Team A",
                    "countryCode": "FR",
                    "headshotUrl": "http://example.com/1.png",
                    "broadcastName": "D. ONE"
                }),
                json!({
                    "_id": "Driver 2",
                    "driverNumber": 2,
                    "team": "Team B",
                    "countryCode": "UK"
                }),
            ],
        );
        documents.insert(
            "races",
            vec![json!({
                "_id": 9606,
                "year": 2024,
                "sessionName": "Race",
                "countryName": "Italy",
                "circuitName": "Monza"
            })],
        );
        documents.insert(
            "position",
            vec![
                json!({ "sessionKey": 9606, "driverNumber": 1, "position": 1 }),
                json!({ "sessionKey": 9606, "driverNumber": 2, "position": 3 }),
            ],
        );
        documents.insert(
            "laps",
            vec![
                json!({
                    "sessionKey": 9606, "driverNumber": 2, "lapNumber": 1,
                    "lapDuration": 85.6, "sector1": 28.1, "sector2": 29.3,
                    "sector3": 28.2, "speedTrapSpeed": 312.0, "isPitOutLap": true
                }),
                json!({
                    "sessionKey": 9606, "driverNumber": 2, "lapNumber": 2,
                    "lapDuration": 83.1, "sector1": 27.5, "sector2": 28.4,
                    "sector3": 27.2, "speedTrapSpeed": 315.5, "isPitOutLap": false
                }),
            ],
        );
        documents.insert(
            "latest_session",
            vec![json!({
                "sessionKey": 9606,
                "sessionEndDate": "2024-09-01T15:00:00+00:00",
                "sessionName": "Race"
            })],
        );
        Self {
            fail_ping: false,
            documents,
        }
    }
}

impl DocumentSource for MockStore {
    async fn ping(&self) -> Result<()> {
        if self.fail_ping {
            bail!("cluster unreachable");
        }
        Ok(())
    }

    async fn fetch_collection(&self, collection: &str) -> Result<Vec<Value>> {
        Ok(self.documents.get(collection).cloned().unwrap_or_default())
    }
}

/// Tables keyed by name, rows keyed by their rendered conflict key.
type Tables = BTreeMap<String, BTreeMap<String, Value>>;

#[derive(Clone)]
struct MockWarehouse {
    tables: Arc<Mutex<Tables>>,
    fail_tables: Vec<&'static str>,
}

impl MockWarehouse {
    fn new() -> Self {
        Self {
            tables: Arc::new(Mutex::new(BTreeMap::new())),
            fail_tables: Vec::new(),
        }
    }

    fn failing(tables: Vec<&'static str>) -> Self {
        Self {
            fail_tables: tables,
            ..Self::new()
        }
    }

    fn snapshot(&self) -> Tables {
        self.tables.lock().unwrap().clone()
    }

    fn row(&self, table: &str, key: &str) -> Option<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .and_then(|rows| rows.get(key))
            .cloned()
    }

    fn plant_row(&self, table: &str, key: &str, row: Value) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), row);
    }
}

fn conflict_key(spec: &TableSpec, row: &Value) -> String {
    spec.conflict_keys
        .iter()
        .map(|key| row[*key].to_string())
        .collect::<Vec<_>>()
        .join("/")
}

impl RowSink for MockWarehouse {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, spec: &TableSpec, rows: &[Value]) -> Result<u64> {
        if self.fail_tables.contains(&spec.table) {
            bail!("relation '{}' is on fire", spec.table);
        }
        let mut tables = self.tables.lock().unwrap();
        let table = tables.entry(spec.table.to_string()).or_default();
        for row in rows {
            for column in spec.columns {
                assert!(
                    row.get(*column).is_some(),
                    "row for '{}' missing column '{}'",
                    spec.table,
                    column
                );
            }
            // Full overwrite on conflict, exactly like the SQL statement.
            table.insert(conflict_key(spec, row), row.clone());
        }
        Ok(rows.len() as u64)
    }
}

#[tokio::test]
async fn test_full_run_mirrors_every_collection() {
    let warehouse = MockWarehouse::new();
    let pipeline = Pipeline::new(MockStore::with_fixture(), warehouse.clone());

    let report = pipeline.run().await;

    assert_eq!(report.overall, RunStatus::Success);
    assert_eq!(report.document_totals(), (8, 8, 0));
    assert_eq!(report.tables_loaded(), 5);

    let tables = warehouse.snapshot();
    assert_eq!(tables["drivers"].len(), 2);
    assert_eq!(tables["races"].len(), 1);
    assert_eq!(tables["position"].len(), 2);
    assert_eq!(tables["laps"].len(), 2);
    assert_eq!(tables["latest_session"].len(), 1);

    // The mapped driver row: renamed fields, defaulted headshot, and the
    // uncontracted broadcastName is gone.
    assert_eq!(
        warehouse.row("drivers", "2").unwrap(),
        json!({
            "driver_number": 2,
            "full_name": "Driver 2",
            "team": "Team B",
            "country_code": "UK",
            "headshot_url": ""
        })
    );
    assert_eq!(
        warehouse.row("drivers", "1").unwrap()["headshot_url"],
        "http://example.com/1.png"
    );

    assert_eq!(
        warehouse.row("races", "9606").unwrap(),
        json!({
            "session_key": 9606,
            "year": 2024,
            "session_name": "Race",
            "country_name": "Italy",
            "circuit_name": "Monza"
        })
    );

    let lap = warehouse.row("laps", "9606/2/1").unwrap();
    assert_eq!(lap["lap_duration"], 85.6);
    assert_eq!(lap["is_pit_out_lap"], true);
}

#[tokio::test]
async fn test_rerunning_an_unchanged_source_changes_nothing() {
    let warehouse = MockWarehouse::new();

    let first = Pipeline::new(MockStore::with_fixture(), warehouse.clone())
        .run()
        .await;
    let after_first = warehouse.snapshot();

    let second = Pipeline::new(MockStore::with_fixture(), warehouse.clone())
        .run()
        .await;
    let after_second = warehouse.snapshot();

    assert_eq!(first.overall, RunStatus::Success);
    assert_eq!(second.overall, RunStatus::Success);
    assert_eq!(after_first, after_second);
    // Row counts held steady; the re-run overwrote in place.
    assert_eq!(after_second["drivers"].len(), 2);
}

#[tokio::test]
async fn test_source_updates_fully_overwrite_the_row() {
    let warehouse = MockWarehouse::new();
    // A leftover row from an earlier schema carrying a column the mapper no
    // longer emits. A true overwrite must not preserve it.
    warehouse.plant_row(
        "drivers",
        "2",
        json!({
            "driver_number": 2,
            "full_name": "Driver 2",
            "team": "Old Team",
            "country_code": "UK",
            "headshot_url": "http://example.com/stale.png",
            "stale_column": true
        }),
    );

    let mut store = MockStore::with_fixture();
    store.documents.get_mut("drivers").unwrap()[1]["team"] = json!("Team C");

    Pipeline::new(store, warehouse.clone()).run().await;

    let row = warehouse.row("drivers", "2").unwrap();
    assert_eq!(row["team"], "Team C");
    assert_eq!(row["headshot_url"], "");
    assert!(row.get("stale_column").is_none());
}

#[tokio::test]
async fn test_duplicate_position_keys_resolve_to_the_last_document() {
    let mut store = MockStore::with_fixture();
    store.documents.get_mut("position").unwrap().extend([
        json!({ "sessionKey": 9606, "driverNumber": 2, "position": 7 }),
        json!({ "sessionKey": 9606, "driverNumber": 2, "position": 4 }),
    ]);

    let warehouse = MockWarehouse::new();
    let report = Pipeline::new(store, warehouse.clone()).run().await;

    // Duplicates are a data quirk, not an error.
    assert_eq!(report.overall, RunStatus::Success);
    assert_eq!(warehouse.snapshot()["position"].len(), 2);
    assert_eq!(warehouse.row("position", "9606/2").unwrap()["position"], 4);
}

#[tokio::test]
async fn test_failed_table_leaves_the_others_loaded() {
    let warehouse = MockWarehouse::failing(vec!["laps"]);
    let report = Pipeline::new(MockStore::with_fixture(), warehouse.clone())
        .run()
        .await;

    assert_eq!(report.overall, RunStatus::PartialFailure);
    match &report.per_table[&Kind::Laps] {
        LoadResult::Failed { error } => assert_eq!(error.table, "laps"),
        other => panic!("expected a failed laps table, got {other:?}"),
    }
    assert_eq!(report.tables_loaded(), 4);

    let tables = warehouse.snapshot();
    assert!(!tables.contains_key("laps"));
    assert_eq!(tables["drivers"].len(), 2);
    assert_eq!(tables["latest_session"].len(), 1);
}

#[tokio::test]
async fn test_unmappable_documents_do_not_block_their_siblings() {
    let mut store = MockStore::with_fixture();
    store.documents.get_mut("drivers").unwrap().push(json!({
        "_id": "Driver 3",
        "driverNumber": "three",
        "team": "Team C",
        "countryCode": "DE"
    }));

    let warehouse = MockWarehouse::new();
    let report = Pipeline::new(store, warehouse.clone()).run().await;

    assert_eq!(report.overall, RunStatus::PartialFailure);
    let drivers = &report.per_collection[&Kind::Drivers];
    assert_eq!(drivers.read, 3);
    assert_eq!(drivers.mapped, 2);
    assert_eq!(drivers.dropped, 1);
    assert_eq!(drivers.errors[0].document, "Driver 3");
    assert_eq!(drivers.errors[0].field, "driverNumber");

    assert_eq!(warehouse.snapshot()["drivers"].len(), 2);
}

#[tokio::test]
async fn test_unreachable_store_loads_nothing() {
    let store = MockStore {
        fail_ping: true,
        ..MockStore::with_fixture()
    };
    let warehouse = MockWarehouse::new();
    let report = Pipeline::new(store, warehouse.clone()).run().await;

    assert_eq!(report.overall, RunStatus::Fatal);
    assert_eq!(report.fatal.unwrap().store, "document store");
    assert!(warehouse.snapshot().is_empty());
}
