//! Race Telemetry Sync
//!
//! An ETL reconciliation layer that mirrors race telemetry from a document
//! store into a relational warehouse: whole-collection snapshots in,
//! canonical rows out, one idempotent upsert per table.

pub mod cli;
pub mod client;
pub mod error;
pub mod etl;
pub mod report;
pub mod schema;
pub mod storage;

// Re-exports for convenience
pub use client::{AtlasClient, AtlasConfig, Auth, PostgresClient, PostgresConfig};
pub use etl::{DocumentSource, Extractor, Loader, Pipeline, RawSnapshot, RowSink, Stage};
pub use report::{LoadResult, RunReport, RunStatus};
pub use schema::{Kind, RowSets, TableSpec};
