//! CLI helper functions

use crate::{
    client::{AtlasClient, AtlasConfig, Auth, PostgresClient, PostgresConfig},
    etl::{Extractor, Pipeline},
    report::{LoadResult, RunReport, RunStatus},
    storage,
};
use eyre::{Context, Result};
use std::path::Path;
use url::Url;

/// Load the document store client from environment variables
///
/// Expected environment variables:
/// - MONGO_API_URL: Data API base endpoint URL (required)
/// - MONGO_DATA_SOURCE: Atlas cluster name (required)
/// - MONGO_DB_NAME: Database holding the telemetry collections (required)
/// - MONGO_API_KEY: Data API key (optional, preferred over username/password)
/// - MONGO_USER: Username for basic auth (optional)
/// - MONGO_PASSWORD: Password for basic auth (optional)
pub fn load_atlas_client() -> Result<AtlasClient> {
    let url_str =
        std::env::var("MONGO_API_URL").context("MONGO_API_URL environment variable not set")?;
    let url = Url::parse(&url_str).with_context(|| format!("Invalid MONGO_API_URL: {}", url_str))?;
    let data_source = std::env::var("MONGO_DATA_SOURCE")
        .context("MONGO_DATA_SOURCE environment variable not set")?;
    let database =
        std::env::var("MONGO_DB_NAME").context("MONGO_DB_NAME environment variable not set")?;

    let auth = if let Ok(apikey) = std::env::var("MONGO_API_KEY") {
        Auth::Apikey(apikey)
    } else if let (Ok(username), Ok(password)) = (
        std::env::var("MONGO_USER"),
        std::env::var("MONGO_PASSWORD"),
    ) {
        Auth::Basic(username, password)
    } else {
        Auth::None
    };

    AtlasClient::try_new(AtlasConfig::new(url, data_source, database), &auth)
        .context("Failed to create document store client")
}

/// Load the relational store client from environment variables
///
/// Expected environment variables:
/// - POSTGRES_URL: PostgreSQL connection string (required)
pub fn load_postgres_client() -> Result<PostgresClient> {
    let connection_string =
        std::env::var("POSTGRES_URL").context("POSTGRES_URL environment variable not set")?;
    let config = PostgresConfig {
        connection_string,
        ..PostgresConfig::default()
    };
    PostgresClient::try_new(config).context("Failed to create relational store client")
}

/// Run the full pipeline once and log the outcome summary
///
/// Returns the run report; callers decide what to do with a non-success
/// verdict.
pub async fn run_sync(dump_raw: Option<&Path>, report_file: Option<&Path>) -> Result<RunReport> {
    let source = load_atlas_client()?;
    let sink = load_postgres_client()?;

    let mut pipeline = Pipeline::new(source, sink);
    if let Some(path) = dump_raw {
        pipeline = pipeline.with_raw_dump(path);
    }

    let report = pipeline.run().await;
    print_report(&report);

    if let Some(path) = report_file {
        storage::write_report(path, &report)?;
        log::info!("✓ Wrote run report to {}", path.display());
    }

    Ok(report)
}

/// Verify connectivity to both stores without moving any data
pub async fn check_connections() -> Result<()> {
    log::info!("Checking document store...");
    let atlas = load_atlas_client()?;
    atlas.test_connection().await?;
    log::info!("✓ Document store reachable: {}", atlas);

    log::info!("Checking relational store...");
    let postgres = load_postgres_client()?;
    postgres.test_connection().await?;
    log::info!("✓ Relational store reachable");

    Ok(())
}

/// Extract all collections and save the raw snapshot without loading
///
/// Returns the number of documents saved.
pub async fn dump_snapshot(output: impl AsRef<Path>) -> Result<usize> {
    let output = output.as_ref();

    let source = load_atlas_client()?;
    let extractor = Extractor::new(source);
    let snapshot = extractor.extract().await?;

    for (kind, collection) in &snapshot.collections {
        match &collection.fetch_error {
            Some(error) => log::warn!("  {}: {}", kind, error.message),
            None => log::info!("  {}: {} document(s)", kind, collection.documents.len()),
        }
    }

    storage::write_snapshot(output, &snapshot)?;
    let total = snapshot.total_documents();
    log::info!("✓ Saved {} document(s) to {}", total, output.display());
    Ok(total)
}

/// Log the per-collection and per-table outcome of a run
fn print_report(report: &RunReport) {
    for (kind, collection) in &report.per_collection {
        if let Some(error) = &collection.fetch_error {
            log::warn!("✗ {}: fetch failed ({})", kind, error.message);
        } else if collection.dropped > 0 {
            log::warn!(
                "! {}: read {}, mapped {}, dropped {}",
                kind,
                collection.read,
                collection.mapped,
                collection.dropped
            );
        } else {
            log::info!("✓ {}: read {}, mapped {}", kind, collection.read, collection.mapped);
        }
    }

    for (kind, result) in &report.per_table {
        match result {
            LoadResult::Loaded { rows_affected } => {
                log::info!("✓ {}: {} row(s) upserted", kind.table(), rows_affected);
            }
            LoadResult::Failed { error } => {
                log::warn!("✗ {}: {}", kind.table(), error.message);
            }
        }
    }

    match report.overall {
        RunStatus::Success => log::info!("Run finished: success"),
        RunStatus::PartialFailure => log::warn!("Run finished: partial failure"),
        RunStatus::Fatal => log::error!("Run failed before any data moved"),
    }
}
