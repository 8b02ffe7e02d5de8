//! Snapshot extraction from the document store.

use crate::error::{CollectionFetchError, ConnectionError};
use crate::schema::Kind;
use eyre::Result;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Read side of the document store.
///
/// Implemented by [`AtlasClient`](crate::client::AtlasClient) and by the
/// in-memory sources the tests use.
///
/// # Example
/// ```no_run
/// use race_telemetry_sync::etl::DocumentSource;
/// use eyre::Result;
/// use serde_json::Value;
///
/// struct StaticSource {
///     documents: Vec<Value>,
/// }
///
/// impl DocumentSource for StaticSource {
///     async fn ping(&self) -> Result<()> {
///         Ok(())
///     }
///
///     async fn fetch_collection(&self, _collection: &str) -> Result<Vec<Value>> {
///         Ok(self.documents.clone())
///     }
/// }
/// ```
pub trait DocumentSource: Send + Sync {
    /// Verify the store is reachable. Called once at the start of a run.
    ///
    /// # Errors
    /// Returns an error if the store cannot be reached; the run treats this
    /// as fatal.
    fn ping(&self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Fetch every document of one collection, unfiltered.
    ///
    /// # Errors
    /// Returns an error if the fetch fails (network, auth, decode); the run
    /// treats the collection as empty and continues.
    fn fetch_collection(
        &self,
        collection: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Value>>> + Send;
}

/// One collection's share of an extraction snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CollectionSnapshot {
    pub documents: Vec<Value>,
    /// Set when the fetch failed; `documents` is then empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_error: Option<CollectionFetchError>,
}

/// The raw result of one extraction pass over all five collections.
///
/// Documents are kept exactly as the store returned them; nothing is
/// reshaped until the transform stage.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RawSnapshot {
    pub collections: BTreeMap<Kind, CollectionSnapshot>,
}

impl RawSnapshot {
    /// Documents fetched for one kind; empty for failed or absent kinds.
    pub fn documents(&self, kind: Kind) -> &[Value] {
        self.collections
            .get(&kind)
            .map(|c| c.documents.as_slice())
            .unwrap_or(&[])
    }

    pub fn fetch_error(&self, kind: Kind) -> Option<&CollectionFetchError> {
        self.collections.get(&kind).and_then(|c| c.fetch_error.as_ref())
    }

    /// Total documents across all collections.
    pub fn total_documents(&self) -> usize {
        self.collections.values().map(|c| c.documents.len()).sum()
    }
}

/// Pulls whole-collection snapshots from a [`DocumentSource`].
pub struct Extractor<S> {
    source: S,
}

impl<S: DocumentSource> Extractor<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Pull a complete snapshot of all five collections.
    ///
    /// A fetch failure on one collection is recorded in the snapshot and
    /// the remaining collections are still fetched.
    ///
    /// # Errors
    /// Fails only when the store itself is unreachable.
    pub async fn extract(&self) -> Result<RawSnapshot, ConnectionError> {
        if let Err(e) = self.source.ping().await {
            return Err(ConnectionError {
                store: "document store",
                message: format!("{e:#}"),
            });
        }

        let mut snapshot = RawSnapshot::default();
        for kind in Kind::ALL {
            let entry = match self.source.fetch_collection(kind.collection()).await {
                Ok(documents) => {
                    log::debug!("Fetched {} document(s) from '{}'", documents.len(), kind);
                    CollectionSnapshot {
                        documents,
                        fetch_error: None,
                    }
                }
                Err(e) => {
                    let error = CollectionFetchError {
                        collection: kind.collection(),
                        message: format!("{e:#}"),
                    };
                    log::warn!("{error}; continuing with the remaining collections");
                    CollectionSnapshot {
                        documents: Vec::new(),
                        fetch_error: Some(error),
                    }
                }
            };
            snapshot.collections.insert(kind, entry);
        }

        log::info!(
            "Extracted {} document(s) from {} collection(s)",
            snapshot.total_documents(),
            snapshot.collections.len()
        );
        Ok(snapshot)
    }
}
