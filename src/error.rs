//! Error taxonomy for the sync pipeline.
//!
//! Only [`ConnectionError`] is fatal. Every other error is caught at the
//! boundary of the item it belongs to (one document, one collection, one
//! table) and accumulated into the run report as a value, so partial success
//! is an ordinary return value rather than an unwound exception.

use crate::schema::Kind;
use serde::Serialize;
use thiserror::Error;

/// A store could not be reached while the run was establishing its
/// connections. Fatal: the run stops in the `Failed` state.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{store} connection failed: {message}")]
pub struct ConnectionError {
    /// Which store refused us: `"document store"` or `"relational store"`.
    pub store: &'static str,
    pub message: String,
}

/// One collection could not be fetched after a successful connection.
/// Recovered: the collection is treated as empty and the run continues.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("fetch of collection '{collection}' failed: {message}")]
pub struct CollectionFetchError {
    pub collection: &'static str,
    pub message: String,
}

/// One document could not be mapped to a canonical row. Recovered: the
/// document is dropped and its siblings still map.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{kind} document '{document}': required field '{field}' missing or not {expected}")]
pub struct MappingError {
    pub kind: Kind,
    /// The document's `_id` rendered to a string when present, otherwise
    /// `#<index>` within the collection.
    pub document: String,
    /// Source field name that was missing or failed coercion.
    pub field: &'static str,
    pub expected: Expected,
}

/// The upsert into one table failed. Recovered: the table is marked failed
/// and the remaining tables are still attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("upsert into table '{table}' failed: {message}")]
pub struct UpsertError {
    pub table: &'static str,
    pub message: String,
}

/// The coercion target a required field failed to meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expected {
    Integer,
    Float,
    Boolean,
    Text,
}

impl std::fmt::Display for Expected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expected::Integer => write!(f, "an integer"),
            Expected::Float => write!(f, "a number"),
            Expected::Boolean => write!(f, "a boolean"),
            Expected::Text => write!(f, "a string"),
        }
    }
}
