//! Store clients and authentication.
//!
//! This module provides the [`AtlasClient`] for reading the document store
//! and the [`PostgresClient`] for writing the relational store, along with
//! the [`Auth`] credential type. Both clients are built from explicit
//! config structs and live for one pipeline run.

mod atlas;
mod auth;
mod postgres;

pub use atlas::{AtlasClient, AtlasConfig, DEFAULT_TIMEOUT_SECS};
pub use auth::Auth;
pub use postgres::{build_upsert, PostgresClient, PostgresConfig};
