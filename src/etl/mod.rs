//! The sync pipeline: extract, transform, load.
//!
//! [`Extractor`] pulls whole-collection snapshots from a [`DocumentSource`],
//! the transform functions reshape raw documents into canonical rows, and
//! [`Loader`] upserts each row set into its table through a [`RowSink`].
//! [`Pipeline`] sequences the three stages and reports the outcome.

mod extract;
mod load;
mod pipeline;
mod transform;

pub use extract::{CollectionSnapshot, DocumentSource, Extractor, RawSnapshot};
pub use load::{Loader, RowSink};
pub use pipeline::{Pipeline, Stage};
pub use transform::{
    map_driver, map_lap, map_latest_session, map_position, map_race, transform_snapshot,
    FieldFault,
};
