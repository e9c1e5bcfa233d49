//! An embedded longitudinal reference store.
//!
//! Mirrors individual field values of external clinical records into a
//! single SQLite-backed entity-attribute-value table, keyed by
//! `(subject, source, timepoint, report datetime, field)`. Hosts declare
//! which sources and fields to mirror in a [`registry::Registry`], call the
//! synchronizer from their save/delete paths, and read per-subject series
//! back through [`refsets::LongitudinalRefset`] without touching the source
//! tables.

pub mod models;
pub mod populate;
pub mod refsets;
pub mod registry;
pub mod resolver;
pub mod schedule;
pub mod schema;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use models::{CellCoordinates, CellFilter, Datatype, FieldValue, ValueCell, ValueKind};
pub use populate::{PopulateOptions, PopulateReport, Populater, RecordProvider};
pub use refsets::{Fieldset, LongitudinalRefset, Refset};
pub use registry::{Registry, SourceConfig};
pub use resolver::ResolvedCell;
pub use schema::{SchemaInfo, SchemaIntrospect, SourceRecord};
pub use sync::{delete_references, update_references, Synchronizer};
