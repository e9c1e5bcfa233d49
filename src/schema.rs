//! The seam between this crate and external record schemas.
//!
//! Source record types are never inspected by reflection: a host adapts each
//! mirrored type to [`SourceRecord`] so the synchronizer and getter can read
//! declared datatypes and typed values by field name. [`SchemaIntrospect`] is
//! the configuration-time counterpart used by registry checks.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::models::{CellCoordinates, Datatype, FieldValue};

/// A mirrored external record, observed at save/delete time.
///
/// `report_datetime` is the owning **visit's** report datetime. A visit-like
/// record returns its own; a CRF-like record returns its visit's, even when
/// the record carries a separately settable report datetime field. This is
/// the single temporal anchor shared by every field at one timepoint.
pub trait SourceRecord {
    fn source_name(&self) -> &str;

    fn subject_id(&self) -> &str;

    fn timepoint(&self) -> &str;

    fn report_datetime(&self) -> NaiveDateTime;

    /// Declared datatype of a field, or None when the schema has no such
    /// field.
    fn field_datatype(&self, field_name: &str) -> Option<Datatype>;

    /// Current value of a field. Outer None means the schema has no such
    /// field; inner None means the field is NULL on this record.
    fn field_value(&self, field_name: &str) -> Option<Option<FieldValue>>;

    /// Provenance for relation-typed fields, e.g. a reverse-relation name.
    fn related_name(&self, field_name: &str) -> Option<String> {
        let _ = field_name;
        None
    }

    fn coordinates(&self) -> CellCoordinates {
        CellCoordinates::new(
            self.subject_id(),
            self.source_name(),
            self.timepoint(),
            self.report_datetime(),
        )
    }
}

/// Everything a registry check needs to know about one external schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaInfo {
    pub field_names: Vec<String>,
    pub datatypes: BTreeMap<String, Datatype>,
    /// Whether the external type is wired to call the synchronizer on save
    /// and the deleter on delete.
    pub has_sync_hooks: bool,
}

impl SchemaInfo {
    pub fn has_field(&self, field_name: &str) -> bool {
        self.field_names.iter().any(|f| f == field_name)
    }
}

/// Schema introspection collaborator, supplied by the host.
pub trait SchemaIntrospect {
    /// The schema for a bare model name (`"app.model"`), or None when the
    /// name cannot be resolved at all.
    fn source_schema(&self, source_name: &str) -> Option<SchemaInfo>;
}
