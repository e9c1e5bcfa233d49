//! Find-or-create of a single reference cell by its 5-tuple identity.

use rusqlite::Connection;
use thiserror::Error;

use crate::models::{CellCoordinates, FieldValue, ValueCell};
use crate::registry::{Registry, RegistryError};
use crate::schema::SourceRecord;
use crate::store::{self, StoreError};

#[derive(Error, Debug)]
pub enum GetterError {
    #[error("Reference cell not found: {subject_id}@{timepoint} {source_name}.{field_name}")]
    CellNotFound {
        subject_id: String,
        source_name: String,
        timepoint: String,
        field_name: String,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of a getter lookup. `has_value` stays false for a placeholder
/// until the synchronizer writes a value into it.
#[derive(Debug, Clone)]
pub struct ResolvedCell {
    pub cell: ValueCell,
    pub has_value: bool,
    /// Whether this lookup inserted the cell.
    pub created: bool,
}

impl ResolvedCell {
    pub fn value(&self) -> Option<&FieldValue> {
        self.cell.value.as_ref()
    }
}

/// Resolve one field's cell for a source record. The record's source must be
/// registered; coordinates derive from the record's visit anchor.
pub fn get_for_record(
    conn: &Connection,
    registry: &Registry,
    record: &dyn SourceRecord,
    field_name: &str,
    create: bool,
) -> Result<ResolvedCell, GetterError> {
    registry.get(record.source_name())?;
    get_at(conn, &record.coordinates(), field_name, create)
}

/// Resolve one field's cell by explicit coordinates.
pub fn get_at(
    conn: &Connection,
    coords: &CellCoordinates,
    field_name: &str,
    create: bool,
) -> Result<ResolvedCell, GetterError> {
    if let Some(cell) = store::get_cell(conn, coords, field_name)? {
        let has_value = cell.has_value();
        return Ok(ResolvedCell {
            cell,
            has_value,
            created: false,
        });
    }
    if create {
        let cell = ValueCell::placeholder(coords, field_name);
        store::insert_cell(conn, &cell)?;
        tracing::debug!(
            subject_id = %coords.subject_id,
            source = %coords.source_name,
            field = field_name,
            "created placeholder reference cell"
        );
        return Ok(ResolvedCell {
            cell,
            has_value: false,
            created: true,
        });
    }
    Err(GetterError::CellNotFound {
        subject_id: coords.subject_id.clone(),
        source_name: coords.source_name.clone(),
        timepoint: coords.timepoint.clone(),
        field_name: field_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SourceConfig;
    use crate::store::open_memory_database;
    use crate::testing::{dt, init_tracing, FakeRecord};

    fn coords() -> CellCoordinates {
        CellCoordinates::new("12345", "study.crfone", "1000", dt(1, 10))
    }

    #[test]
    fn missing_cell_without_create_is_cell_not_found() {
        let conn = open_memory_database().unwrap();
        let err = get_at(&conn, &coords(), "field_str", false).unwrap_err();
        assert!(matches!(err, GetterError::CellNotFound { .. }));
    }

    #[test]
    fn create_inserts_placeholder_then_plain_get_finds_it() {
        init_tracing();
        let conn = open_memory_database().unwrap();

        let resolved = get_at(&conn, &coords(), "field_str", true).unwrap();
        assert!(!resolved.has_value);
        assert!(resolved.created);
        assert!(resolved.value().is_none());

        // cell now exists, but still carries no value
        let again = get_at(&conn, &coords(), "field_str", false).unwrap();
        assert!(!again.has_value);
        assert!(!again.created);
        assert_eq!(again.cell.id, resolved.cell.id);
    }

    #[test]
    fn record_lookup_requires_registration() {
        let conn = open_memory_database().unwrap();
        let registry = Registry::new();
        let record = FakeRecord::crf_one("12345", "1000", dt(1, 10));
        let err = get_for_record(&conn, &registry, &record, "field_str", true).unwrap_err();
        assert!(matches!(
            err,
            GetterError::Registry(RegistryError::NotRegistered(_))
        ));
    }

    #[test]
    fn record_lookup_uses_record_coordinates() {
        let conn = open_memory_database().unwrap();
        let mut registry = Registry::new();
        registry
            .register(SourceConfig::new("study.crfone", &["field_str"]).unwrap())
            .unwrap();
        let record = FakeRecord::crf_one("12345", "1000", dt(1, 10));

        let resolved = get_for_record(&conn, &registry, &record, "field_str", true).unwrap();
        assert_eq!(resolved.cell.subject_id, "12345");
        assert_eq!(resolved.cell.source_name, "study.crfone");
        assert_eq!(resolved.cell.timepoint, "1000");
        assert_eq!(resolved.cell.report_datetime, dt(1, 10));
    }
}
