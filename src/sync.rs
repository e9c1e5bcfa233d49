//! Keeps the cell store synchronized with source record saves and deletes.
//!
//! The host calls [`update_references`] from each mirrored type's save path
//! and [`delete_references`] from its delete path, synchronously; neither is
//! queued or deferred.

use std::collections::BTreeSet;

use rusqlite::Connection;
use thiserror::Error;

use crate::models::{Datatype, FieldValue, ValueCell, ValueKind};
use crate::registry::{Registry, RegistryError};
use crate::resolver::{self, GetterError};
use crate::schema::SourceRecord;
use crate::store::{self, StoreError};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Field '{field}' declared for '{source_name}' not found on the source record")]
    FieldNotFoundOnSource { source_name: String, field: String },

    #[error("Unsupported datatype {datatype:?} for '{source_name}.{field}'")]
    UnsupportedDatatype {
        source_name: String,
        field: String,
        datatype: Datatype,
    },

    #[error("Duplicate field '{field}' declared for '{source_name}'")]
    DuplicateField { source_name: String, field: String },

    #[error("Value for '{source_name}.{field}' is {got:?}, expected {expected:?}")]
    ValueKindMismatch {
        source_name: String,
        field: String,
        expected: ValueKind,
        got: ValueKind,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Getter(#[from] GetterError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

struct PlannedWrite {
    field_name: String,
    kind: ValueKind,
    value: Option<FieldValue>,
    related_name: Option<String>,
}

/// Upsert one cell per declared field of a saved record. Returns the written
/// cells.
///
/// Field resolution is validated for every declared field before any cell is
/// touched, so a declaration error leaves all-old values. The
/// `report_datetime` field always mirrors the record's visit anchor, never a
/// same-named field on the record itself.
pub fn update_references(
    conn: &Connection,
    registry: &Registry,
    record: &dyn SourceRecord,
) -> Result<Vec<ValueCell>, SyncError> {
    let source = record.source_name();
    let field_names = registry.fields(source)?;

    let mut seen = BTreeSet::new();
    for field_name in field_names {
        if !seen.insert(field_name.as_str()) {
            return Err(SyncError::DuplicateField {
                source_name: source.to_string(),
                field: field_name.clone(),
            });
        }
    }

    let mut planned = Vec::with_capacity(field_names.len());
    for field_name in field_names {
        planned.push(plan_write(record, field_name)?);
    }

    let mut written = Vec::with_capacity(planned.len());
    for plan in planned {
        let resolved = resolver::get_for_record(conn, registry, record, &plan.field_name, true)?;
        let mut cell = resolved.cell;
        cell.datatype = Some(plan.kind);
        cell.value = plan.value;
        cell.related_name = plan.related_name;
        store::update_cell_value(conn, &cell)?;
        written.push(cell);
    }
    tracing::debug!(
        source,
        subject_id = record.subject_id(),
        cells = written.len(),
        "reference cells updated"
    );
    Ok(written)
}

fn plan_write(record: &dyn SourceRecord, field_name: &str) -> Result<PlannedWrite, SyncError> {
    let source = record.source_name();
    let not_found = || SyncError::FieldNotFoundOnSource {
        source_name: source.to_string(),
        field: field_name.to_string(),
    };
    let datatype = record.field_datatype(field_name).ok_or_else(not_found)?;
    let kind = datatype
        .value_kind()
        .ok_or_else(|| SyncError::UnsupportedDatatype {
            source_name: source.to_string(),
            field: field_name.to_string(),
            datatype,
        })?;
    // All fields of one timepoint share one temporal anchor.
    let value = if field_name == "report_datetime" {
        Some(FieldValue::DateTime(record.report_datetime()))
    } else {
        record.field_value(field_name).ok_or_else(not_found)?
    };
    if let Some(value) = &value {
        if value.kind() != kind {
            return Err(SyncError::ValueKindMismatch {
                source_name: source.to_string(),
                field: field_name.to_string(),
                expected: kind,
                got: value.kind(),
            });
        }
    }
    Ok(PlannedWrite {
        field_name: field_name.to_string(),
        kind,
        value,
        related_name: record.related_name(field_name),
    })
}

/// Remove every cell of the deleted record's timepoint occurrence, as a
/// single transaction. Returns the number of cells removed.
pub fn delete_references(
    conn: &Connection,
    registry: &Registry,
    record: &dyn SourceRecord,
) -> Result<usize, SyncError> {
    registry.get(record.source_name())?;
    let deleted = store::delete_cells_for(conn, &record.coordinates())?;
    tracing::debug!(
        source = record.source_name(),
        subject_id = record.subject_id(),
        cells = deleted,
        "reference cells deleted"
    );
    Ok(deleted)
}

/// The save/delete integration point as a swappable capability, so batch
/// drivers can run against a no-op for dry runs.
pub trait Synchronizer {
    fn update(
        &self,
        conn: &Connection,
        registry: &Registry,
        record: &dyn SourceRecord,
    ) -> Result<usize, SyncError>;

    fn delete(
        &self,
        conn: &Connection,
        registry: &Registry,
        record: &dyn SourceRecord,
    ) -> Result<usize, SyncError>;
}

pub struct StoreSynchronizer;

impl Synchronizer for StoreSynchronizer {
    fn update(
        &self,
        conn: &Connection,
        registry: &Registry,
        record: &dyn SourceRecord,
    ) -> Result<usize, SyncError> {
        Ok(update_references(conn, registry, record)?.len())
    }

    fn delete(
        &self,
        conn: &Connection,
        registry: &Registry,
        record: &dyn SourceRecord,
    ) -> Result<usize, SyncError> {
        delete_references(conn, registry, record)
    }
}

pub struct NoopSynchronizer;

impl Synchronizer for NoopSynchronizer {
    fn update(
        &self,
        _conn: &Connection,
        _registry: &Registry,
        _record: &dyn SourceRecord,
    ) -> Result<usize, SyncError> {
        Ok(0)
    }

    fn delete(
        &self,
        _conn: &Connection,
        _registry: &Registry,
        _record: &dyn SourceRecord,
    ) -> Result<usize, SyncError> {
        Ok(0)
    }
}
