use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use rusqlite::types::Value as SqlValue;
use uuid::Uuid;

use super::StoreError;
use crate::models::{CellCoordinates, CellFilter, FieldValue, ValueCell, ValueKind};

const CELL_COLUMNS: &str = "id, subject_id, source_name, timepoint, report_datetime, field_name,
     datatype, value_str, value_int, value_date, value_datetime, value_uuid, related_name";

/// Split a value into the five nullable columns. Exactly one is populated.
fn value_columns(
    value: Option<&FieldValue>,
) -> (
    Option<String>,
    Option<i64>,
    Option<NaiveDate>,
    Option<NaiveDateTime>,
    Option<String>,
) {
    match value {
        Some(FieldValue::Str(s)) => (Some(s.clone()), None, None, None, None),
        Some(FieldValue::Int(i)) => (None, Some(*i), None, None, None),
        Some(FieldValue::Date(d)) => (None, None, Some(*d), None, None),
        Some(FieldValue::DateTime(dt)) => (None, None, None, Some(*dt), None),
        Some(FieldValue::Id(id)) => (None, None, None, None, Some(id.to_string())),
        None => (None, None, None, None, None),
    }
}

/// The tag and payload kinds must agree before anything touches a row.
fn check_kind(cell: &ValueCell) -> Result<(), StoreError> {
    match (&cell.datatype, &cell.value) {
        (Some(kind), Some(value)) if value.kind() != *kind => {
            Err(StoreError::ConstraintViolation(format!(
                "value kind {} does not match datatype {} for {}",
                value.kind().as_str(),
                kind.as_str(),
                cell
            )))
        }
        (None, Some(_)) => Err(StoreError::ConstraintViolation(format!(
            "value present without a datatype tag for {cell}"
        ))),
        _ => Ok(()),
    }
}

pub fn insert_cell(conn: &Connection, cell: &ValueCell) -> Result<(), StoreError> {
    check_kind(cell)?;
    let (value_str, value_int, value_date, value_datetime, value_uuid) =
        value_columns(cell.value.as_ref());
    conn.execute(
        "INSERT INTO reference_cells (id, subject_id, source_name, timepoint, report_datetime,
         field_name, datatype, value_str, value_int, value_date, value_datetime, value_uuid, related_name)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            cell.id.to_string(),
            cell.subject_id,
            cell.source_name,
            cell.timepoint,
            cell.report_datetime,
            cell.field_name,
            cell.datatype.as_ref().map(|k| k.as_str()),
            value_str,
            value_int,
            value_date,
            value_datetime,
            value_uuid,
            cell.related_name,
        ],
    )?;
    Ok(())
}

/// Overwrite the value slots of an existing cell in place. The identity
/// columns never change.
pub fn update_cell_value(conn: &Connection, cell: &ValueCell) -> Result<(), StoreError> {
    check_kind(cell)?;
    let (value_str, value_int, value_date, value_datetime, value_uuid) =
        value_columns(cell.value.as_ref());
    let updated = conn.execute(
        "UPDATE reference_cells SET datatype = ?2, value_str = ?3, value_int = ?4,
         value_date = ?5, value_datetime = ?6, value_uuid = ?7, related_name = ?8
         WHERE id = ?1",
        params![
            cell.id.to_string(),
            cell.datatype.as_ref().map(|k| k.as_str()),
            value_str,
            value_int,
            value_date,
            value_datetime,
            value_uuid,
            cell.related_name,
        ],
    )?;
    if updated == 0 {
        return Err(StoreError::ConstraintViolation(format!(
            "no cell with id {} to update",
            cell.id
        )));
    }
    Ok(())
}

/// Unique lookup by the full 5-tuple identity.
pub fn get_cell(
    conn: &Connection,
    coords: &CellCoordinates,
    field_name: &str,
) -> Result<Option<ValueCell>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CELL_COLUMNS} FROM reference_cells
         WHERE subject_id = ?1 AND source_name = ?2 AND timepoint = ?3
           AND report_datetime = ?4 AND field_name = ?5"
    ))?;

    let result = stmt.query_row(
        params![
            coords.subject_id,
            coords.source_name,
            coords.timepoint,
            coords.report_datetime,
            field_name
        ],
        row_to_cell_row,
    );

    match result {
        Ok(row) => Ok(Some(cell_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All cells matching the filter, ordered by subject, time, source, field.
pub fn list_cells(conn: &Connection, filter: &CellFilter) -> Result<Vec<ValueCell>, StoreError> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<SqlValue> = Vec::new();
    if let Some(subject_id) = &filter.subject_id {
        clauses.push("subject_id = ?");
        values.push(SqlValue::Text(subject_id.clone()));
    }
    if let Some(source_name) = &filter.source_name {
        clauses.push("source_name = ?");
        values.push(SqlValue::Text(source_name.clone()));
    }
    if let Some(timepoint) = &filter.timepoint {
        clauses.push("timepoint = ?");
        values.push(SqlValue::Text(timepoint.clone()));
    }
    if let Some(field_name) = &filter.field_name {
        clauses.push("field_name = ?");
        values.push(SqlValue::Text(field_name.clone()));
    }
    if let Some(datatype) = &filter.datatype {
        clauses.push("datatype = ?");
        values.push(SqlValue::Text(datatype.as_str().to_string()));
    }
    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT {CELL_COLUMNS} FROM reference_cells{where_clause}
         ORDER BY subject_id, report_datetime, source_name, field_name"
    ))?;
    let rows = stmt.query_map(rusqlite::params_from_iter(values), row_to_cell_row)?;

    let mut cells = Vec::new();
    for row in rows {
        cells.push(cell_from_row(row?)?);
    }
    Ok(cells)
}

/// One `report_datetime` cell per visit occurrence for this subject,
/// ascending by report datetime. The input to the longitudinal layer.
pub fn list_visit_references(
    conn: &Connection,
    subject_id: &str,
    visit_source_name: &str,
) -> Result<Vec<ValueCell>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CELL_COLUMNS} FROM reference_cells
         WHERE subject_id = ?1 AND source_name = ?2 AND field_name = 'report_datetime'
         ORDER BY report_datetime ASC"
    ))?;
    let rows = stmt.query_map(params![subject_id, visit_source_name], row_to_cell_row)?;

    let mut cells = Vec::new();
    for row in rows {
        cells.push(cell_from_row(row?)?);
    }
    Ok(cells)
}

/// Remove every field snapshot of one record occurrence as a single
/// transaction. Returns the number of cells removed.
pub fn delete_cells_for(conn: &Connection, coords: &CellCoordinates) -> Result<usize, StoreError> {
    let tx = conn.unchecked_transaction()?;
    let deleted = tx.execute(
        "DELETE FROM reference_cells
         WHERE subject_id = ?1 AND source_name = ?2 AND timepoint = ?3 AND report_datetime = ?4",
        params![
            coords.subject_id,
            coords.source_name,
            coords.timepoint,
            coords.report_datetime
        ],
    )?;
    tx.commit()?;
    Ok(deleted)
}

pub fn delete_cells_for_source(conn: &Connection, source_name: &str) -> Result<usize, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM reference_cells WHERE source_name = ?1",
        params![source_name],
    )?;
    Ok(deleted)
}

pub fn count_cells_for_source(conn: &Connection, source_name: &str) -> Result<i64, StoreError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM reference_cells WHERE source_name = ?1",
        params![source_name],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn source_has_cells(conn: &Connection, source_name: &str) -> Result<bool, StoreError> {
    Ok(count_cells_for_source(conn, source_name)? > 0)
}

/// Lookup of a target source's cell by a visit's coordinates.
pub fn get_cell_for_visit(
    conn: &Connection,
    source_name: &str,
    visit: &CellCoordinates,
    field_name: &str,
) -> Result<Option<ValueCell>, StoreError> {
    get_cell(conn, &visit.for_source(source_name), field_name)
}

/// Lookup of a requisition source's panel cell by a visit's coordinates.
/// Matches on the `panel` field carrying the given panel name.
pub fn get_requisition_cell_for_visit(
    conn: &Connection,
    source_name: &str,
    visit: &CellCoordinates,
    panel_name: &str,
) -> Result<Option<ValueCell>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CELL_COLUMNS} FROM reference_cells
         WHERE subject_id = ?1 AND source_name = ?2 AND timepoint = ?3
           AND report_datetime = ?4 AND field_name = 'panel' AND value_str = ?5
         LIMIT 1"
    ))?;

    let result = stmt.query_row(
        params![
            visit.subject_id,
            source_name,
            visit.timepoint,
            visit.report_datetime,
            panel_name
        ],
        row_to_cell_row,
    );

    match result {
        Ok(row) => Ok(Some(cell_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

// Internal row type for cell mapping
struct CellRow {
    id: String,
    subject_id: String,
    source_name: String,
    timepoint: String,
    report_datetime: NaiveDateTime,
    field_name: String,
    datatype: Option<String>,
    value_str: Option<String>,
    value_int: Option<i64>,
    value_date: Option<NaiveDate>,
    value_datetime: Option<NaiveDateTime>,
    value_uuid: Option<String>,
    related_name: Option<String>,
}

fn row_to_cell_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CellRow> {
    Ok(CellRow {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        source_name: row.get(2)?,
        timepoint: row.get(3)?,
        report_datetime: row.get(4)?,
        field_name: row.get(5)?,
        datatype: row.get(6)?,
        value_str: row.get(7)?,
        value_int: row.get(8)?,
        value_date: row.get(9)?,
        value_datetime: row.get(10)?,
        value_uuid: row.get(11)?,
        related_name: row.get(12)?,
    })
}

fn cell_from_row(row: CellRow) -> Result<ValueCell, StoreError> {
    let datatype = row
        .datatype
        .as_deref()
        .map(ValueKind::from_str)
        .transpose()?;
    let value = decode_value(&row, datatype)?;
    Ok(ValueCell {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| StoreError::ConstraintViolation(e.to_string()))?,
        subject_id: row.subject_id,
        source_name: row.source_name,
        timepoint: row.timepoint,
        report_datetime: row.report_datetime,
        field_name: row.field_name,
        datatype,
        value,
        related_name: row.related_name,
    })
}

/// Read back the populated slot. The datatype tag picks the column; rows
/// written before a tag existed fall back to the first populated slot.
fn decode_value(
    row: &CellRow,
    datatype: Option<ValueKind>,
) -> Result<Option<FieldValue>, StoreError> {
    let parse_uuid = |s: &str| {
        Uuid::parse_str(s).map_err(|e| StoreError::ConstraintViolation(e.to_string()))
    };
    let value = match datatype {
        Some(ValueKind::Str) => row.value_str.clone().map(FieldValue::Str),
        Some(ValueKind::Int) => row.value_int.map(FieldValue::Int),
        Some(ValueKind::Date) => row.value_date.map(FieldValue::Date),
        Some(ValueKind::DateTime) => row.value_datetime.map(FieldValue::DateTime),
        Some(ValueKind::Id) => row
            .value_uuid
            .as_deref()
            .map(parse_uuid)
            .transpose()?
            .map(FieldValue::Id),
        None => {
            if let Some(s) = &row.value_str {
                Some(FieldValue::Str(s.clone()))
            } else if let Some(i) = row.value_int {
                Some(FieldValue::Int(i))
            } else if let Some(d) = row.value_date {
                Some(FieldValue::Date(d))
            } else if let Some(dt) = row.value_datetime {
                Some(FieldValue::DateTime(dt))
            } else if let Some(u) = &row.value_uuid {
                Some(FieldValue::Id(parse_uuid(u)?))
            } else {
                None
            }
        }
    };
    Ok(value)
}
