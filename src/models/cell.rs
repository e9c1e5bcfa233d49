use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ValueKind;

/// One typed value. Exactly one payload is populated by construction, which
/// is what the five nullable value columns in the store encode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Id(Uuid),
}

impl FieldValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FieldValue::Str(_) => ValueKind::Str,
            FieldValue::Int(_) => ValueKind::Int,
            FieldValue::Date(_) => ValueKind::Date,
            FieldValue::DateTime(_) => ValueKind::DateTime,
            FieldValue::Id(_) => ValueKind::Id,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

/// The record-level identity of a mirrored source occurrence: which subject,
/// at which timepoint, of which source. Together with a field name this is
/// the unique key of a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCoordinates {
    pub subject_id: String,
    pub source_name: String,
    pub timepoint: String,
    pub report_datetime: NaiveDateTime,
}

impl CellCoordinates {
    pub fn new(
        subject_id: impl Into<String>,
        source_name: impl Into<String>,
        timepoint: impl Into<String>,
        report_datetime: NaiveDateTime,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            source_name: source_name.into(),
            timepoint: timepoint.into(),
            report_datetime,
        }
    }

    /// Same coordinates under a different source name. Used when looking up
    /// a CRF's cells by its visit's coordinates.
    pub fn for_source(&self, source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            ..self.clone()
        }
    }
}

/// A single mirrored fact in the reference store.
///
/// `value == None` means the cell exists as a placeholder or the source field
/// was NULL; it is distinct from an empty string or zero. `datatype` records
/// which value slot is populated and stays set even when the value is NULL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCell {
    pub id: Uuid,
    pub subject_id: String,
    pub source_name: String,
    pub timepoint: String,
    pub report_datetime: NaiveDateTime,
    pub field_name: String,
    pub datatype: Option<ValueKind>,
    pub value: Option<FieldValue>,
    pub related_name: Option<String>,
}

impl ValueCell {
    /// An empty cell at the given coordinates, all value slots unset.
    pub fn placeholder(coords: &CellCoordinates, field_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject_id: coords.subject_id.clone(),
            source_name: coords.source_name.clone(),
            timepoint: coords.timepoint.clone(),
            report_datetime: coords.report_datetime,
            field_name: field_name.to_string(),
            datatype: None,
            value: None,
            related_name: None,
        }
    }

    pub fn coordinates(&self) -> CellCoordinates {
        CellCoordinates {
            subject_id: self.subject_id.clone(),
            source_name: self.source_name.clone(),
            timepoint: self.timepoint.clone(),
            report_datetime: self.report_datetime,
        }
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

impl std::fmt::Display for ValueCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{} {}.{}",
            self.subject_id, self.timepoint, self.source_name, self.field_name
        )
    }
}
