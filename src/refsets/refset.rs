use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use super::RefsetError;
use crate::models::{CellCoordinates, FieldValue};
use crate::registry::Registry;
use crate::store;

/// Attributes every snapshot carries in addition to its target fields.
pub const BASE_ATTRS: [&str; 2] = ["report_datetime", "timepoint"];

/// A comparable view of one attribute, used as a sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SortValue {
    Str(String),
    Int(i64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Id(Uuid),
}

impl SortValue {
    fn rank(&self) -> u8 {
        match self {
            SortValue::Str(_) => 0,
            SortValue::Int(_) => 1,
            SortValue::Date(_) => 2,
            SortValue::DateTime(_) => 3,
            SortValue::Id(_) => 4,
        }
    }
}

impl From<&FieldValue> for SortValue {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Str(s) => SortValue::Str(s.clone()),
            FieldValue::Int(i) => SortValue::Int(*i),
            FieldValue::Date(d) => SortValue::Date(*d),
            FieldValue::DateTime(dt) => SortValue::DateTime(*dt),
            FieldValue::Id(id) => SortValue::Id(*id),
        }
    }
}

impl Ord for SortValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Str(a), SortValue::Str(b)) => a.cmp(b),
            (SortValue::Int(a), SortValue::Int(b)) => a.cmp(b),
            (SortValue::Date(a), SortValue::Date(b)) => a.cmp(b),
            (SortValue::DateTime(a), SortValue::DateTime(b)) => a.cmp(b),
            (SortValue::Id(a), SortValue::Id(b)) => a.cmp(b),
            // one column holds one kind; mixed kinds fall back to a fixed rank
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for SortValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// All mirrored fields of one target source, for one subject, at one
/// timepoint: a snapshot merging every declared field's cell value at the
/// exact `(subject, timepoint, report_datetime)` coordinates. Fields with no
/// cell are None.
#[derive(Debug, Clone, Serialize)]
pub struct Refset {
    pub subject_id: String,
    pub source_name: String,
    pub timepoint: String,
    pub report_datetime: NaiveDateTime,
    fields: BTreeMap<String, Option<FieldValue>>,
}

impl Refset {
    /// Build a snapshot. `report_datetime` is typed and therefore always
    /// present; the string coordinates must be non-empty so that a None
    /// field value is always attributable to a missing cell.
    pub fn new(
        conn: &Connection,
        registry: &Registry,
        subject_id: &str,
        report_datetime: NaiveDateTime,
        timepoint: &str,
        source_name: &str,
    ) -> Result<Self, RefsetError> {
        if subject_id.is_empty() {
            return Err(RefsetError::InvalidSnapshot("subject_id"));
        }
        if timepoint.is_empty() {
            return Err(RefsetError::InvalidSnapshot("timepoint"));
        }
        let declared = registry.fields(source_name)?;
        let coords = CellCoordinates::new(subject_id, source_name, timepoint, report_datetime);

        let mut fields: BTreeMap<String, Option<FieldValue>> = BTreeMap::new();
        for field_name in declared {
            // report_datetime is a base attribute, not a target field
            if field_name == "report_datetime" {
                continue;
            }
            let value = store::get_cell(conn, &coords, field_name)?.and_then(|cell| cell.value);
            if let Some(existing) = fields.get(field_name) {
                if *existing != value {
                    return Err(RefsetError::OverlappingField {
                        source_name: source_name.to_string(),
                        field: field_name.clone(),
                    });
                }
            }
            fields.insert(field_name.clone(), value);
        }

        let refset = Self {
            subject_id: subject_id.to_string(),
            source_name: source_name.to_string(),
            timepoint: timepoint.to_string(),
            report_datetime,
            fields,
        };
        refset.check_identity_overlap()?;
        Ok(refset)
    }

    /// A target field must never shadow an identity attribute with a
    /// conflicting value.
    fn check_identity_overlap(&self) -> Result<(), RefsetError> {
        let overlap = |field: &str, matches: bool| -> Result<(), RefsetError> {
            if self.fields.contains_key(field) && !matches {
                return Err(RefsetError::OverlappingField {
                    source_name: self.source_name.clone(),
                    field: field.to_string(),
                });
            }
            Ok(())
        };
        overlap(
            "subject_id",
            self.field("subject_id")
                .map_or(true, |v| v.as_str() == Some(self.subject_id.as_str())),
        )?;
        overlap(
            "timepoint",
            self.field("timepoint")
                .map_or(true, |v| v.as_str() == Some(self.timepoint.as_str())),
        )?;
        overlap(
            "source_name",
            self.field("source_name")
                .map_or(true, |v| v.as_str() == Some(self.source_name.as_str())),
        )
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        subject_id: &str,
        source_name: &str,
        timepoint: &str,
        report_datetime: NaiveDateTime,
        fields: BTreeMap<String, Option<FieldValue>>,
    ) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            source_name: source_name.to_string(),
            timepoint: timepoint.to_string(),
            report_datetime,
            fields,
        }
    }

    /// Value of a target field; None when the cell is missing or NULL.
    pub fn field(&self, field_name: &str) -> Option<&FieldValue> {
        self.fields.get(field_name).and_then(|v| v.as_ref())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Whether `name` is a base attribute or a declared target field.
    pub fn has_attr(&self, name: &str) -> bool {
        BASE_ATTRS.contains(&name) || self.fields.contains_key(name)
    }

    /// Any attribute as a plain value, base attributes included.
    pub fn attr_value(&self, name: &str) -> Option<FieldValue> {
        match name {
            "report_datetime" => Some(FieldValue::DateTime(self.report_datetime)),
            "timepoint" => Some(FieldValue::Str(self.timepoint.clone())),
            _ => self.fields.get(name).cloned().flatten(),
        }
    }

    /// Any attribute as a sort key, or None for a missing value.
    pub fn sort_value(&self, name: &str) -> Option<SortValue> {
        self.attr_value(name).map(|v| SortValue::from(&v))
    }
}
