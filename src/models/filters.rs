use super::enums::ValueKind;

/// Read-side listing filter over the cell store. All fields are optional and
/// combine with AND.
#[derive(Debug, Default, Clone)]
pub struct CellFilter {
    pub subject_id: Option<String>,
    pub source_name: Option<String>,
    pub timepoint: Option<String>,
    pub field_name: Option<String>,
    pub datatype: Option<ValueKind>,
}

impl CellFilter {
    pub fn for_subject(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: Some(subject_id.into()),
            ..Self::default()
        }
    }

    pub fn for_source(source_name: impl Into<String>) -> Self {
        Self {
            source_name: Some(source_name.into()),
            ..Self::default()
        }
    }
}
