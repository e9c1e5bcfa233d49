use std::cmp::Ordering;

use rusqlite::Connection;

use super::fieldset::Fieldset;
use super::refset::{Refset, BASE_ATTRS};
use super::RefsetError;
use crate::registry::Registry;
use crate::store;

/// Stable sort with missing sort keys placed last, ascending or descending.
pub(super) fn sort_refsets(refsets: &mut [Refset], field: &str, descending: bool) {
    refsets.sort_by(|a, b| match (a.sort_value(field), b.sort_value(field)) {
        (Some(x), Some(y)) => {
            let ord = x.cmp(&y);
            if descending {
                ord.reverse()
            } else {
                ord
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// A subject's ordered sequence of [`Refset`] snapshots: one per occurrence
/// of the visit source, each merging the target source's fields at that
/// timepoint. Default order is ascending `report_datetime`.
#[derive(Debug)]
pub struct LongitudinalRefset {
    pub subject_id: String,
    pub visit_source_name: String,
    pub source_name: String,
    refsets: Vec<Refset>,
    ordering: Option<(String, bool)>,
}

impl LongitudinalRefset {
    pub fn new(
        conn: &Connection,
        registry: &Registry,
        subject_id: &str,
        visit_source_name: &str,
        source_name: &str,
    ) -> Result<Self, RefsetError> {
        let visit_references = store::list_visit_references(conn, subject_id, visit_source_name)?;
        let mut refsets = Vec::with_capacity(visit_references.len());
        for visit_reference in &visit_references {
            refsets.push(Refset::new(
                conn,
                registry,
                subject_id,
                visit_reference.report_datetime,
                &visit_reference.timepoint,
                source_name,
            )?);
        }
        let mut this = Self {
            subject_id: subject_id.to_string(),
            visit_source_name: visit_source_name.to_string(),
            source_name: source_name.to_string(),
            refsets,
            ordering: None,
        };
        this.order_by("report_datetime", false)?;
        Ok(this)
    }

    /// Re-order the snapshots by any base attribute or target field.
    /// Snapshots with a missing sort key go last regardless of direction.
    pub fn order_by(&mut self, field: &str, descending: bool) -> Result<&mut Self, RefsetError> {
        if !self.is_orderable_by(field) {
            return Err(RefsetError::InvalidOrdering(field.to_string()));
        }
        sort_refsets(&mut self.refsets, field, descending);
        self.ordering = Some((field.to_string(), descending));
        Ok(self)
    }

    fn is_orderable_by(&self, field: &str) -> bool {
        BASE_ATTRS.contains(&field) || self.refsets.iter().any(|r| r.has_attr(field))
    }

    /// Project one column across the current snapshot order.
    pub fn fieldset(&self, field_name: &str) -> Result<Fieldset, RefsetError> {
        if self.refsets.is_empty() {
            return Err(RefsetError::NoRefsetsExist(self.subject_id.clone()));
        }
        if !self.refsets[0].has_attr(field_name) {
            return Err(RefsetError::UnknownField(field_name.to_string()));
        }
        Ok(Fieldset::new(field_name, self.refsets.clone()))
    }

    pub fn refsets(&self) -> &[Refset] {
        &self.refsets
    }

    pub fn ordering(&self) -> Option<(&str, bool)> {
        self.ordering.as_ref().map(|(f, d)| (f.as_str(), *d))
    }

    pub fn len(&self) -> usize {
        self.refsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refsets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Refset> {
        self.refsets.iter()
    }
}

impl<'a> IntoIterator for &'a LongitudinalRefset {
    type Item = &'a Refset;
    type IntoIter = std::slice::Iter<'a, Refset>;

    fn into_iter(self) -> Self::IntoIter {
        self.refsets.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldValue;
    use crate::registry::SourceConfig;
    use crate::store::open_memory_database;
    use crate::sync::update_references;
    use crate::testing::{month_dt, FakeRecord};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register(SourceConfig::new("study.subjectvisit", &["report_datetime"]).unwrap())
            .unwrap();
        registry
            .register(
                SourceConfig::new("study.crfone", &["field_str", "field_datetime", "field_int"])
                    .unwrap(),
            )
            .unwrap();
        registry
    }

    /// Three visits at months -3, -2, -1 with CRF field_str NEG, POS, POS.
    fn seed(conn: &Connection, registry: &Registry) {
        let values = ["NEG", "POS", "POS"];
        for (index, month) in [3u32, 2, 1].iter().enumerate() {
            let anchor = month_dt(*month);
            let timepoint = (index + 1).to_string();
            let visit = FakeRecord::visit("12345", &timepoint, anchor);
            update_references(conn, registry, &visit).unwrap();

            let mut crf = FakeRecord::crf_one("12345", &timepoint, anchor);
            crf.set_value("field_str", Some(FieldValue::Str(values[index].into())));
            crf.set_value("field_datetime", Some(FieldValue::DateTime(anchor)));
            update_references(conn, registry, &crf).unwrap();
        }
    }

    #[test]
    fn default_order_is_ascending_report_datetime() {
        let conn = open_memory_database().unwrap();
        let registry = registry();
        seed(&conn, &registry);

        let series =
            LongitudinalRefset::new(&conn, &registry, "12345", "study.subjectvisit", "study.crfone")
                .unwrap();
        let timepoints: Vec<&str> = series.iter().map(|r| r.timepoint.as_str()).collect();
        assert_eq!(timepoints, ["1", "2", "3"]);
        assert_eq!(series.ordering(), Some(("report_datetime", false)));
    }

    #[test]
    fn order_by_descending_reverses() {
        let conn = open_memory_database().unwrap();
        let registry = registry();
        seed(&conn, &registry);

        let mut series =
            LongitudinalRefset::new(&conn, &registry, "12345", "study.subjectvisit", "study.crfone")
                .unwrap();
        series.order_by("report_datetime", true).unwrap();
        let timepoints: Vec<&str> = series.iter().map(|r| r.timepoint.as_str()).collect();
        assert_eq!(timepoints, ["3", "2", "1"]);
    }

    #[test]
    fn order_by_target_field_is_allowed_and_unknown_is_not() {
        let conn = open_memory_database().unwrap();
        let registry = registry();
        seed(&conn, &registry);

        let mut series =
            LongitudinalRefset::new(&conn, &registry, "12345", "study.subjectvisit", "study.crfone")
                .unwrap();
        series.order_by("field_str", false).unwrap();
        let first = series.refsets()[0].field("field_str").unwrap();
        assert_eq!(first, &FieldValue::Str("NEG".into()));

        let err = series.order_by("blah", false).unwrap_err();
        assert!(matches!(err, RefsetError::InvalidOrdering(_)));
    }

    #[test]
    fn missing_sort_keys_go_last_in_both_directions() {
        let conn = open_memory_database().unwrap();
        let registry = registry();
        seed(&conn, &registry);

        // strip the middle snapshot's field_int so its sort key is missing
        let mut crf = FakeRecord::crf_one("12345", "2", month_dt(2));
        crf.set_value("field_int", None);
        crf.set_value("field_str", Some(FieldValue::Str("POS".into())));
        crf.set_value("field_datetime", Some(FieldValue::DateTime(month_dt(2))));
        update_references(&conn, &registry, &crf).unwrap();
        // give the other two snapshots int values
        for (timepoint, month, value) in [("1", 3u32, 20), ("3", 1, 10)] {
            let mut crf = FakeRecord::crf_one("12345", timepoint, month_dt(month));
            crf.set_value("field_int", Some(FieldValue::Int(value)));
            crf.set_value("field_str", Some(FieldValue::Str("POS".into())));
            crf.set_value("field_datetime", Some(FieldValue::DateTime(month_dt(month))));
            update_references(&conn, &registry, &crf).unwrap();
        }

        let mut series =
            LongitudinalRefset::new(&conn, &registry, "12345", "study.subjectvisit", "study.crfone")
                .unwrap();

        series.order_by("field_int", false).unwrap();
        let timepoints: Vec<&str> = series.iter().map(|r| r.timepoint.as_str()).collect();
        assert_eq!(timepoints, ["3", "1", "2"]);

        series.order_by("field_int", true).unwrap();
        let timepoints: Vec<&str> = series.iter().map(|r| r.timepoint.as_str()).collect();
        assert_eq!(timepoints, ["1", "3", "2"]);
    }

    #[test]
    fn fieldset_scenario_neg_pos_pos() {
        let conn = open_memory_database().unwrap();
        let registry = registry();
        seed(&conn, &registry);

        let mut series =
            LongitudinalRefset::new(&conn, &registry, "12345", "study.subjectvisit", "study.crfone")
                .unwrap();
        let values: Vec<Option<FieldValue>> =
            series.fieldset("field_str").unwrap().values().to_vec();
        assert_eq!(
            values,
            [
                Some(FieldValue::Str("NEG".into())),
                Some(FieldValue::Str("POS".into())),
                Some(FieldValue::Str("POS".into())),
            ]
        );

        series.order_by("report_datetime", true).unwrap();
        let values: Vec<Option<FieldValue>> =
            series.fieldset("field_str").unwrap().values().to_vec();
        assert_eq!(
            values,
            [
                Some(FieldValue::Str("POS".into())),
                Some(FieldValue::Str("POS".into())),
                Some(FieldValue::Str("NEG".into())),
            ]
        );
    }

    #[test]
    fn empty_series_has_no_fieldset() {
        let conn = open_memory_database().unwrap();
        let registry = registry();
        let series =
            LongitudinalRefset::new(&conn, &registry, "99999", "study.subjectvisit", "study.crfone")
                .unwrap();
        assert!(series.is_empty());
        let err = series.fieldset("field_str").unwrap_err();
        assert!(matches!(err, RefsetError::NoRefsetsExist(_)));
    }

    #[test]
    fn fieldset_of_unknown_field_is_rejected() {
        let conn = open_memory_database().unwrap();
        let registry = registry();
        seed(&conn, &registry);
        let series =
            LongitudinalRefset::new(&conn, &registry, "12345", "study.subjectvisit", "study.crfone")
                .unwrap();
        let err = series.fieldset("blah").unwrap_err();
        assert!(matches!(err, RefsetError::UnknownField(_)));
    }
}
