//! In-memory fakes and datetime shorthands shared by unit tests.

use std::collections::BTreeMap;
use std::sync::Once;

use chrono::{NaiveDate, NaiveDateTime};
use tracing_subscriber::EnvFilter;

use crate::models::{Datatype, FieldValue};
use crate::populate::{PopulateError, RecordProvider};
use crate::schema::{SchemaInfo, SchemaIntrospect, SourceRecord};

static TRACING: Once = Once::new();

/// Route tracing output through the test harness, once per test binary.
/// `RUST_LOG` narrows the default crate-level debug filter.
pub(crate) fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("refstore=debug")),
            )
            .with_test_writer()
            .init();
    });
}

/// `2024-03-<day> <hour>:00:00`
pub(crate) fn dt(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// `2024-03-<day>`
pub(crate) fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

/// An anchor `months_ago` months before June 2024, at 10:00.
pub(crate) fn month_dt(months_ago: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6 - months_ago, 1)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

/// A hand-wired source record with settable fields.
#[derive(Debug, Clone)]
pub(crate) struct FakeRecord {
    source_name: String,
    subject_id: String,
    timepoint: String,
    report_datetime: NaiveDateTime,
    fields: BTreeMap<String, (Datatype, Option<FieldValue>)>,
    related_names: BTreeMap<String, String>,
}

impl FakeRecord {
    pub(crate) fn new(
        source_name: &str,
        subject_id: &str,
        timepoint: &str,
        report_datetime: NaiveDateTime,
    ) -> Self {
        Self {
            source_name: source_name.to_string(),
            subject_id: subject_id.to_string(),
            timepoint: timepoint.to_string(),
            report_datetime,
            fields: BTreeMap::new(),
            related_names: BTreeMap::new(),
        }
    }

    /// A `study.crfone` record with one field of each scalar kind, all NULL.
    pub(crate) fn crf_one(
        subject_id: &str,
        timepoint: &str,
        report_datetime: NaiveDateTime,
    ) -> Self {
        let mut record = Self::new("study.crfone", subject_id, timepoint, report_datetime);
        record.set_field("field_str", Datatype::Char, None);
        record.set_field("field_int", Datatype::Integer, None);
        record.set_field("field_date", Datatype::Date, None);
        record.set_field("field_datetime", Datatype::DateTime, None);
        record
    }

    /// A `study.subjectvisit` record anchored at `report_datetime`.
    pub(crate) fn visit(
        subject_id: &str,
        timepoint: &str,
        report_datetime: NaiveDateTime,
    ) -> Self {
        let mut record = Self::new("study.subjectvisit", subject_id, timepoint, report_datetime);
        record.set_field(
            "report_datetime",
            Datatype::DateTime,
            Some(FieldValue::DateTime(report_datetime)),
        );
        record
    }

    /// Set an already-declared field's value, keeping its datatype.
    pub(crate) fn set_value(&mut self, field_name: &str, value: Option<FieldValue>) {
        let (_, slot) = self
            .fields
            .get_mut(field_name)
            .unwrap_or_else(|| panic!("field '{field_name}' not declared"));
        *slot = value;
    }

    pub(crate) fn set_field(
        &mut self,
        field_name: &str,
        datatype: Datatype,
        value: Option<FieldValue>,
    ) {
        self.fields.insert(field_name.to_string(), (datatype, value));
    }

    pub(crate) fn set_related_name(&mut self, field_name: &str, related_name: &str) {
        self.related_names
            .insert(field_name.to_string(), related_name.to_string());
    }
}

impl SourceRecord for FakeRecord {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    fn subject_id(&self) -> &str {
        &self.subject_id
    }

    fn timepoint(&self) -> &str {
        &self.timepoint
    }

    fn report_datetime(&self) -> NaiveDateTime {
        self.report_datetime
    }

    fn field_datatype(&self, field_name: &str) -> Option<Datatype> {
        self.fields.get(field_name).map(|(d, _)| d.clone())
    }

    fn field_value(&self, field_name: &str) -> Option<Option<FieldValue>> {
        self.fields.get(field_name).map(|(_, v)| v.clone())
    }

    fn related_name(&self, field_name: &str) -> Option<String> {
        self.related_names.get(field_name).cloned()
    }
}

/// Schema introspection backed by a plain map.
#[derive(Debug, Default)]
pub(crate) struct FakeSchema {
    schemas: BTreeMap<String, SchemaInfo>,
}

impl FakeSchema {
    pub(crate) fn add(&mut self, source_name: &str, schema: SchemaInfo) {
        self.schemas.insert(source_name.to_string(), schema);
    }
}

impl SchemaIntrospect for FakeSchema {
    fn source_schema(&self, source_name: &str) -> Option<SchemaInfo> {
        self.schemas.get(source_name).cloned()
    }
}

/// Record provider backed by a plain map; unknown sources have no records.
#[derive(Debug, Default)]
pub(crate) struct TestRecords {
    records: BTreeMap<String, Vec<FakeRecord>>,
}

impl TestRecords {
    pub(crate) fn add(&mut self, source_name: &str, record: FakeRecord) {
        self.records
            .entry(source_name.to_string())
            .or_default()
            .push(record);
    }
}

impl RecordProvider for TestRecords {
    fn records(&self, source_name: &str) -> Result<Vec<Box<dyn SourceRecord>>, PopulateError> {
        Ok(self
            .records
            .get(source_name)
            .into_iter()
            .flatten()
            .map(|r| Box::new(r.clone()) as Box<dyn SourceRecord>)
            .collect())
    }
}
