//! Deriving source declarations from a visit-schedule description.

use super::{Registry, RegistryError, SourceConfig};
use crate::schedule::ScheduleDescription;

/// Fields every requisition declaration mirrors.
pub const REQUISITION_FIELDS: [&str; 4] = [
    "requisition_datetime",
    "panel",
    "is_drawn",
    "reason_not_drawn",
];

impl Registry {
    /// Walk a schedule description and synthesize or merge declarations:
    /// the visit source and every CRF get at least `report_datetime`;
    /// requisitions are keyed `"<model>.<panel>"` and get the requisition
    /// fields plus any caller extras.
    ///
    /// Unlike `register`, an existing declaration is merged, not rejected,
    /// so the derivation can run repeatedly.
    pub fn derive_from_schedule(
        &mut self,
        schedule: &ScheduleDescription,
        extra_requisition_fields: &[&str],
    ) -> Result<(), RegistryError> {
        self.merge(&schedule.visit_source_name, &["report_datetime"])?;
        for visit in &schedule.visits {
            for crf in &visit.crfs {
                self.merge(&crf.source_name, &["report_datetime"])?;
            }
            for requisition in &visit.requisitions {
                let mut fields: Vec<&str> = REQUISITION_FIELDS.to_vec();
                for &field_name in extra_requisition_fields {
                    if !fields.contains(&field_name) {
                        fields.push(field_name);
                    }
                }
                self.merge(&requisition.panel_source_name(), &fields)?;
            }
        }
        tracing::debug!(
            schedule = %schedule.name,
            sources = self.len(),
            "derived reference configs from schedule"
        );
        Ok(())
    }

    fn merge(&mut self, source_name: &str, fields: &[&str]) -> Result<(), RegistryError> {
        let source_name = source_name.to_lowercase();
        if let Ok(existing) = self.get(&source_name) {
            let mut merged = existing.clone();
            merged.merge_fields(fields);
            self.reregister(merged)
        } else {
            self.register(SourceConfig::new(&source_name, fields)?)
        }
    }
}
