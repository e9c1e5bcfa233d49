//! Plain data description of a visit schedule: schedules own visits, visits
//! own CRFs and requisitions. Consumed by
//! [`Registry::derive_from_schedule`](crate::registry::Registry::derive_from_schedule)
//! to synthesize source declarations; nothing here talks to storage.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDescription {
    pub name: String,
    /// Source name of the visit record type anchoring every timepoint.
    pub visit_source_name: String,
    pub visits: Vec<VisitDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitDescription {
    pub code: String,
    pub crfs: Vec<CrfDescription>,
    pub requisitions: Vec<RequisitionDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrfDescription {
    pub source_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequisitionDescription {
    pub source_name: String,
    pub panel: String,
}

impl RequisitionDescription {
    /// Requisition declarations are keyed per panel.
    pub fn panel_source_name(&self) -> String {
        format!("{}.{}", self.source_name, self.panel).to_lowercase()
    }
}
