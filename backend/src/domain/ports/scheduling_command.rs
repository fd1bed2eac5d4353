//! Driving port for scheduling mutations.
//!
//! Every method takes the calling technician explicitly. Ownership failures
//! are reported as `not_found` so callers cannot probe for other
//! technicians' records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    EquipmentDraft, Error, SchedulingId, SchedulingView, SparePartDraft, TechnicianId,
};

/// Request to book a new visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSchedulingRequest {
    pub farm_name: String,
    pub client_name: String,
    pub client_email: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub service_description: Option<String>,
    /// Priority label; absent or unrecognised values fall back to `MEDIUM`.
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub equipment: Vec<EquipmentDraft>,
    #[serde(default)]
    pub spare_parts: Vec<SparePartDraft>,
}

/// Partial update of an existing visit.
///
/// Absent fields are left untouched. Unrecognised `status` or `priority`
/// labels are ignored. A supplied child list, even an empty one, replaces
/// the stored list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateSchedulingRequest {
    pub farm_name: Option<String>,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub service_description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub equipment: Option<Vec<EquipmentDraft>>,
    pub spare_parts: Option<Vec<SparePartDraft>>,
}

/// Client rating and comment for a completed visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFeedbackRequest {
    /// Score in `1..=5`.
    pub rating: i64,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Driving port for scheduling write operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchedulingCommand: Send + Sync {
    /// Create a `PENDING` record owned by `caller`.
    ///
    /// Fails with `invalid_request` when `scheduled_at` is in the past or a
    /// field is malformed, and with `not_found` when `caller` is unknown.
    async fn create(
        &self,
        request: CreateSchedulingRequest,
        caller: TechnicianId,
    ) -> Result<SchedulingView, Error>;

    /// Apply a partial update to a record owned by `caller`.
    async fn update(
        &self,
        id: SchedulingId,
        request: UpdateSchedulingRequest,
        caller: TechnicianId,
    ) -> Result<SchedulingView, Error>;

    /// Delete a record owned by `caller` together with its children.
    async fn delete(&self, id: SchedulingId, caller: TechnicianId) -> Result<(), Error>;

    /// Attach client feedback to a completed record.
    ///
    /// Not scoped to a technician. Fails with `conflict` unless the record
    /// is `COMPLETED`.
    async fn add_client_feedback(
        &self,
        id: SchedulingId,
        request: ClientFeedbackRequest,
    ) -> Result<SchedulingView, Error>;
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn create_request_defaults_optional_collections() {
        let request: CreateSchedulingRequest = serde_json::from_value(json!({
            "farmName": "Sítio Alegre",
            "clientName": "Ana",
            "clientEmail": "ana@farm.example",
            "address": "Rural Road 4",
            "latitude": -21.5,
            "longitude": -48.1,
            "scheduledAt": "2030-05-01T09:00:00Z"
        }))
        .expect("minimal create request");
        assert!(request.equipment.is_empty());
        assert!(request.priority.is_none());
    }

    #[rstest]
    fn update_request_distinguishes_empty_list_from_absent() {
        let cleared: UpdateSchedulingRequest =
            serde_json::from_value(json!({ "equipment": [] })).expect("update request");
        assert_eq!(cleared.equipment, Some(Vec::new()));
        assert!(cleared.spare_parts.is_none());
    }
}
