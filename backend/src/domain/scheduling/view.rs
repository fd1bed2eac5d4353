//! Read-side projections of a scheduling record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    EquipmentItem, SchedulingId, SchedulingRecord, SchedulingStatus, ServicePriority,
    SparePartItem, TechnicianId,
};

/// Reverse-geocoded description of a coordinate pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDetails {
    /// Queried latitude.
    pub latitude: f64,
    /// Queried longitude.
    pub longitude: f64,
    /// Provider display name.
    pub display_name: Option<String>,
    /// City, town, or village.
    pub city: Option<String>,
    /// State or region.
    pub state: Option<String>,
    /// Country name.
    pub country: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Single-line address assembled from the parts above.
    pub formatted_address: Option<String>,
}

impl LocationDetails {
    /// Details with only the coordinates set.
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            ..Self::default()
        }
    }
}

/// Fully materialised read view of a scheduling record.
///
/// This is the cached representation. Optional fields serialise as `null`
/// rather than being skipped so a cache hit and a fresh read produce the same
/// JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingView {
    /// Record identifier.
    pub id: SchedulingId,
    /// Owning technician.
    pub technician_id: TechnicianId,
    /// Owner's login name.
    pub technician_username: String,
    /// Owner's display name.
    pub technician_name: String,
    /// Owner's contact address.
    pub technician_email: String,
    /// Farm visited.
    pub farm_name: String,
    /// Client contact name.
    pub client_name: String,
    /// Client contact email.
    pub client_email: String,
    /// Street address as entered.
    pub address: String,
    /// Visit latitude.
    pub latitude: f64,
    /// Visit longitude.
    pub longitude: f64,
    /// Booked start of the visit.
    pub scheduled_at: DateTime<Utc>,
    /// Set when the visit reached `COMPLETED`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Work to be done.
    pub service_description: Option<String>,
    /// Lifecycle status.
    pub status: SchedulingStatus,
    /// Service priority.
    pub priority: ServicePriority,
    /// Client rating, 1 to 5.
    pub client_rating: Option<u8>,
    /// Client comment left with the rating.
    pub client_feedback: Option<String>,
    /// Equipment to service.
    pub equipment: Vec<EquipmentItem>,
    /// Spare parts to bring.
    pub spare_parts: Vec<SparePartItem>,
    /// Reverse-geocoded location, when the lookup succeeded in time.
    pub location_details: Option<LocationDetails>,
}

impl SchedulingView {
    /// Project a record, attaching enrichment output when available.
    pub fn from_record(record: &SchedulingRecord, location: Option<LocationDetails>) -> Self {
        Self {
            id: record.id,
            technician_id: record.technician.id,
            technician_username: record.technician.username.clone(),
            technician_name: record.technician.full_name.clone(),
            technician_email: record.technician.email.clone(),
            farm_name: record.farm_name.clone(),
            client_name: record.client_name.clone(),
            client_email: record.client_email.clone(),
            address: record.address.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            scheduled_at: record.scheduled_at,
            completed_at: record.completed_at,
            service_description: record.service_description.clone(),
            status: record.status,
            priority: record.priority,
            client_rating: record.client_rating.map(|rating| rating.get()),
            client_feedback: record.client_feedback.clone(),
            equipment: record.equipment.clone(),
            spare_parts: record.spare_parts.clone(),
            location_details: location,
        }
    }
}

/// Store-side aggregates for one technician.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianPerformance {
    /// Technician the aggregates describe.
    pub technician_id: TechnicianId,
    /// Technician display name.
    pub technician_name: String,
    /// Mean client rating over rated visits.
    pub average_rating: Option<f64>,
    /// Number of completed visits.
    pub completed_visits: u64,
    /// Mean hours between `scheduled_at` and `completed_at`.
    pub average_visit_duration_hours: Option<f64>,
}

/// Aggregates as computed by the store, before technician fields are joined.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerformanceAggregates {
    /// Mean client rating.
    pub average_rating: Option<f64>,
    /// Completed visit count.
    pub completed_visits: u64,
    /// Mean visit duration in hours.
    pub average_visit_duration_hours: Option<f64>,
}
