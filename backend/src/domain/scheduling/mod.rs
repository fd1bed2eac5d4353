//! Scheduling record aggregate and its owned child items.
//!
//! A [`SchedulingRecord`] is a single field-service visit booking owned by
//! exactly one technician. Equipment and spare parts belong to one record
//! and are replaced wholesale, never merged.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod status;
mod validation;
mod view;

pub use status::{
    SchedulingStatus, ServicePriority, UnknownLabelError, parse_optional, parse_or_default,
};
pub use view::{LocationDetails, PerformanceAggregates, SchedulingView, TechnicianPerformance};
pub use validation::{
    FREE_TEXT_MAX, QUANTITY_MAX, SHORT_TEXT_MAX, SchedulingValidationError, limit_short_text,
    limit_text, require_text, validate_coordinates, validate_email, validate_not_in_past,
};

/// Store-assigned identifier of a scheduling record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchedulingId(i64);

impl SchedulingId {
    /// Wrap a raw identifier.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw identifier value.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SchedulingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SchedulingId {
    type Err = std::num::ParseIntError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.trim().parse().map(Self)
    }
}

/// Stable technician identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TechnicianId(Uuid);

impl TechnicianId {
    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a new random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TechnicianId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Technician identity and display fields copied into read views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technician {
    /// Identifier.
    pub id: TechnicianId,
    /// Login name.
    pub username: String,
    /// Full display name.
    pub full_name: String,
    /// Contact address.
    pub email: String,
}

/// Equipment to be serviced during a visit, as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentDraft {
    /// Equipment name (required).
    pub name: String,
    /// Optional serial number.
    pub serial_number: Option<String>,
    /// Optional description.
    pub description: Option<String>,
}

impl EquipmentDraft {
    /// Validate the draft.
    pub fn validate(&self) -> Result<(), SchedulingValidationError> {
        require_text("equipment name", &self.name)?;
        limit_short_text("serial number", self.serial_number.as_deref())?;
        limit_text("equipment description", self.description.as_deref())
    }
}

/// Spare part to bring to a visit, as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparePartDraft {
    /// Part name (required).
    pub name: String,
    /// Optional manufacturer part number.
    pub part_number: Option<String>,
    /// Quantity, at least one.
    pub quantity: u32,
}

impl SparePartDraft {
    /// Validate the draft.
    pub fn validate(&self) -> Result<(), SchedulingValidationError> {
        require_text("spare part name", &self.name)?;
        limit_short_text("part number", self.part_number.as_deref())?;
        if self.quantity == 0 {
            return Err(SchedulingValidationError::NonPositiveQuantity);
        }
        if self.quantity > QUANTITY_MAX {
            return Err(SchedulingValidationError::QuantityTooLarge {
                value: self.quantity,
                max: QUANTITY_MAX,
            });
        }
        Ok(())
    }
}

/// Persisted equipment item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentItem {
    /// Store-assigned identifier.
    pub id: i64,
    /// Equipment name.
    pub name: String,
    /// Optional serial number.
    pub serial_number: Option<String>,
    /// Optional description.
    pub description: Option<String>,
}

/// Persisted spare part item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SparePartItem {
    /// Store-assigned identifier.
    pub id: i64,
    /// Part name.
    pub name: String,
    /// Optional manufacturer part number.
    pub part_number: Option<String>,
    /// Quantity, at least one.
    pub quantity: u32,
}

impl From<&EquipmentItem> for EquipmentDraft {
    fn from(item: &EquipmentItem) -> Self {
        Self {
            name: item.name.clone(),
            serial_number: item.serial_number.clone(),
            description: item.description.clone(),
        }
    }
}

impl From<&SparePartItem> for SparePartDraft {
    fn from(item: &SparePartItem) -> Self {
        Self {
            name: item.name.clone(),
            part_number: item.part_number.clone(),
            quantity: item.quantity,
        }
    }
}

/// Client satisfaction score in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct ClientRating(u8);

impl ClientRating {
    /// Validate and wrap a rating.
    ///
    /// # Examples
    /// ```
    /// use scheduler_backend::domain::ClientRating;
    ///
    /// assert_eq!(ClientRating::new(5).map(ClientRating::get), Ok(5));
    /// assert!(ClientRating::new(0).is_err());
    /// ```
    pub fn new(value: i64) -> Result<Self, SchedulingValidationError> {
        u8::try_from(value)
            .ok()
            .filter(|rating| (1..=5).contains(rating))
            .map(Self)
            .ok_or(SchedulingValidationError::RatingOutOfRange { value })
    }

    /// Raw score.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for ClientRating {
    type Error = SchedulingValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ClientRating> for u8 {
    fn from(value: ClientRating) -> Self {
        value.0
    }
}

/// Status change refused by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move scheduling from {from} to {to}")]
pub struct StatusTransitionError {
    /// Current status.
    pub from: SchedulingStatus,
    /// Requested status.
    pub to: SchedulingStatus,
}

/// Feedback attached to a record that has not been completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("feedback can only be added to completed schedulings (current status {status})")]
pub struct FeedbackNotAllowedError {
    /// Status at the time of the attempt.
    pub status: SchedulingStatus,
}

/// Authoritative scheduling record as loaded from the store.
///
/// ## Invariants
/// - `completed_at` is set if and only if `status` has reached `Completed`.
/// - `client_rating` and `client_feedback` are only set on completed records.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingRecord {
    /// Store-assigned identifier.
    pub id: SchedulingId,
    /// Owning technician.
    pub technician: Technician,
    /// Farm being visited.
    pub farm_name: String,
    /// Client contact name.
    pub client_name: String,
    /// Client contact email.
    pub client_email: String,
    /// Street address.
    pub address: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    /// Planned visit time.
    pub scheduled_at: DateTime<Utc>,
    /// Completion time, stamped once on entering `Completed`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Free-text service description.
    pub service_description: Option<String>,
    /// Lifecycle state.
    pub status: SchedulingStatus,
    /// Urgency.
    pub priority: ServicePriority,
    /// Client score, post-completion only.
    pub client_rating: Option<ClientRating>,
    /// Client comments, post-completion only.
    pub client_feedback: Option<String>,
    /// Equipment to service.
    pub equipment: Vec<EquipmentItem>,
    /// Spare parts to bring.
    pub spare_parts: Vec<SparePartItem>,
}

impl SchedulingRecord {
    /// Whether `technician_id` owns this record.
    pub fn is_owned_by(&self, technician_id: &TechnicianId) -> bool {
        self.technician.id == *technician_id
    }

    /// Move to `next`, stamping `completed_at` on the first entry into
    /// `Completed`. Returns whether the status changed.
    ///
    /// # Errors
    ///
    /// Returns [`StatusTransitionError`] when the state machine forbids the
    /// move.
    pub fn transition_to(
        &mut self,
        next: SchedulingStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, StatusTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(StatusTransitionError {
                from: self.status,
                to: next,
            });
        }
        if self.status == next {
            return Ok(false);
        }
        if next == SchedulingStatus::Completed && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        self.status = next;
        Ok(true)
    }

    /// Attach a client rating and optional comment.
    ///
    /// # Errors
    ///
    /// Returns [`FeedbackNotAllowedError`] unless the record is completed.
    pub fn attach_feedback(
        &mut self,
        rating: ClientRating,
        feedback: Option<String>,
    ) -> Result<(), FeedbackNotAllowedError> {
        if self.status != SchedulingStatus::Completed {
            return Err(FeedbackNotAllowedError {
                status: self.status,
            });
        }
        self.client_rating = Some(rating);
        self.client_feedback = feedback;
        Ok(())
    }
}

/// Validated input for the first write of a new record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSchedulingRecord {
    /// Owning technician.
    pub technician_id: TechnicianId,
    /// Farm being visited.
    pub farm_name: String,
    /// Client contact name.
    pub client_name: String,
    /// Client contact email.
    pub client_email: String,
    /// Street address.
    pub address: String,
    /// WGS84 latitude.
    pub latitude: f64,
    /// WGS84 longitude.
    pub longitude: f64,
    /// Planned visit time.
    pub scheduled_at: DateTime<Utc>,
    /// Free-text service description.
    pub service_description: Option<String>,
    /// Initial status, always `Pending` from the lifecycle service.
    pub status: SchedulingStatus,
    /// Urgency.
    pub priority: ServicePriority,
    /// Equipment to persist with the record.
    pub equipment: Vec<EquipmentDraft>,
    /// Spare parts to persist with the record.
    pub spare_parts: Vec<SparePartDraft>,
}

/// Child collections to replace alongside a record update.
///
/// `None` leaves the stored collection untouched; `Some` (even empty)
/// replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildReplacement {
    /// Replacement equipment list.
    pub equipment: Option<Vec<EquipmentDraft>>,
    /// Replacement spare part list.
    pub spare_parts: Option<Vec<SparePartDraft>>,
}

impl ChildReplacement {
    /// Leave both child collections untouched.
    pub fn keep() -> Self {
        Self::default()
    }
}
