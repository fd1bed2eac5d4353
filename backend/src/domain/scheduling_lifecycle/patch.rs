//! Partial update application.
//!
//! Every supplied field is validated before any is written, so a rejected
//! request leaves the record as it was loaded.

use chrono::{DateTime, Utc};

use crate::domain::ports::UpdateSchedulingRequest;
use crate::domain::{
    ChildReplacement, Error, SchedulingRecord, SchedulingStatus, ServicePriority, limit_text,
    parse_optional, require_text, validate_coordinates, validate_email, validate_not_in_past,
};

use super::mapping::{map_transition_error, map_validation_error};

/// What an update changed beyond the scalar fields.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct AppliedPatch {
    /// A recognised status label was supplied, changed or not.
    pub status_supplied: bool,
    /// New status, when the update moved the record.
    pub status_changed: Option<SchedulingStatus>,
    /// Child collections to replace.
    pub children: ChildReplacement,
}

pub(super) fn apply_update(
    record: &mut SchedulingRecord,
    request: UpdateSchedulingRequest,
    now: DateTime<Utc>,
) -> Result<AppliedPatch, Error> {
    validate_request(record, &request, now).map_err(map_validation_error)?;

    let UpdateSchedulingRequest {
        farm_name,
        client_name,
        client_email,
        address,
        latitude,
        longitude,
        scheduled_at,
        service_description,
        status,
        priority,
        equipment,
        spare_parts,
    } = request;

    let status = parse_optional::<SchedulingStatus>(status.as_deref());
    let mut status_changed = None;
    if let Some(next) = status {
        if record.transition_to(next, now).map_err(map_transition_error)? {
            status_changed = Some(next);
        }
    }

    if let Some(priority) = parse_optional::<ServicePriority>(priority.as_deref()) {
        record.priority = priority;
    }
    replace_if_some(&mut record.farm_name, farm_name);
    replace_if_some(&mut record.client_name, client_name);
    replace_if_some(&mut record.client_email, client_email);
    replace_if_some(&mut record.address, address);
    replace_if_some(&mut record.latitude, latitude);
    replace_if_some(&mut record.longitude, longitude);
    replace_if_some(&mut record.scheduled_at, scheduled_at);
    if service_description.is_some() {
        record.service_description = service_description;
    }

    Ok(AppliedPatch {
        status_supplied: status.is_some(),
        status_changed,
        children: ChildReplacement {
            equipment,
            spare_parts,
        },
    })
}

fn replace_if_some<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn validate_request(
    record: &SchedulingRecord,
    request: &UpdateSchedulingRequest,
    now: DateTime<Utc>,
) -> Result<(), crate::domain::SchedulingValidationError> {
    if let Some(scheduled_at) = request.scheduled_at {
        validate_not_in_past(scheduled_at, now)?;
    }
    if let Some(value) = &request.farm_name {
        require_text("farm name", value)?;
    }
    if let Some(value) = &request.client_name {
        require_text("client name", value)?;
    }
    if let Some(value) = &request.client_email {
        validate_email(value)?;
    }
    if let Some(value) = &request.address {
        require_text("address", value)?;
    }
    if request.latitude.is_some() || request.longitude.is_some() {
        validate_coordinates(
            request.latitude.unwrap_or(record.latitude),
            request.longitude.unwrap_or(record.longitude),
        )?;
    }
    limit_text("service description", request.service_description.as_deref())?;
    for item in request.equipment.iter().flatten() {
        item.validate()?;
    }
    for item in request.spare_parts.iter().flatten() {
        item.validate()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::{EquipmentDraft, ErrorCode, SchedulingId, Technician, TechnicianId};

    #[fixture]
    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[fixture]
    fn record(now: DateTime<Utc>) -> SchedulingRecord {
        SchedulingRecord {
            id: SchedulingId::new(11),
            technician: Technician {
                id: TechnicianId::random(),
                username: "tec".to_owned(),
                full_name: "Tec Nico".to_owned(),
                email: "tec@coop.example".to_owned(),
            },
            farm_name: "Fazenda Velha".to_owned(),
            client_name: "Carlos".to_owned(),
            client_email: "carlos@farm.example".to_owned(),
            address: "Km 3".to_owned(),
            latitude: -20.0,
            longitude: -47.0,
            scheduled_at: now + TimeDelta::days(1),
            completed_at: None,
            service_description: Some("Pump check".to_owned()),
            status: SchedulingStatus::InProgress,
            priority: ServicePriority::High,
            client_rating: None,
            client_feedback: None,
            equipment: Vec::new(),
            spare_parts: Vec::new(),
        }
    }

    #[rstest]
    fn status_only_update_leaves_other_fields(mut record: SchedulingRecord, now: DateTime<Utc>) {
        let before = record.clone();
        let applied = apply_update(
            &mut record,
            UpdateSchedulingRequest {
                status: Some("COMPLETED".to_owned()),
                ..UpdateSchedulingRequest::default()
            },
            now,
        )
        .expect("valid update");

        assert!(applied.status_supplied);
        assert_eq!(applied.status_changed, Some(SchedulingStatus::Completed));
        assert_eq!(applied.children, ChildReplacement::keep());
        assert_eq!(record.completed_at, Some(now));
        assert_eq!(record.farm_name, before.farm_name);
        assert_eq!(record.client_name, before.client_name);
        assert_eq!(record.address, before.address);
        assert_eq!(record.service_description, before.service_description);
        assert_eq!(record.priority, before.priority);
    }

    #[rstest]
    fn unknown_labels_are_ignored(mut record: SchedulingRecord, now: DateTime<Utc>) {
        let applied = apply_update(
            &mut record,
            UpdateSchedulingRequest {
                status: Some("ARCHIVED".to_owned()),
                priority: Some("URGENT".to_owned()),
                ..UpdateSchedulingRequest::default()
            },
            now,
        )
        .expect("unknown labels are not errors");

        assert!(!applied.status_supplied);
        assert_eq!(record.status, SchedulingStatus::InProgress);
        assert_eq!(record.priority, ServicePriority::High);
    }

    #[rstest]
    fn past_reschedule_is_rejected_without_side_effects(
        mut record: SchedulingRecord,
        now: DateTime<Utc>,
    ) {
        let before = record.clone();
        let err = apply_update(
            &mut record,
            UpdateSchedulingRequest {
                scheduled_at: Some(now - TimeDelta::seconds(1)),
                farm_name: Some("New name".to_owned()),
                ..UpdateSchedulingRequest::default()
            },
            now,
        )
        .expect_err("past reschedule");

        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        assert_eq!(record, before);
    }

    #[rstest]
    fn backwards_transition_is_a_conflict(mut record: SchedulingRecord, now: DateTime<Utc>) {
        let err = apply_update(
            &mut record,
            UpdateSchedulingRequest {
                status: Some("pending".to_owned()),
                ..UpdateSchedulingRequest::default()
            },
            now,
        )
        .expect_err("in progress cannot go back to pending");
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[rstest]
    fn supplied_empty_list_replaces_children(mut record: SchedulingRecord, now: DateTime<Utc>) {
        let applied = apply_update(
            &mut record,
            UpdateSchedulingRequest {
                equipment: Some(Vec::new()),
                ..UpdateSchedulingRequest::default()
            },
            now,
        )
        .expect("valid update");
        assert_eq!(applied.children.equipment, Some(Vec::<EquipmentDraft>::new()));
        assert!(applied.children.spare_parts.is_none());
    }

    #[rstest]
    fn single_coordinate_is_checked_against_stored_pair(
        mut record: SchedulingRecord,
        now: DateTime<Utc>,
    ) {
        let err = apply_update(
            &mut record,
            UpdateSchedulingRequest {
                longitude: Some(200.0),
                ..UpdateSchedulingRequest::default()
            },
            now,
        )
        .expect_err("longitude out of range");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }
}
