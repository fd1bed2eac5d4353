//! Port error to domain error mapping for the lifecycle service.

use serde_json::json;
use tracing::error;

use crate::domain::ports::{SchedulingRepositoryError, TechnicianRepositoryError};
use crate::domain::{
    Error, FeedbackNotAllowedError, SchedulingId, SchedulingValidationError, StatusTransitionError,
    TechnicianId,
};

pub(super) fn map_repository_error(failure: SchedulingRepositoryError) -> Error {
    match failure {
        SchedulingRepositoryError::Connection { message } => {
            error!(error = %message, "scheduling store unreachable");
            Error::service_unavailable(format!("scheduling store unavailable: {message}"))
        }
        SchedulingRepositoryError::Query { message } => {
            error!(error = %message, "scheduling store query failed");
            Error::internal(format!("scheduling store error: {message}"))
        }
        SchedulingRepositoryError::Missing { id } => scheduling_not_found(SchedulingId::new(id)),
    }
}

pub(super) fn map_technician_error(failure: TechnicianRepositoryError) -> Error {
    match failure {
        TechnicianRepositoryError::Connection { message } => {
            error!(error = %message, "technician store unreachable");
            Error::service_unavailable(format!("technician store unavailable: {message}"))
        }
        TechnicianRepositoryError::Query { message } => {
            error!(error = %message, "technician store query failed");
            Error::internal(format!("technician store error: {message}"))
        }
    }
}

pub(super) fn map_validation_error(failure: SchedulingValidationError) -> Error {
    Error::invalid_request(failure.to_string())
}

pub(super) fn map_transition_error(failure: StatusTransitionError) -> Error {
    Error::conflict(failure.to_string()).with_details(json!({
        "from": failure.from,
        "to": failure.to,
    }))
}

pub(super) fn map_feedback_error(failure: FeedbackNotAllowedError) -> Error {
    Error::conflict(failure.to_string()).with_details(json!({ "status": failure.status }))
}

/// Absent and foreign records share this error so existence does not leak.
pub(super) fn scheduling_not_found(id: SchedulingId) -> Error {
    Error::not_found(format!("scheduling {id} not found"))
}

pub(super) fn technician_not_found(id: &TechnicianId) -> Error {
    Error::not_found(format!("technician {id} not found"))
}
