//! Tests for the domain error payload and its serde contract.

use super::*;
use rstest::{fixture, rstest};
use serde_json::json;

#[fixture]
fn conflict_error() -> Error {
    Error::conflict("feedback requires a completed visit")
        .with_details(json!({ "status": "PENDING" }))
}

#[rstest]
#[case::invalid(Error::invalid_request("bad"), ErrorCode::InvalidRequest)]
#[case::not_found(Error::not_found("gone"), ErrorCode::NotFound)]
#[case::conflict(Error::conflict("clash"), ErrorCode::Conflict)]
#[case::unavailable(Error::service_unavailable("down"), ErrorCode::ServiceUnavailable)]
#[case::internal(Error::internal("boom"), ErrorCode::InternalError)]
fn constructors_set_expected_code(#[case] error: Error, #[case] expected: ErrorCode) {
    assert_eq!(error.code(), expected);
}

#[rstest]
fn try_new_rejects_empty_messages() {
    let result = Error::try_new(ErrorCode::InvalidRequest, "   ");
    assert!(matches!(result, Err(ErrorValidationError::EmptyMessage)));
}

#[rstest]
fn serialises_code_in_snake_case(conflict_error: Error) {
    let value = serde_json::to_value(&conflict_error).expect("serialise error");
    assert_eq!(value["code"], "conflict");
    assert_eq!(value["message"], "feedback requires a completed visit");
    assert_eq!(value["details"]["status"], "PENDING");
}

#[rstest]
fn deserialising_blank_message_fails() {
    let payload = json!({ "code": "not_found", "message": "  " });
    let result: Result<Error, _> = serde_json::from_value(payload);
    assert!(result.is_err(), "blank messages must be rejected");
}

#[rstest]
fn round_trips_through_json(conflict_error: Error) {
    let encoded = serde_json::to_string(&conflict_error).expect("serialise error");
    let decoded: Error = serde_json::from_str(&encoded).expect("deserialise error");
    assert_eq!(decoded, conflict_error);
}
