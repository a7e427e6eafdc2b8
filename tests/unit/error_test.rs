//! Tests for error rendering and API status mapping

use std::time::Duration;

use counsellor_capacity::core::{CapacityError, Entity};
use counsellor_capacity::runtime::{status_for, ApiResponse};

#[test]
fn test_not_found_names_the_entity() {
    let err = CapacityError::counsellor_not_found(7);
    assert_eq!(err.to_string(), "counsellor 7 not found");
    assert_eq!(
        CapacityError::lead_not_found(3),
        CapacityError::NotFound {
            entity: Entity::Lead,
            id: 3
        }
    );
}

#[test]
fn test_capacity_exceeded_message() {
    let err = CapacityError::CapacityExceeded {
        counsellor_id: 2,
        max_capacity: 10,
    };
    assert_eq!(
        err.to_string(),
        "counsellor 2 has reached maximum capacity (10)"
    );
}

#[test]
fn test_status_mapping() {
    assert_eq!(status_for(&CapacityError::InvalidInput("x".into())), 400);
    assert_eq!(status_for(&CapacityError::lead_not_found(1)), 404);
    assert_eq!(
        status_for(&CapacityError::CapacityExceeded {
            counsellor_id: 1,
            max_capacity: 1
        }),
        409
    );
    assert_eq!(status_for(&CapacityError::Conflict("busy".into())), 409);
    assert_eq!(status_for(&CapacityError::ZeroCapacity(1)), 422);
    assert_eq!(status_for(&CapacityError::Cancelled), 499);
    assert_eq!(
        status_for(&CapacityError::TimedOut(Duration::from_millis(5))),
        504
    );
    assert_eq!(status_for(&CapacityError::Storage("disk".into())), 500);
}

#[test]
fn test_error_response_serializes_without_data() {
    let resp: ApiResponse<u64> = CapacityError::Conflict("held".into()).into();
    let json: serde_json::Value = serde_json::from_str(&resp.to_json()).unwrap();
    assert_eq!(json["status"], 409);
    assert_eq!(json["success"], false);
    assert!(json.get("data").is_none());
}
