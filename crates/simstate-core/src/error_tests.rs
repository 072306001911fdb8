//! Tests for `error` module

use super::error::*;

#[test]
fn test_error_codes_are_unique() {
    // Arrange
    let errors: Vec<Error> = vec![
        Error::InvalidSalience(0),
        Error::EventNotFound(1),
        Error::ActionInFlight {
            agent_id: "a".into(),
            plan_id: "p".into(),
        },
        Error::StaleConfirmation {
            agent_id: "a".into(),
            reason: "r".into(),
        },
        Error::PlanExpired {
            agent_id: "a".into(),
            plan_id: "p".into(),
        },
        Error::DecisionTimeout {
            agent_id: "a".into(),
            timeout_ms: 10,
        },
        Error::AgentNotFound("a".into()),
        Error::AgentExists("a".into()),
        Error::RoomMismatch {
            x: 0,
            y: 0,
            given: "hall".into(),
            derived: None,
        },
        Error::PlanCancelled("a".into()),
        Error::Decision("boom".into()),
        Error::Storage("disk".into()),
        Error::Serialization("json".into()),
        Error::Io(std::io::Error::other("io")),
        Error::Config("bad".into()),
    ];

    // Act
    let codes: Vec<&str> = errors.iter().map(Error::code).collect();

    // Assert
    let mut unique = codes.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(codes.len(), unique.len(), "Error codes must be unique");
    for code in &codes {
        assert!(code.starts_with("SIM-"), "Code {code} should start with SIM-");
    }
}

#[test]
fn test_error_display_includes_code() {
    let err = Error::InvalidSalience(11);

    let display = err.to_string();

    assert!(display.contains("[SIM-001]"));
    assert!(display.contains("11"));
}

#[test]
fn test_protocol_errors_are_warnings() {
    let in_flight = Error::ActionInFlight {
        agent_id: "a1".into(),
        plan_id: "p".into(),
    };
    let stale = Error::StaleConfirmation {
        agent_id: "a1".into(),
        reason: "no pending action".into(),
    };

    assert!(in_flight.is_warning());
    assert!(stale.is_warning());
    assert!(!Error::InvalidSalience(0).is_warning());
}

#[test]
fn test_validation_errors_are_not_recoverable() {
    assert!(!Error::InvalidSalience(42).is_recoverable());
    assert!(!Error::Config("x".into()).is_recoverable());
    assert!(Error::PlanExpired {
        agent_id: "a".into(),
        plan_id: "p".into()
    }
    .is_recoverable());
}

#[test]
fn test_serde_json_error_converts_to_serialization() {
    let json_err = serde_json::from_str::<u32>("not json").unwrap_err();

    let err: Error = json_err.into();

    assert_eq!(err.code(), "SIM-013");
}
