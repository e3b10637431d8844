//! Integration tests for the error taxonomy.

use lacquer_core::error::{ExecutionError, LacquerError, ParseError, ValidationError};

#[test]
fn parse_error_nests_under_lacquer_error() {
    let err: LacquerError = ParseError::SourceTooLarge {
        size: 11 * 1024 * 1024,
    }
    .into();
    assert!(err.to_string().contains("10 MiB"));
}

#[test]
fn execution_error_reports_step_identity() {
    let err = LacquerError::Execution(ExecutionError::Timeout {
        step: "fetch-page".to_string(),
        timeout_secs: 30,
    });
    assert!(err.to_string().contains("fetch-page"));
    assert!(err.to_string().contains("30s"));
}

#[test]
fn validation_error_field_variant_carries_field_name() {
    let err: LacquerError = ValidationError::Field {
        message: "must not be empty".to_string(),
        field: Some("topic".to_string()),
    }
    .into();
    match err {
        LacquerError::Validation(ValidationError::Field { field, .. }) => {
            assert_eq!(field.as_deref(), Some("topic"));
        }
        _ => panic!("expected a validation field error"),
    }
}
