//! Validates contract fixtures against frozen JSON schemas and checks the
//! client parsers accept them.

use std::path::Path;

use hairlytic_contract_tests::{fixture_path, schema_path};
use hairlytic_prediction_contract::{
    PredictionOutcome, parse_history_response, parse_login_response, parse_prediction_response,
};
use jsonschema::JSONSchema;
use serde_json::{Value, json};

fn load_json(path: &Path) -> Value {
    let raw = std::fs::read_to_string(path).expect("json file should be readable");
    serde_json::from_str(&raw).expect("json file should be valid")
}

fn compile_validator(name: &str) -> JSONSchema {
    let schema = load_json(&schema_path(name));
    JSONSchema::compile(&schema).expect("schema should compile")
}

fn fixture_bytes(name: &str) -> Vec<u8> {
    std::fs::read(fixture_path(name)).expect("fixture should be readable")
}

#[test]
fn prediction_fixtures_match_schema() {
    let validator = compile_validator("prediction-response");
    for fixture in [
        "prediction-response",
        "prediction-rejected",
        "prediction-rejected-null-detections",
    ] {
        assert!(
            validator.is_valid(&load_json(&fixture_path(fixture))),
            "{fixture} should validate against schema"
        );
    }
}

#[test]
fn prediction_schema_rejects_out_of_range_confidence() {
    let validator = compile_validator("prediction-response");
    let invalid = json!({
        "status": "accepted",
        "diagnosis": "Alopecia Detected",
        "detections": [{ "class_name": "patch", "confidence": 87 }],
    });
    assert!(!validator.is_valid(&invalid));
}

#[test]
fn history_fixture_matches_schema() {
    let validator = compile_validator("history-response");
    let fixture = load_json(&fixture_path("history-response"));
    assert!(
        validator.is_valid(&fixture),
        "history fixture should validate against schema"
    );
}

#[test]
fn login_fixture_matches_schema() {
    let validator = compile_validator("login-response");
    let fixture = load_json(&fixture_path("login-response"));
    assert!(
        validator.is_valid(&fixture),
        "login fixture should validate against schema"
    );
}

#[test]
fn client_parsers_accept_fixtures() {
    let accepted = parse_prediction_response(&fixture_bytes("prediction-response"))
        .expect("prediction fixture should parse");
    assert!(matches!(accepted.outcome(), PredictionOutcome::Detected { .. }));
    assert_eq!(accepted.detections()[0].confidence_label(), "87.0%");

    let rejected = parse_prediction_response(&fixture_bytes("prediction-rejected"))
        .expect("rejected fixture should parse");
    assert!(matches!(rejected.outcome(), PredictionOutcome::Rejected { .. }));

    let rejected_null = parse_prediction_response(&fixture_bytes(
        "prediction-rejected-null-detections",
    ))
    .expect("rejected fixture with null detections should parse");
    assert!(rejected_null.detections.is_none());
    assert!(matches!(
        rejected_null.outcome(),
        PredictionOutcome::Rejected { reason: "Not a scalp", .. }
    ));

    let history = parse_history_response(&fixture_bytes("history-response"))
        .expect("history fixture should parse");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].image_filename.as_deref(), Some("1729087509_crown.jpg"));
    assert!(history[1].image_filename.is_none());

    let login = parse_login_response(&fixture_bytes("login-response"))
        .expect("login fixture should parse");
    assert_eq!(login.token_type.as_deref(), Some("bearer"));
}
