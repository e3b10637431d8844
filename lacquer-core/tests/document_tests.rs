//! Integration tests for the workflow document model.

use lacquer_core::document::{
    AgentStepDef, BackoffStrategy, OutputFieldSchema, ParamType, RetryPolicy, StepDef, StepKind,
    Value, WorkflowDocument, WorkflowInput, WorkflowMetadata,
};
use std::collections::BTreeMap;

fn sample_document() -> WorkflowDocument {
    let mut inputs = BTreeMap::new();
    inputs.insert(
        "topic".to_string(),
        WorkflowInput {
            param_type: ParamType::String,
            required: true,
            default: None,
            pattern: None,
            minimum: None,
            maximum: None,
            r#enum: vec![],
        },
    );

    let mut outputs = BTreeMap::new();
    outputs.insert(
        "summary".to_string(),
        OutputFieldSchema {
            param_type: ParamType::String,
            description: Some("final summary".to_string()),
        },
    );

    WorkflowDocument {
        version: "1.0".to_string(),
        metadata: WorkflowMetadata {
            name: "sample".to_string(),
            ..Default::default()
        },
        inputs,
        state: BTreeMap::new(),
        agents: BTreeMap::new(),
        requirements: Default::default(),
        steps: vec![StepDef {
            id: "summarize".to_string(),
            kind: StepKind::Agent(AgentStepDef {
                agent: "writer".to_string(),
                prompt: "Summarize {{ inputs.topic }}".to_string(),
            }),
            with: BTreeMap::new(),
            outputs,
            condition: None,
            skip_if: None,
            updates: BTreeMap::new(),
            r#while: None,
            steps: vec![],
            timeout: None,
            retry: Some(RetryPolicy {
                max_attempts: 3,
                backoff: BackoffStrategy::Linear,
                initial_delay: std::time::Duration::from_secs(1),
            }),
            on_error: None,
        }],
        outputs: BTreeMap::new(),
        source_map: Default::default(),
    }
}

#[test]
fn document_step_lookup_finds_declared_step() {
    let doc = sample_document();
    let step = doc.step("summarize").expect("step should exist");
    match &step.kind {
        StepKind::Agent(agent_step) => assert_eq!(agent_step.agent, "writer"),
        _ => panic!("expected an agent step"),
    }
}

#[test]
fn document_step_lookup_misses_unknown_id() {
    let doc = sample_document();
    assert!(doc.step("does-not-exist").is_none());
}

#[test]
fn value_round_trips_through_json() {
    let mut map = BTreeMap::new();
    map.insert("count".to_string(), Value::Int(3));
    map.insert("label".to_string(), Value::String("ok".to_string()));
    let value = Value::Map(map);

    let json: serde_json::Value = value.clone().into();
    let back: Value = json.into();
    assert_eq!(value, back);
}

#[test]
fn value_truthy_rules_match_template_semantics() {
    assert!(!Value::Null.is_truthy());
    assert!(!Value::Bool(false).is_truthy());
    assert!(!Value::String("false".to_string()).is_truthy());
    assert!(Value::List(vec![Value::Int(1)]).is_truthy());
    assert!(!Value::List(vec![]).is_truthy());
}

#[test]
fn document_serializes_to_yaml_and_back() {
    let doc = sample_document();
    let yaml = serde_yaml::to_string(&doc).expect("serialize");
    let parsed: WorkflowDocument = serde_yaml::from_str(&yaml).expect("deserialize");
    assert_eq!(parsed.version, "1.0");
    assert_eq!(parsed.steps.len(), 1);
}
