//! Serialization roundtrip tests for gantry-core types.

use chrono::Utc;
use gantry_core::events::*;
use gantry_core::ids::*;
use gantry_core::run::*;
use gantry_core::workflow::*;
use pretty_assertions::assert_eq;

#[test]
fn test_run_queued_payload_roundtrip() {
    let payload = RunQueuedPayload {
        run_id: RunId::new(),
        workflow_name: "ci".to_string(),
        trigger: TriggerEvent {
            kind: TriggerEventKind::Push,
            branch: "master".to_string(),
        },
        instance_count: 7,
        queued_at: Utc::now(),
    };

    let json = serde_json::to_string(&payload).expect("serialize");
    let parsed: RunQueuedPayload = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(payload.run_id, parsed.run_id);
    assert_eq!(payload.workflow_name, parsed.workflow_name);
    assert_eq!(payload.instance_count, parsed.instance_count);
}

#[test]
fn test_instance_completed_payload_roundtrip() {
    let payload = InstanceCompletedPayload {
        run_id: RunId::new(),
        instance_id: InstanceId::new(),
        display_name: "unittest (3.11)".to_string(),
        status: InstanceStatus::Failed,
        exit_code: Some(1),
        duration_ms: 4321,
        completed_at: Utc::now(),
    };

    let json = serde_json::to_string(&payload).expect("serialize");
    let parsed: InstanceCompletedPayload = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(payload.status, parsed.status);
    assert_eq!(payload.exit_code, parsed.exit_code);
}

#[test]
fn test_event_tagging_uses_snake_case() {
    let event = Event::MatrixExpanded(MatrixExpandedPayload {
        run_id: RunId::new(),
        job_name: "unittest".to_string(),
        key: "python".to_string(),
        values: vec!["3.9".to_string(), "3.10".to_string()],
        instance_count: 2,
    });

    let json = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["type"], "matrix_expanded");
}

#[test]
fn test_workflow_definition_yaml_roundtrip() {
    let yaml = r#"
name: ci
on:
  events: [push, pull_request]
  branch: master
jobs:
  - name: unittest
    runs_on: windows-latest
    environment:
      runtime: "${{ matrix.python }}"
      extras: [disasm, db, search, test]
    matrix:
      key: python
      values: ["3.9", "3.10", "3.11", "3.12", "3.13"]
    steps:
      - name: run tests
        run: pytest tests/
"#;

    let wf: WorkflowDefinition = serde_yaml::from_str(yaml).expect("parse yaml");
    assert_eq!(wf.name, "ci");
    assert_eq!(wf.on.events.len(), 2);
    assert_eq!(wf.on.branch, "master");

    let job = &wf.jobs[0];
    assert_eq!(job.runs_on, "windows-latest");
    let matrix = job.matrix.as_ref().expect("matrix");
    assert_eq!(matrix.key, "python");
    assert_eq!(matrix.values.len(), 5);
    let env = job.environment.as_ref().expect("environment");
    assert_eq!(env.extras, vec!["disasm", "db", "search", "test"]);

    wf.validate().expect("valid workflow");

    let back = serde_yaml::to_string(&wf).expect("serialize yaml");
    let reparsed: WorkflowDefinition = serde_yaml::from_str(&back).expect("reparse");
    assert_eq!(reparsed.jobs[0].matrix.as_ref().unwrap().values.len(), 5);
}

#[test]
fn test_step_defaults() {
    let yaml = r#"
name: lint step
uses: ruff-action
with:
  src: winappdbg
"#;
    let step: StepDefinition = serde_yaml::from_str(yaml).expect("parse step");
    assert!(!step.continue_on_error);
    assert!(step.run.is_none());
    assert_eq!(step.with.get("src").map(String::as_str), Some("winappdbg"));
}

#[test]
fn test_run_serialization_roundtrip() {
    let run = Run {
        id: RunId::new(),
        workflow_name: "ci".to_string(),
        status: RunStatus::Failed,
        trigger: TriggerEvent {
            kind: TriggerEventKind::PullRequest,
            branch: "master".to_string(),
        },
        instances: vec![JobInstance {
            id: InstanceId::new(),
            job_name: "docs".to_string(),
            display_name: "docs".to_string(),
            matrix: None,
            status: InstanceStatus::Failed,
            steps: vec![StepRecord {
                name: "build docs".to_string(),
                status: StepStatus::Failed,
                continue_on_error: false,
                exit_code: Some(2),
                duration_ms: Some(150),
            }],
            exit_code: Some(2),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            duration_ms: Some(150),
        }],
        queued_at: Utc::now(),
        completed_at: Some(Utc::now()),
        duration_ms: Some(160),
    };

    let json = serde_json::to_string(&run).expect("serialize");
    let parsed: Run = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(parsed.status, RunStatus::Failed);
    assert_eq!(parsed.failed_instances().count(), 1);
    assert_eq!(parsed.instances[0].steps[0].exit_code, Some(2));
}
