//! Instance executor behavior against scripted fakes.

use gantry_core::events::MemoryEventBus;
use gantry_core::ids::{InstanceId, RunId};
use gantry_core::run::{InstancePlan, InstanceStatus, JobInstance, StepStatus};
use gantry_core::workflow::{EnvironmentSpec, StepDefinition};
use gantry_runner::InstanceExecutor;
use gantry_runner::testing::{ScriptedProvisioner, ScriptedRunner};
use std::collections::BTreeMap;
use std::sync::Arc;

fn step(name: &str, continue_on_error: bool) -> StepDefinition {
    StepDefinition {
        name: name.to_string(),
        uses: None,
        run: Some(format!("echo {}", name)),
        with: BTreeMap::new(),
        continue_on_error,
    }
}

fn plan(steps: Vec<StepDefinition>, environment: Option<EnvironmentSpec>) -> InstancePlan {
    InstancePlan {
        instance: JobInstance {
            id: InstanceId::new(),
            job_name: "job".to_string(),
            display_name: "job".to_string(),
            matrix: None,
            status: InstanceStatus::Pending,
            steps: vec![],
            exit_code: None,
            started_at: None,
            completed_at: None,
            duration_ms: None,
        },
        runs_on: "ubuntu-latest".to_string(),
        environment,
        steps,
    }
}

fn executor(
    provisioner: Arc<ScriptedProvisioner>,
    runner: Arc<ScriptedRunner>,
) -> InstanceExecutor {
    InstanceExecutor::with_runners(
        provisioner,
        vec![runner as _],
        Arc::new(MemoryEventBus::new()),
    )
}

#[tokio::test]
async fn test_all_steps_pass() {
    let provisioner = Arc::new(ScriptedProvisioner::new());
    let runner = Arc::new(ScriptedRunner::new());
    let exec = executor(provisioner.clone(), runner.clone());

    let instance = exec
        .run(RunId::new(), plan(vec![step("a", false), step("b", false)], None))
        .await;

    assert_eq!(instance.status, InstanceStatus::Succeeded);
    assert_eq!(instance.exit_code, Some(0));
    assert_eq!(runner.executed(), vec!["a", "b"]);
    assert_eq!(provisioner.teardown_count(), 1);
}

#[tokio::test]
async fn test_blocking_failure_skips_remaining_steps() {
    let provisioner = Arc::new(ScriptedProvisioner::new());
    let runner = Arc::new(ScriptedRunner::new().fail_step("b", 2));
    let exec = executor(provisioner.clone(), runner.clone());

    let instance = exec
        .run(
            RunId::new(),
            plan(
                vec![step("a", false), step("b", false), step("c", false)],
                None,
            ),
        )
        .await;

    assert_eq!(instance.status, InstanceStatus::Failed);
    assert_eq!(instance.exit_code, Some(2));
    assert_eq!(runner.executed(), vec!["a", "b"]);
    assert_eq!(instance.steps[0].status, StepStatus::Succeeded);
    assert_eq!(instance.steps[1].status, StepStatus::Failed);
    assert_eq!(instance.steps[2].status, StepStatus::Skipped);
    // Environment released despite the failure.
    assert_eq!(provisioner.teardown_count(), 1);
}

#[tokio::test]
async fn test_continuing_failure_still_runs_later_steps() {
    let provisioner = Arc::new(ScriptedProvisioner::new());
    let runner = Arc::new(ScriptedRunner::new().fail_step("fix", 1));
    let exec = executor(provisioner.clone(), runner.clone());

    let instance = exec
        .run(
            RunId::new(),
            plan(vec![step("fix", true), step("format", true)], None),
        )
        .await;

    // Both steps ran in order; the recorded failure still fails the instance.
    assert_eq!(runner.executed(), vec!["fix", "format"]);
    assert_eq!(instance.status, InstanceStatus::Failed);
    assert_eq!(instance.exit_code, Some(1));
    assert_eq!(instance.steps[0].status, StepStatus::Failed);
    assert_eq!(instance.steps[1].status, StepStatus::Succeeded);
}

#[tokio::test]
async fn test_provisioning_failure_runs_no_steps() {
    let provisioner = Arc::new(ScriptedProvisioner::new().fail_for_runtime("3.11"));
    let runner = Arc::new(ScriptedRunner::new());
    let exec = executor(provisioner.clone(), runner.clone());

    let instance = exec
        .run(
            RunId::new(),
            plan(
                vec![step("install", false), step("pytest", false)],
                Some(EnvironmentSpec {
                    runtime: "3.11".to_string(),
                    extras: vec!["test".to_string()],
                }),
            ),
        )
        .await;

    assert_eq!(instance.status, InstanceStatus::Failed);
    assert_eq!(instance.exit_code, None);
    assert!(runner.executed().is_empty());
    assert!(
        instance
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Skipped)
    );
}

#[tokio::test]
async fn test_terminal_state_is_absorbing() {
    let provisioner = Arc::new(ScriptedProvisioner::new());
    let runner = Arc::new(ScriptedRunner::new().fail_step("only", 7));
    let exec = executor(provisioner, runner);

    let instance = exec
        .run(RunId::new(), plan(vec![step("only", false)], None))
        .await;

    assert!(instance.status.is_terminal());
    assert_eq!(instance.status, InstanceStatus::Failed);
}
