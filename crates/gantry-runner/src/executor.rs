//! Per-instance execution: provisioning, then ordered steps.
//!
//! Drives the instance state machine
//! `Pending -> Provisioning -> Running(step i) -> Succeeded | Failed`.
//! Terminal states are absorbing; the environment is released on every
//! exit path.

use crate::environments::{EnvRequest, ProvisionedEnv, Provisioner};
use crate::runner::{OutputLine, StepContext, StepRunner};
use crate::{ActionRunner, ShellRunner};
use chrono::Utc;
use gantry_core::events::{
    Event, EventBus, InstanceCompletedPayload, InstanceStartedPayload, StepCompletedPayload,
    StepStartedPayload,
};
use gantry_core::ids::RunId;
use gantry_core::run::{InstancePlan, InstanceStatus, JobInstance, StepRecord, StepStatus};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Executes one job instance from plan to terminal state.
pub struct InstanceExecutor {
    provisioner: Arc<dyn Provisioner>,
    runners: Vec<Arc<dyn StepRunner>>,
    events: Arc<dyn EventBus>,
}

impl InstanceExecutor {
    /// Executor with the standard shell and action runners.
    pub fn new(provisioner: Arc<dyn Provisioner>, events: Arc<dyn EventBus>) -> Self {
        let runners: Vec<Arc<dyn StepRunner>> = vec![
            Arc::new(ShellRunner::new()),
            Arc::new(ActionRunner::new()),
        ];
        Self::with_runners(provisioner, runners, events)
    }

    pub fn with_runners(
        provisioner: Arc<dyn Provisioner>,
        runners: Vec<Arc<dyn StepRunner>>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            provisioner,
            runners,
            events,
        }
    }

    /// Run the instance to a terminal state. Never returns an error: every
    /// failure is absorbed into the instance's own status.
    pub async fn run(&self, run_id: RunId, plan: InstancePlan) -> JobInstance {
        let mut instance = plan.instance;
        if instance.steps.len() != plan.steps.len() {
            instance.steps = plan
                .steps
                .iter()
                .map(|s| StepRecord::pending(&s.name, s.continue_on_error))
                .collect();
        }

        let started = std::time::Instant::now();
        instance.started_at = Some(Utc::now());
        instance.status = InstanceStatus::Provisioning;

        self.events
            .publish(Event::InstanceStarted(InstanceStartedPayload {
                run_id,
                instance_id: instance.id,
                display_name: instance.display_name.clone(),
                started_at: Utc::now(),
            }))
            .await;

        let request = EnvRequest {
            instance: instance.id,
            runtime: plan.environment.as_ref().map(|e| e.runtime.clone()),
            extras: plan
                .environment
                .as_ref()
                .map(|e| e.extras.clone())
                .unwrap_or_default(),
        };

        let env = match self.provisioner.provision(&request).await {
            Ok(env) => env,
            Err(e) => {
                warn!(
                    instance = %instance.display_name,
                    error = %e,
                    "Provisioning failed, no steps will run"
                );
                for record in &mut instance.steps {
                    record.status = StepStatus::Skipped;
                }
                return self.finalize(run_id, instance, started, None).await;
            }
        };

        instance.status = InstanceStatus::Running;
        let mut abort_code: Option<i32> = None;
        let mut first_failure: Option<i32> = None;

        for (index, step) in plan.steps.iter().enumerate() {
            if abort_code.is_some() {
                instance.steps[index].status = StepStatus::Skipped;
                continue;
            }

            instance.steps[index].status = StepStatus::Running;
            self.events
                .publish(Event::StepStarted(StepStartedPayload {
                    run_id,
                    instance_id: instance.id,
                    step_name: step.name.clone(),
                    step_index: index as u32,
                    started_at: Utc::now(),
                }))
                .await;

            let (exit_code, duration_ms) = self.execute_step(&instance, &env, step).await;
            let record = &mut instance.steps[index];
            record.exit_code = exit_code;
            record.duration_ms = Some(duration_ms);
            record.status = if exit_code == Some(0) {
                StepStatus::Succeeded
            } else {
                StepStatus::Failed
            };

            self.events
                .publish(Event::StepCompleted(StepCompletedPayload {
                    run_id,
                    instance_id: instance.id,
                    step_name: step.name.clone(),
                    step_index: index as u32,
                    status: record.status,
                    exit_code: exit_code.unwrap_or(-1),
                    duration_ms,
                    completed_at: Utc::now(),
                }))
                .await;

            if record.status == StepStatus::Failed {
                if first_failure.is_none() {
                    first_failure = Some(exit_code.unwrap_or(-1));
                }
                if !step.continue_on_error {
                    abort_code = Some(exit_code.unwrap_or(-1));
                }
            }
        }

        if let Err(e) = self.provisioner.teardown(&env).await {
            warn!(instance = %instance.display_name, error = %e, "Teardown failed");
        }

        let exit_code = Some(abort_code.or(first_failure).unwrap_or(0));
        self.finalize(run_id, instance, started, exit_code).await
    }

    async fn execute_step(
        &self,
        instance: &JobInstance,
        env: &ProvisionedEnv,
        step: &gantry_core::workflow::StepDefinition,
    ) -> (Option<i32>, u64) {
        let Some(runner) = self.runners.iter().find(|r| r.can_handle(step)) else {
            error!(
                instance = %instance.display_name,
                step = %step.name,
                "No runner can handle step"
            );
            return (None, 0);
        };

        let ctx = StepContext {
            workspace: env.workspace.clone(),
            env_vars: env.env_vars.clone(),
            step: step.clone(),
        };

        let (tx, mut rx) = mpsc::channel::<OutputLine>(256);
        let instance_name = instance.display_name.clone();
        let step_name = step.name.clone();
        let drain = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                debug!(
                    instance = %instance_name,
                    step = %step_name,
                    line = %line.content,
                    "step output"
                );
            }
        });

        let result = runner.execute(&ctx, tx).await;
        let _ = drain.await;

        match result {
            Ok(outcome) => (Some(outcome.exit_code), outcome.duration_ms),
            Err(e) => {
                error!(
                    instance = %instance.display_name,
                    step = %step.name,
                    error = %e,
                    "Step execution error"
                );
                let code = match e {
                    gantry_core::Error::StepFailed { exit_code, .. } => Some(exit_code),
                    _ => None,
                };
                (code, 0)
            }
        }
    }

    async fn finalize(
        &self,
        run_id: RunId,
        mut instance: JobInstance,
        started: std::time::Instant,
        exit_code: Option<i32>,
    ) -> JobInstance {
        let failed = exit_code.is_none()
            || instance
                .steps
                .iter()
                .any(|s| s.status == StepStatus::Failed)
            || exit_code.is_some_and(|c| c != 0);

        instance.status = if failed {
            InstanceStatus::Failed
        } else {
            InstanceStatus::Succeeded
        };
        instance.exit_code = exit_code;
        instance.completed_at = Some(Utc::now());
        instance.duration_ms = Some(started.elapsed().as_millis() as u64);

        self.events
            .publish(Event::InstanceCompleted(InstanceCompletedPayload {
                run_id,
                instance_id: instance.id,
                display_name: instance.display_name.clone(),
                status: instance.status,
                exit_code: instance.exit_code,
                duration_ms: instance.duration_ms.unwrap_or(0),
                completed_at: Utc::now(),
            }))
            .await;

        instance
    }
}
