//! Run orchestration.
//!
//! Expands the declared jobs of a triggered workflow into instance plans
//! and executes every instance as an independent tokio task. There are no
//! dependency edges between instances: lint, the test matrix, and docs all
//! run concurrently, and a failure in one never cancels another.

use crate::matrix::MatrixExpander;
use crate::triggers::TriggerGate;

use chrono::Utc;
use gantry_core::Result;
use gantry_core::events::{
    Event, EventBus, MatrixExpandedPayload, RunCompletedPayload, RunQueuedPayload,
};
use gantry_core::ids::RunId;
use gantry_core::run::{InstancePlan, InstanceStatus, JobInstance, Run, RunStatus, StepStatus};
use gantry_core::workflow::{TriggerEvent, WorkflowDefinition};
use gantry_runner::InstanceExecutor;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// The main scheduler service.
pub struct Scheduler {
    executor: Arc<InstanceExecutor>,
    events: Arc<dyn EventBus>,
    gate: TriggerGate,
    expander: MatrixExpander,
}

impl Scheduler {
    pub fn new(executor: Arc<InstanceExecutor>, events: Arc<dyn EventBus>) -> Self {
        Self {
            executor,
            events,
            gate: TriggerGate::new(),
            expander: MatrixExpander::new(),
        }
    }

    /// Handle an incoming event: create and execute a run if the event
    /// matches the workflow's trigger filter, silently do nothing
    /// otherwise.
    pub async fn handle_event(
        &self,
        workflow: &WorkflowDefinition,
        event: TriggerEvent,
    ) -> Result<Option<Run>> {
        if !self.gate.matches(&workflow.on, &event) {
            debug!(
                workflow = %workflow.name,
                branch = %event.branch,
                "Event does not match trigger filter, no run created"
            );
            return Ok(None);
        }

        let run_id = RunId::new();
        let queued_at = Utc::now();
        let plans = self.expand_run(run_id, workflow).await;

        self.events
            .publish(Event::RunQueued(RunQueuedPayload {
                run_id,
                workflow_name: workflow.name.clone(),
                trigger: event.clone(),
                instance_count: plans.len() as u32,
                queued_at,
            }))
            .await;

        info!(
            run_id = %run_id,
            workflow = %workflow.name,
            instances = plans.len(),
            "Run created"
        );

        let started = std::time::Instant::now();
        let instances = self.execute_instances(run_id, plans).await;

        let status = RunStatus::aggregate(&instances);
        let duration_ms = started.elapsed().as_millis() as u64;

        self.events
            .publish(Event::RunCompleted(RunCompletedPayload {
                run_id,
                workflow_name: workflow.name.clone(),
                status,
                instances_passed: instances
                    .iter()
                    .filter(|i| i.status == InstanceStatus::Succeeded)
                    .count() as u32,
                instances_failed: instances
                    .iter()
                    .filter(|i| i.status == InstanceStatus::Failed)
                    .count() as u32,
                duration_ms,
                completed_at: Utc::now(),
            }))
            .await;

        Ok(Some(Run {
            id: run_id,
            workflow_name: workflow.name.clone(),
            status,
            trigger: event,
            instances,
            queued_at,
            completed_at: Some(Utc::now()),
            duration_ms: Some(duration_ms),
        }))
    }

    /// Expand every declared job into its instance plans, announcing each
    /// matrix fan-out.
    pub async fn expand_run(&self, run_id: RunId, workflow: &WorkflowDefinition) -> Vec<InstancePlan> {
        let mut plans = Vec::new();
        for job in &workflow.jobs {
            let expanded = self.expander.expand(job);
            if let Some(matrix) = &job.matrix {
                self.events
                    .publish(Event::MatrixExpanded(MatrixExpandedPayload {
                        run_id,
                        job_name: job.name.clone(),
                        key: matrix.key.clone(),
                        values: matrix.values.clone(),
                        instance_count: expanded.len() as u32,
                    }))
                    .await;
            }
            plans.extend(expanded);
        }
        plans
    }

    /// Run all instance plans as independent parallel tasks and collect
    /// their terminal records. The scheduler never aborts siblings: every
    /// task runs to its own terminal state, and a panicked task is
    /// recovered at the instance boundary as a failure of that instance
    /// alone.
    async fn execute_instances(
        &self,
        run_id: RunId,
        plans: Vec<InstancePlan>,
    ) -> Vec<JobInstance> {
        let mut join_set = JoinSet::new();
        let mut skeletons = HashMap::new();

        for (index, plan) in plans.into_iter().enumerate() {
            let skeleton = plan.instance.clone();
            let executor = self.executor.clone();
            let handle = join_set.spawn(async move {
                let instance = executor.run(run_id, plan).await;
                (index, instance)
            });
            skeletons.insert(handle.id(), (index, skeleton));
        }

        let mut finished: Vec<(usize, JobInstance)> = Vec::new();
        while let Some(result) = join_set.join_next_with_id().await {
            match result {
                Ok((id, (index, instance))) => {
                    skeletons.remove(&id);
                    finished.push((index, instance));
                }
                Err(e) => {
                    error!(error = %e, "Instance task did not complete");
                    if let Some((index, mut skeleton)) = skeletons.remove(&e.id()) {
                        for record in &mut skeleton.steps {
                            if record.status == StepStatus::Pending {
                                record.status = StepStatus::Skipped;
                            }
                        }
                        skeleton.status = InstanceStatus::Failed;
                        skeleton.completed_at = Some(Utc::now());
                        finished.push((index, skeleton));
                    }
                }
            }
        }

        // Report in scheduling order regardless of completion order.
        finished.sort_by_key(|(index, _)| *index);
        finished.into_iter().map(|(_, instance)| instance).collect()
    }
}
