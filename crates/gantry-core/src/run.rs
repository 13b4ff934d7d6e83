//! Run and execution types.
//!
//! A run owns the job instances produced by matrix expansion. Instances
//! are mutually independent: no ordering guarantee, no shared state, and
//! a failure in one never aborts another.

use crate::ids::{InstanceId, RunId};
use crate::workflow::TriggerEvent;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Run {
    pub id: RunId,
    pub workflow_name: String,
    pub status: RunStatus,
    pub trigger: TriggerEvent,
    pub instances: Vec<JobInstance>,
    pub queued_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

impl Run {
    /// Instances that ended in failure, in scheduling order.
    pub fn failed_instances(&self) -> impl Iterator<Item = &JobInstance> {
        self.instances
            .iter()
            .filter(|i| i.status == InstanceStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }

    /// Aggregate of instance terminal states: failed if any instance
    /// failed, succeeded only if every instance succeeded.
    pub fn aggregate(instances: &[JobInstance]) -> RunStatus {
        if instances
            .iter()
            .any(|i| i.status == InstanceStatus::Failed)
        {
            RunStatus::Failed
        } else if instances
            .iter()
            .all(|i| i.status == InstanceStatus::Succeeded)
        {
            RunStatus::Succeeded
        } else {
            RunStatus::Running
        }
    }
}

/// The matrix value bound to one instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MatrixBinding {
    pub key: String,
    pub value: String,
}

/// A concrete, independently-executed expansion of a job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobInstance {
    pub id: InstanceId,
    pub job_name: String,
    /// "unittest (3.11)" for matrix instances, the job name otherwise.
    pub display_name: String,
    pub matrix: Option<MatrixBinding>,
    pub status: InstanceStatus,
    pub steps: Vec<StepRecord>,
    /// Exit status surfaced as the instance's success/failure signal: the
    /// first step that aborted it, or the first recorded failure, else 0.
    pub exit_code: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

/// A scheduled-but-not-yet-executed instance: the instance record plus the
/// job's declarations with matrix placeholders already resolved.
#[derive(Debug, Clone)]
pub struct InstancePlan {
    pub instance: JobInstance,
    pub runs_on: String,
    /// Environment request with the runtime already matrix-resolved.
    pub environment: Option<crate::workflow::EnvironmentSpec>,
    /// Steps with placeholders substituted, in declaration order.
    pub steps: Vec<crate::workflow::StepDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Provisioning,
    Running,
    Succeeded,
    Failed,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InstanceStatus::Succeeded | InstanceStatus::Failed)
    }
}

/// Per-step result collector. Failures are accumulated here rather than
/// swallowed so a continuing instance still reports an accurate final
/// status.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StepRecord {
    pub name: String,
    pub status: StepStatus,
    pub continue_on_error: bool,
    pub exit_code: Option<i32>,
    pub duration_ms: Option<u64>,
}

impl StepRecord {
    pub fn pending(name: impl Into<String>, continue_on_error: bool) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            continue_on_error,
            exit_code: None,
            duration_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Never reached because an earlier blocking step aborted the instance.
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Succeeded | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(status: InstanceStatus) -> JobInstance {
        JobInstance {
            id: InstanceId::new(),
            job_name: "unittest".to_string(),
            display_name: "unittest".to_string(),
            matrix: None,
            status,
            steps: vec![],
            exit_code: None,
            started_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }

    #[test]
    fn test_aggregate_all_succeeded() {
        let instances = vec![
            instance(InstanceStatus::Succeeded),
            instance(InstanceStatus::Succeeded),
        ];
        assert_eq!(RunStatus::aggregate(&instances), RunStatus::Succeeded);
    }

    #[test]
    fn test_aggregate_single_failure_fails_run() {
        let instances = vec![
            instance(InstanceStatus::Succeeded),
            instance(InstanceStatus::Failed),
            instance(InstanceStatus::Succeeded),
        ];
        assert_eq!(RunStatus::aggregate(&instances), RunStatus::Failed);
    }

    #[test]
    fn test_aggregate_failure_wins_over_in_flight() {
        let instances = vec![
            instance(InstanceStatus::Running),
            instance(InstanceStatus::Failed),
        ];
        assert_eq!(RunStatus::aggregate(&instances), RunStatus::Failed);
    }

    #[test]
    fn test_aggregate_in_flight_is_running() {
        let instances = vec![
            instance(InstanceStatus::Succeeded),
            instance(InstanceStatus::Provisioning),
        ];
        assert_eq!(RunStatus::aggregate(&instances), RunStatus::Running);
    }
}
