//! Lifecycle events published while a run executes.

use crate::ids::{InstanceId, RunId};
use crate::run::{InstanceStatus, RunStatus, StepStatus};
use crate::workflow::TriggerEvent;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// All events in the Gantry system.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Run lifecycle
    RunQueued(RunQueuedPayload),
    RunCompleted(RunCompletedPayload),

    // Matrix
    MatrixExpanded(MatrixExpandedPayload),

    // Instance lifecycle
    InstanceStarted(InstanceStartedPayload),
    InstanceCompleted(InstanceCompletedPayload),

    // Step lifecycle
    StepStarted(StepStartedPayload),
    StepCompleted(StepCompletedPayload),
}

impl Event {
    /// Returns the routing subject for this event.
    pub fn subject(&self) -> String {
        match self {
            Event::RunQueued(p) => format!("run.queued.{}", p.run_id),
            Event::RunCompleted(p) => format!("run.completed.{}", p.run_id),
            Event::MatrixExpanded(p) => {
                format!("run.{}.matrix.{}.expanded", p.run_id, p.job_name)
            }
            Event::InstanceStarted(p) => {
                format!("run.{}.instance.{}.started", p.run_id, p.instance_id)
            }
            Event::InstanceCompleted(p) => {
                format!("run.{}.instance.{}.completed", p.run_id, p.instance_id)
            }
            Event::StepStarted(p) => {
                format!("run.{}.instance.{}.step.started", p.run_id, p.instance_id)
            }
            Event::StepCompleted(p) => {
                format!("run.{}.instance.{}.step.completed", p.run_id, p.instance_id)
            }
        }
    }
}

/// Sink for lifecycle events. Implementations must tolerate concurrent
/// publishes from independent instance tasks.
#[async_trait::async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: Event);
}

/// Bus that logs every event through `tracing`.
#[derive(Debug, Default)]
pub struct TracingEventBus;

#[async_trait::async_trait]
impl EventBus for TracingEventBus {
    async fn publish(&self, event: Event) {
        tracing::info!(subject = %event.subject(), "event");
    }
}

/// Bus that collects events in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryEventBus {
    events: std::sync::Mutex<Vec<Event>>,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("event bus poisoned").clone()
    }
}

#[async_trait::async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: Event) {
        self.events.lock().expect("event bus poisoned").push(event);
    }
}

// === Run Payloads ===

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunQueuedPayload {
    pub run_id: RunId,
    pub workflow_name: String,
    pub trigger: TriggerEvent,
    pub instance_count: u32,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunCompletedPayload {
    pub run_id: RunId,
    pub workflow_name: String,
    pub status: RunStatus,
    pub instances_passed: u32,
    pub instances_failed: u32,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

// === Matrix Payloads ===

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MatrixExpandedPayload {
    pub run_id: RunId,
    pub job_name: String,
    pub key: String,
    pub values: Vec<String>,
    pub instance_count: u32,
}

// === Instance Payloads ===

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InstanceStartedPayload {
    pub run_id: RunId,
    pub instance_id: InstanceId,
    pub display_name: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InstanceCompletedPayload {
    pub run_id: RunId,
    pub instance_id: InstanceId,
    pub display_name: String,
    pub status: InstanceStatus,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

// === Step Payloads ===

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StepStartedPayload {
    pub run_id: RunId,
    pub instance_id: InstanceId,
    pub step_name: String,
    pub step_index: u32,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StepCompletedPayload {
    pub run_id: RunId,
    pub instance_id: InstanceId,
    pub step_name: String,
    pub step_index: u32,
    pub status: StepStatus,
    pub exit_code: i32,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}
