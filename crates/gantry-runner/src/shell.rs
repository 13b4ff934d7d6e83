//! Shell-based step execution in the provisioned workspace.

use crate::runner::{OutputLine, StepContext, StepOutcome, StepRunner, run_streaming};
use async_trait::async_trait;
use gantry_core::Result;
use gantry_core::workflow::StepDefinition;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Runner for `run:` steps. Commands execute under `sh -c` inside the
/// instance's workspace; a non-zero exit is reported in the outcome, never
/// retried.
#[derive(Debug, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepRunner for ShellRunner {
    async fn execute(
        &self,
        ctx: &StepContext,
        output_tx: mpsc::Sender<OutputLine>,
    ) -> Result<StepOutcome> {
        let command = ctx
            .step
            .run
            .as_ref()
            .ok_or_else(|| gantry_core::Error::Internal("No command to run".to_string()))?;

        info!(command = %command, workspace = %ctx.workspace.display(), "Executing shell command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&ctx.workspace)
            .envs(&ctx.env_vars);

        let outcome = run_streaming(cmd, output_tx).await?;
        debug!(
            exit_code = outcome.exit_code,
            duration_ms = outcome.duration_ms,
            "Command completed"
        );
        Ok(outcome)
    }

    fn can_handle(&self, step: &StepDefinition) -> bool {
        step.run.is_some() && step.uses.is_none()
    }
}
