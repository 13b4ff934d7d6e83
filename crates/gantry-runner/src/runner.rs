//! Core runner trait and types.

use async_trait::async_trait;
use gantry_core::Result;
use gantry_core::workflow::StepDefinition;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Output line from step execution.
#[derive(Debug, Clone)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub content: String,
    pub line_number: u32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Output stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Result of step execution.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub exit_code: i32,
    pub success: bool,
    pub duration_ms: u64,
}

/// Context for step execution.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Provisioned workspace the step runs in.
    pub workspace: PathBuf,
    /// Environment variables exported by the provisioner (venv path etc).
    pub env_vars: HashMap<String, String>,
    pub step: StepDefinition,
}

/// Trait for step execution.
#[async_trait]
pub trait StepRunner: Send + Sync {
    /// Execute a step, streaming output to the provided channel.
    async fn execute(
        &self,
        ctx: &StepContext,
        output_tx: mpsc::Sender<OutputLine>,
    ) -> Result<StepOutcome>;

    /// Check if this runner can handle the given step.
    fn can_handle(&self, step: &StepDefinition) -> bool;
}

/// Spawn a prepared command, stream its stdout/stderr line-by-line over the
/// channel, and wait for exit. Shared by the shell and action runners.
pub(crate) async fn run_streaming(
    mut cmd: tokio::process::Command,
    output_tx: mpsc::Sender<OutputLine>,
) -> Result<StepOutcome> {
    let start = std::time::Instant::now();

    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = cmd
        .spawn()
        .map_err(|e| gantry_core::Error::Internal(format!("Failed to spawn process: {}", e)))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_tx = output_tx.clone();
    let stdout_handle = tokio::spawn(async move {
        let Some(stdout) = stdout else { return };
        let reader = BufReader::new(stdout);
        let mut lines = reader.lines();
        let mut line_num = 0u32;

        while let Ok(Some(line)) = lines.next_line().await {
            line_num += 1;
            let output = OutputLine {
                stream: OutputStream::Stdout,
                content: line,
                line_number: line_num,
                timestamp: chrono::Utc::now(),
            };
            if stdout_tx.send(output).await.is_err() {
                break;
            }
        }
    });

    let stderr_tx = output_tx;
    let stderr_handle = tokio::spawn(async move {
        let Some(stderr) = stderr else { return };
        let reader = BufReader::new(stderr);
        let mut lines = reader.lines();
        let mut line_num = 0u32;

        while let Ok(Some(line)) = lines.next_line().await {
            line_num += 1;
            let output = OutputLine {
                stream: OutputStream::Stderr,
                content: line,
                line_number: line_num,
                timestamp: chrono::Utc::now(),
            };
            if stderr_tx.send(output).await.is_err() {
                break;
            }
        }
    });

    let wait_result = child.wait().await;

    let _ = stdout_handle.await;
    let _ = stderr_handle.await;

    let status = wait_result
        .map_err(|e| gantry_core::Error::Internal(format!("Failed to wait for process: {}", e)))?;

    let exit_code = status.code().unwrap_or(-1);
    let duration_ms = start.elapsed().as_millis() as u64;

    Ok(StepOutcome {
        exit_code,
        success: exit_code == 0,
        duration_ms,
    })
}
