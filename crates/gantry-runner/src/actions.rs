//! Builtin actions resolvable from `uses:` references.
//!
//! An action turns its opaque named options into an external tool
//! invocation. The tools themselves (ruff et al.) are collaborators on
//! PATH, not reimplemented here.

use crate::runner::{OutputLine, StepContext, StepOutcome, StepRunner, run_streaming};
use async_trait::async_trait;
use gantry_core::workflow::StepDefinition;
use gantry_core::{Error, Result};
use std::collections::BTreeMap;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::info;

pub trait Action: Send + Sync {
    fn name(&self) -> &str;

    /// Build the argv for this action from the step's named options.
    fn command(&self, with: &BTreeMap<String, String>) -> Result<Vec<String>>;
}

/// The external lint action: runs `ruff check` against the configured
/// source directory. Options other than `src` pass through as `--key=value`.
pub struct RuffAction;

impl Action for RuffAction {
    fn name(&self) -> &str {
        "ruff-action"
    }

    fn command(&self, with: &BTreeMap<String, String>) -> Result<Vec<String>> {
        let mut argv = vec!["ruff".to_string(), "check".to_string()];
        for (key, value) in with {
            match key.as_str() {
                "src" => argv.push(value.clone()),
                "args" => argv.extend(value.split_whitespace().map(String::from)),
                _ => argv.push(format!("--{}={}", key, value)),
            }
        }
        Ok(argv)
    }
}

/// Resolve an action reference to a builtin action.
///
/// References may carry an owner prefix and a version suffix
/// (`astral-sh/ruff-action@v3`); only the action name selects the
/// implementation.
pub fn builtin_action(reference: &str) -> Option<&'static dyn Action> {
    static RUFF: RuffAction = RuffAction;

    let name = reference
        .split('@')
        .next()
        .unwrap_or(reference)
        .rsplit('/')
        .next()
        .unwrap_or(reference);

    match name {
        "ruff-action" => Some(&RUFF),
        _ => None,
    }
}

/// Check whether an action reference resolves, for static validation.
pub fn is_known_action(reference: &str) -> bool {
    builtin_action(reference).is_some()
}

/// Runner for `uses:` steps.
#[derive(Debug, Default)]
pub struct ActionRunner;

impl ActionRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepRunner for ActionRunner {
    async fn execute(
        &self,
        ctx: &StepContext,
        output_tx: mpsc::Sender<OutputLine>,
    ) -> Result<StepOutcome> {
        let reference = ctx
            .step
            .uses
            .as_ref()
            .ok_or_else(|| Error::Internal("No action reference".to_string()))?;

        let action =
            builtin_action(reference).ok_or_else(|| Error::UnknownAction(reference.clone()))?;

        let argv = action.command(&ctx.step.with)?;
        info!(action = action.name(), command = ?argv, "Executing action");

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .current_dir(&ctx.workspace)
            .envs(&ctx.env_vars);

        run_streaming(cmd, output_tx).await
    }

    fn can_handle(&self, step: &StepDefinition) -> bool {
        step.uses.is_some()
    }
}
