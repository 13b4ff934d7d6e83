//! In-memory fakes for the provisioner and runner seams (testing only).
//!
//! `ScriptedProvisioner` and `ScriptedRunner` satisfy the trait contracts
//! without touching git, uv, or a shell, so scheduler and executor
//! behavior can be tested deterministically.

use crate::environments::{EnvRequest, ProvisionedEnv, Provisioner};
use crate::runner::{OutputLine, StepContext, StepOutcome, StepRunner};
use async_trait::async_trait;
use gantry_core::workflow::StepDefinition;
use gantry_core::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Provisioner whose outcome is scripted per runtime version.
#[derive(Debug, Default)]
pub struct ScriptedProvisioner {
    fail_runtimes: HashSet<String>,
    provisioned: Mutex<Vec<String>>,
    torn_down: Mutex<usize>,
}

impl ScriptedProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make provisioning fail for the given runtime version.
    pub fn fail_for_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.fail_runtimes.insert(runtime.into());
        self
    }

    /// Runtimes provisioned so far, in call order ("none" for requests
    /// without a runtime).
    pub fn provisioned(&self) -> Vec<String> {
        self.provisioned.lock().unwrap().clone()
    }

    pub fn teardown_count(&self) -> usize {
        *self.torn_down.lock().unwrap()
    }
}

#[async_trait]
impl Provisioner for ScriptedProvisioner {
    async fn provision(&self, request: &EnvRequest) -> Result<ProvisionedEnv> {
        let runtime = request.runtime.clone().unwrap_or_else(|| "none".to_string());

        if self.fail_runtimes.contains(&runtime) {
            return Err(Error::Provisioning(format!(
                "no interpreter available for {}",
                runtime
            )));
        }

        self.provisioned.lock().unwrap().push(runtime);
        Ok(ProvisionedEnv {
            workspace: PathBuf::from("/tmp").join(request.instance.to_string()),
            env_vars: HashMap::new(),
        })
    }

    async fn teardown(&self, _env: &ProvisionedEnv) -> Result<()> {
        *self.torn_down.lock().unwrap() += 1;
        Ok(())
    }
}

/// Runner that records execution order and fails scripted steps.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    fail_steps: HashMap<String, i32>,
    executed: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named step fail with the given exit code.
    pub fn fail_step(mut self, name: impl Into<String>, exit_code: i32) -> Self {
        self.fail_steps.insert(name.into(), exit_code);
        self
    }

    /// Step names executed so far, in call order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl StepRunner for ScriptedRunner {
    async fn execute(
        &self,
        ctx: &StepContext,
        _output_tx: mpsc::Sender<OutputLine>,
    ) -> Result<StepOutcome> {
        self.executed.lock().unwrap().push(ctx.step.name.clone());

        let exit_code = self.fail_steps.get(&ctx.step.name).copied().unwrap_or(0);
        Ok(StepOutcome {
            exit_code,
            success: exit_code == 0,
            duration_ms: 1,
        })
    }

    fn can_handle(&self, _step: &StepDefinition) -> bool {
        true
    }
}
