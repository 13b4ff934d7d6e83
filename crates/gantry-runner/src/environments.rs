//! Per-instance environment provisioning.
//!
//! Each job instance owns an ephemeral environment: a clean copy of the
//! source tree, an interpreter at the requested version, and the package
//! installed with its extras. The environment is never shared or reused
//! across instances and is torn down unconditionally on completion.

use async_trait::async_trait;
use gantry_core::ids::InstanceId;
use gantry_core::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// What one job instance needs provisioned before its steps run.
#[derive(Debug, Clone)]
pub struct EnvRequest {
    pub instance: InstanceId,
    /// Interpreter version, already matrix-resolved. `None` means the
    /// instance only needs the source tree.
    pub runtime: Option<String>,
    /// Extras groups installed alongside the base package.
    pub extras: Vec<String>,
}

/// A provisioned environment, scoped to exactly one job instance.
#[derive(Debug, Clone)]
pub struct ProvisionedEnv {
    /// Workspace root holding the checked-out source tree.
    pub workspace: PathBuf,
    /// Variables steps must inherit (interpreter on PATH etc).
    pub env_vars: HashMap<String, String>,
}

/// Acquires and releases instance environments. Failure is fatal to the
/// owning instance only; no retry is performed at this layer.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(&self, request: &EnvRequest) -> Result<ProvisionedEnv>;

    /// Release the environment. Invoked on every exit path of an instance.
    async fn teardown(&self, env: &ProvisionedEnv) -> Result<()>;
}

/// Provisioner that works directly on the host: `git` for the source tree,
/// `uv` for interpreter and package installation.
pub struct HostProvisioner {
    source: PathBuf,
    scratch_root: PathBuf,
}

impl HostProvisioner {
    pub fn new(source: impl Into<PathBuf>, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            scratch_root: scratch_root.into(),
        }
    }

    async fn run_tool(program: &str, args: &[&str], cwd: &Path) -> Result<()> {
        debug!(program, ?args, cwd = %cwd.display(), "Running provisioning tool");

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|e| Error::Provisioning(format!("failed to spawn {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Provisioning(format!(
                "{} {} exited with {}: {}",
                program,
                args.join(" "),
                output.status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Provisioner for HostProvisioner {
    async fn provision(&self, request: &EnvRequest) -> Result<ProvisionedEnv> {
        let workspace = self.scratch_root.join(request.instance.to_string());

        info!(
            workspace = %workspace.display(),
            runtime = request.runtime.as_deref().unwrap_or("none"),
            "Provisioning environment"
        );

        tokio::fs::create_dir_all(&self.scratch_root)
            .await
            .map_err(|e| Error::Provisioning(format!("failed to create scratch root: {}", e)))?;

        let mut env = ProvisionedEnv {
            workspace: workspace.clone(),
            env_vars: HashMap::new(),
        };

        // Clean copy of the source tree.
        let source = self.source.to_string_lossy().to_string();
        let target = workspace.to_string_lossy().to_string();
        if let Err(e) = Self::run_tool(
            "git",
            &["clone", "--quiet", &source, &target],
            &self.scratch_root,
        )
        .await
        {
            self.teardown(&env).await.ok();
            return Err(e);
        }

        if let Some(runtime) = &request.runtime {
            // uv fetches the interpreter if it is not already managed.
            if let Err(e) =
                Self::run_tool("uv", &["venv", "--quiet", "--python", runtime, ".venv"], &workspace)
                    .await
            {
                self.teardown(&env).await.ok();
                return Err(e);
            }

            let spec = if request.extras.is_empty() {
                ".".to_string()
            } else {
                format!(".[{}]", request.extras.join(","))
            };
            let install = ["pip", "install", "--quiet", "--python", ".venv", "-e", &spec];
            if let Err(e) = Self::run_tool("uv", &install, &workspace).await {
                self.teardown(&env).await.ok();
                return Err(e);
            }

            let venv_bin = workspace.join(".venv").join("bin");
            let path = match std::env::var("PATH") {
                Ok(existing) => format!("{}:{}", venv_bin.display(), existing),
                Err(_) => venv_bin.display().to_string(),
            };
            env.env_vars.insert("PATH".to_string(), path);
            env.env_vars.insert(
                "VIRTUAL_ENV".to_string(),
                workspace.join(".venv").display().to_string(),
            );
        }

        Ok(env)
    }

    async fn teardown(&self, env: &ProvisionedEnv) -> Result<()> {
        info!(workspace = %env.workspace.display(), "Tearing down environment");
        if let Err(e) = tokio::fs::remove_dir_all(&env.workspace).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(error = %e, "Failed to remove workspace");
            return Err(Error::Io(e));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_teardown_missing_workspace_is_ok() {
        let provisioner = HostProvisioner::new("/nonexistent/src", "/tmp/gantry-test-scratch");
        let env = ProvisionedEnv {
            workspace: PathBuf::from("/tmp/gantry-test-scratch/never-created"),
            env_vars: HashMap::new(),
        };
        provisioner.teardown(&env).await.unwrap();
    }

    #[tokio::test]
    async fn test_provision_bad_source_fails_and_cleans_up() {
        let scratch = tempfile::tempdir().unwrap();
        let provisioner = HostProvisioner::new("/definitely/not/a/repo", scratch.path());
        let request = EnvRequest {
            instance: InstanceId::new(),
            runtime: None,
            extras: vec![],
        };

        let err = provisioner.provision(&request).await.unwrap_err();
        assert!(matches!(err, Error::Provisioning(_)));

        let workspace = scratch.path().join(request.instance.to_string());
        assert!(!workspace.exists());
    }
}
