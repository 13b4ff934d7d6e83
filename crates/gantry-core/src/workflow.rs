//! Workflow definition types.
//!
//! These types represent the user-authored workflow YAML configuration.
//! Job and matrix declarations are plain data; expansion and execution
//! live in the scheduler and runner crates.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Trigger filter gating run creation.
    pub on: TriggerConfig,
    pub jobs: Vec<JobDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TriggerConfig {
    /// Event kinds that may create a run.
    pub events: Vec<TriggerEventKind>,
    /// The single target branch; matched exactly.
    pub branch: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEventKind {
    Push,
    PullRequest,
}

/// An incoming event at the process boundary, supplied by the external
/// event source. Immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TriggerEvent {
    pub kind: TriggerEventKind,
    pub branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobDefinition {
    pub name: String,
    #[serde(default = "default_runs_on")]
    pub runs_on: String,
    /// What the provisioner must set up before steps run. `None` means the
    /// instance only needs a clean copy of the source tree.
    #[serde(default)]
    pub environment: Option<EnvironmentSpec>,
    /// A non-empty matrix expands this job into one instance per value.
    #[serde(default)]
    pub matrix: Option<MatrixConfig>,
    pub steps: Vec<StepDefinition>,
}

fn default_runs_on() -> String {
    "ubuntu-latest".to_string()
}

/// One named matrix dimension. `${{ matrix.<key> }}` placeholders in the
/// environment spec and steps resolve to the bound value per instance.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MatrixConfig {
    pub key: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnvironmentSpec {
    /// Interpreter version to install, fixed ("3.12") or matrix-bound
    /// ("${{ matrix.python }}").
    pub runtime: String,
    /// Optional-dependency groups installed alongside the base package.
    #[serde(default)]
    pub extras: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StepDefinition {
    pub name: String,
    /// Reference to a named external action. Mutually exclusive with `run`.
    #[serde(default)]
    pub uses: Option<String>,
    /// Shell command executed in the provisioned workspace.
    #[serde(default)]
    pub run: Option<String>,
    /// Named options passed through opaquely to the external tool.
    #[serde(default)]
    pub with: BTreeMap<String, String>,
    /// A failing step with this flag records its failure but does not halt
    /// the remaining steps of the instance.
    #[serde(default)]
    pub continue_on_error: bool,
}

impl WorkflowDefinition {
    /// Static well-formedness checks on a parsed definition.
    pub fn validate(&self) -> crate::Result<()> {
        if self.jobs.is_empty() {
            return Err(crate::Error::WorkflowValidation(
                "workflow declares no jobs".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for job in &self.jobs {
            if !seen.insert(job.name.as_str()) {
                return Err(crate::Error::WorkflowValidation(format!(
                    "duplicate job name: {}",
                    job.name
                )));
            }
            job.validate()?;
        }
        Ok(())
    }
}

impl JobDefinition {
    pub fn validate(&self) -> crate::Result<()> {
        if self.steps.is_empty() {
            return Err(crate::Error::WorkflowValidation(format!(
                "job '{}' declares no steps",
                self.name
            )));
        }

        if let Some(matrix) = &self.matrix
            && matrix.values.is_empty()
        {
            return Err(crate::Error::WorkflowValidation(format!(
                "job '{}' declares an empty matrix",
                self.name
            )));
        }

        for step in &self.steps {
            match (&step.uses, &step.run) {
                (Some(_), Some(_)) => {
                    return Err(crate::Error::WorkflowValidation(format!(
                        "step '{}' in job '{}' declares both 'uses' and 'run'",
                        step.name, self.name
                    )));
                }
                (None, None) => {
                    return Err(crate::Error::WorkflowValidation(format!(
                        "step '{}' in job '{}' declares neither 'uses' nor 'run'",
                        step.name, self.name
                    )));
                }
                _ => {}
            }
        }

        // Matrix placeholders only make sense when a matrix is declared.
        if self.matrix.is_none() {
            let refers_to_matrix = self
                .environment
                .as_ref()
                .map(|e| e.runtime.contains("${{ matrix."))
                .unwrap_or(false)
                || self.steps.iter().any(|s| {
                    s.run.as_deref().unwrap_or("").contains("${{ matrix.")
                        || s.with.values().any(|v| v.contains("${{ matrix."))
                });
            if refers_to_matrix {
                return Err(crate::Error::WorkflowValidation(format!(
                    "job '{}' references matrix values but declares no matrix",
                    self.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_step(name: &str, cmd: &str) -> StepDefinition {
        StepDefinition {
            name: name.to_string(),
            uses: None,
            run: Some(cmd.to_string()),
            with: BTreeMap::new(),
            continue_on_error: false,
        }
    }

    fn minimal_workflow() -> WorkflowDefinition {
        WorkflowDefinition {
            name: "ci".to_string(),
            description: None,
            on: TriggerConfig {
                events: vec![TriggerEventKind::Push],
                branch: "master".to_string(),
            },
            jobs: vec![JobDefinition {
                name: "lint".to_string(),
                runs_on: "ubuntu-latest".to_string(),
                environment: None,
                matrix: None,
                steps: vec![run_step("check", "true")],
            }],
        }
    }

    #[test]
    fn test_valid_workflow_passes() {
        minimal_workflow().validate().unwrap();
    }

    #[test]
    fn test_duplicate_job_names_rejected() {
        let mut wf = minimal_workflow();
        wf.jobs.push(wf.jobs[0].clone());
        assert!(wf.validate().is_err());
    }

    #[test]
    fn test_step_needs_exactly_one_payload() {
        let mut wf = minimal_workflow();
        wf.jobs[0].steps[0].uses = Some("checkout".to_string());
        assert!(wf.validate().is_err());

        wf.jobs[0].steps[0].run = None;
        wf.jobs[0].steps[0].uses = None;
        assert!(wf.validate().is_err());
    }

    #[test]
    fn test_matrix_placeholder_without_matrix_rejected() {
        let mut wf = minimal_workflow();
        wf.jobs[0].environment = Some(EnvironmentSpec {
            runtime: "${{ matrix.python }}".to_string(),
            extras: vec![],
        });
        assert!(wf.validate().is_err());
    }

    #[test]
    fn test_empty_matrix_rejected() {
        let mut wf = minimal_workflow();
        wf.jobs[0].matrix = Some(MatrixConfig {
            key: "python".to_string(),
            values: vec![],
        });
        assert!(wf.validate().is_err());
    }
}
