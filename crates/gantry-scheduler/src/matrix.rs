//! Matrix expansion for parallel instance generation.

use gantry_core::ids::InstanceId;
use gantry_core::interpolation::InterpolationContext;
use gantry_core::run::{InstancePlan, InstanceStatus, JobInstance, MatrixBinding, StepRecord};
use gantry_core::workflow::{EnvironmentSpec, JobDefinition, StepDefinition};

/// Expander turning job declarations into concrete instance plans.
///
/// Expansion is generic over any job: one plan per matrix value, each with
/// the value bound into its placeholders, or exactly one plan for jobs
/// without a matrix.
pub struct MatrixExpander;

impl MatrixExpander {
    pub fn new() -> Self {
        Self
    }

    pub fn expand(&self, job: &JobDefinition) -> Vec<InstancePlan> {
        match &job.matrix {
            Some(matrix) => matrix
                .values
                .iter()
                .map(|value| {
                    let ctx = InterpolationContext::with_matrix(&matrix.key, value);
                    self.plan_instance(
                        job,
                        &ctx,
                        format!("{} ({})", job.name, value),
                        Some(MatrixBinding {
                            key: matrix.key.clone(),
                            value: value.clone(),
                        }),
                    )
                })
                .collect(),
            None => {
                let ctx = InterpolationContext::new();
                vec![self.plan_instance(job, &ctx, job.name.clone(), None)]
            }
        }
    }

    fn plan_instance(
        &self,
        job: &JobDefinition,
        ctx: &InterpolationContext,
        display_name: String,
        matrix: Option<MatrixBinding>,
    ) -> InstancePlan {
        let steps: Vec<StepDefinition> = job
            .steps
            .iter()
            .map(|step| StepDefinition {
                name: step.name.clone(),
                uses: step.uses.clone(),
                run: step.run.as_deref().map(|r| ctx.interpolate(r)),
                with: step
                    .with
                    .iter()
                    .map(|(k, v)| (k.clone(), ctx.interpolate(v)))
                    .collect(),
                continue_on_error: step.continue_on_error,
            })
            .collect();

        let environment = job.environment.as_ref().map(|env| EnvironmentSpec {
            runtime: ctx.interpolate(&env.runtime),
            extras: env.extras.clone(),
        });

        let records = steps
            .iter()
            .map(|s| StepRecord::pending(&s.name, s.continue_on_error))
            .collect();

        InstancePlan {
            instance: JobInstance {
                id: InstanceId::new(),
                job_name: job.name.clone(),
                display_name,
                matrix,
                status: InstanceStatus::Pending,
                steps: records,
                exit_code: None,
                started_at: None,
                completed_at: None,
                duration_ms: None,
            },
            runs_on: job.runs_on.clone(),
            environment,
            steps,
        }
    }
}

impl Default for MatrixExpander {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::workflow::MatrixConfig;
    use std::collections::BTreeMap;

    fn unittest_job() -> JobDefinition {
        JobDefinition {
            name: "unittest".to_string(),
            runs_on: "windows-latest".to_string(),
            environment: Some(EnvironmentSpec {
                runtime: "${{ matrix.python }}".to_string(),
                extras: vec!["test".to_string()],
            }),
            matrix: Some(MatrixConfig {
                key: "python".to_string(),
                values: vec!["3.9", "3.10", "3.11", "3.12", "3.13"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            }),
            steps: vec![StepDefinition {
                name: "run tests".to_string(),
                uses: None,
                run: Some("pytest tests/".to_string()),
                with: BTreeMap::new(),
                continue_on_error: false,
            }],
        }
    }

    #[test]
    fn test_matrix_expansion_one_instance_per_value() {
        let plans = MatrixExpander::new().expand(&unittest_job());

        assert_eq!(plans.len(), 5);
        let versions: Vec<_> = plans
            .iter()
            .map(|p| p.instance.matrix.as_ref().unwrap().value.clone())
            .collect();
        assert_eq!(versions, vec!["3.9", "3.10", "3.11", "3.12", "3.13"]);
    }

    #[test]
    fn test_matrix_value_bound_into_environment() {
        let plans = MatrixExpander::new().expand(&unittest_job());

        let env = plans[2].environment.as_ref().unwrap();
        assert_eq!(env.runtime, "3.11");
        assert_eq!(plans[2].instance.display_name, "unittest (3.11)");
    }

    #[test]
    fn test_instances_are_distinct() {
        let plans = MatrixExpander::new().expand(&unittest_job());

        let ids: std::collections::HashSet<_> = plans.iter().map(|p| p.instance.id).collect();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_job_without_matrix_expands_to_one() {
        let mut job = unittest_job();
        job.matrix = None;
        job.environment = Some(EnvironmentSpec {
            runtime: "3.12".to_string(),
            extras: vec!["docs".to_string()],
        });

        let plans = MatrixExpander::new().expand(&job);
        assert_eq!(plans.len(), 1);
        assert!(plans[0].instance.matrix.is_none());
        assert_eq!(plans[0].instance.display_name, "unittest");
        assert_eq!(plans[0].environment.as_ref().unwrap().runtime, "3.12");
    }

    #[test]
    fn test_step_records_precreated_pending() {
        let plans = MatrixExpander::new().expand(&unittest_job());
        assert_eq!(plans[0].instance.steps.len(), 1);
        assert_eq!(plans[0].instance.steps[0].name, "run tests");
    }
}
