//! Command handlers.

use crate::commands::EventArg;
use crate::workflow_file::{DEFAULT_WORKFLOW, find_workflow_file, load_workflow};
use console::style;
use gantry_core::events::TracingEventBus;
use gantry_core::run::{InstanceStatus, Run, RunStatus, StepStatus};
use gantry_core::workflow::TriggerEvent;
use gantry_runner::{HostProvisioner, InstanceExecutor};
use gantry_scheduler::{MatrixExpander, Scheduler, TriggerGate};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Write a starter workflow file.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new("gantry.yaml");

    if path.exists() {
        println!("{} gantry.yaml already exists", style("!").yellow());
        return Ok(());
    }

    std::fs::write(path, DEFAULT_WORKFLOW)?;
    println!("{} Created gantry.yaml", style("✓").green());
    Ok(())
}

/// Validate a workflow file.
pub async fn validate(path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let definition = load_workflow(Path::new(path))?;
    definition.validate()?;

    println!(
        "{} Workflow \"{}\" is valid",
        style("✓").green(),
        definition.name
    );
    println!("  Jobs: {}", definition.jobs.len());

    for job in &definition.jobs {
        let fan_out = job
            .matrix
            .as_ref()
            .map(|m| format!(", {} matrix instances", m.values.len()))
            .unwrap_or_default();
        println!("    - {} ({} steps{})", job.name, job.steps.len(), fan_out);

        for step in &job.steps {
            if let Some(reference) = &step.uses
                && !gantry_runner::actions::is_known_action(reference)
            {
                println!(
                    "      {} step '{}' uses unknown action {}",
                    style("!").yellow(),
                    step.name,
                    reference
                );
            }
        }
    }

    Ok(())
}

/// Feed a trigger event to a workflow; execute the run if it matches.
/// Returns false when the run executed and failed.
pub async fn run(
    event: EventArg,
    branch: &str,
    file: Option<PathBuf>,
    source: PathBuf,
    scratch: Option<PathBuf>,
    dry_run: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let Some(path) = find_workflow_file(file.as_deref()) else {
        return Err("no workflow file found (try `gantry init`)".into());
    };

    let workflow = load_workflow(&path)?;
    workflow.validate()?;

    let trigger = TriggerEvent {
        kind: event.into(),
        branch: branch.to_string(),
    };

    if dry_run {
        dry_run_report(&workflow, &trigger);
        return Ok(true);
    }

    let scratch = scratch.unwrap_or_else(|| std::env::temp_dir().join("gantry"));
    let provisioner = Arc::new(HostProvisioner::new(source, scratch));
    let events = Arc::new(TracingEventBus);
    let executor = Arc::new(InstanceExecutor::new(provisioner, events.clone()));
    let scheduler = Scheduler::new(executor, events);

    match scheduler.handle_event(&workflow, trigger).await? {
        None => {
            // A trigger mismatch is a silent no-op, not an error.
            println!(
                "{} Event does not match trigger filter, no run created",
                style("i").blue()
            );
            Ok(true)
        }
        Some(run) => {
            render_run(&run);
            Ok(run.status == RunStatus::Succeeded)
        }
    }
}

fn dry_run_report(workflow: &gantry_core::workflow::WorkflowDefinition, trigger: &TriggerEvent) {
    let gate = TriggerGate::new();
    if !gate.matches(&workflow.on, trigger) {
        println!(
            "{} Event does not match trigger filter, no run would be created",
            style("i").blue()
        );
        return;
    }

    let expander = MatrixExpander::new();
    println!(
        "{} Run would schedule the following instances:",
        style("▶").cyan()
    );
    for job in &workflow.jobs {
        for plan in expander.expand(job) {
            println!(
                "  - {} on {} ({} steps)",
                style(&plan.instance.display_name).bold(),
                plan.runs_on,
                plan.steps.len()
            );
        }
    }
}

fn render_run(run: &Run) {
    println!(
        "\n{} Run {} for workflow {}",
        style("▶").cyan().bold(),
        run.id,
        style(&run.workflow_name).bold()
    );

    for instance in &run.instances {
        let glyph = match instance.status {
            InstanceStatus::Succeeded => style("✓").green(),
            InstanceStatus::Failed => style("✗").red(),
            _ => style("…").dim(),
        };
        let duration = instance
            .duration_ms
            .map(|ms| format!(" ({:.2}s)", ms as f64 / 1000.0))
            .unwrap_or_default();
        println!("  {} {}{}", glyph, instance.display_name, duration);

        for step in &instance.steps {
            let step_glyph = match step.status {
                StepStatus::Succeeded => style("✓").green(),
                StepStatus::Failed => style("✗").red(),
                StepStatus::Skipped => style("-").dim(),
                _ => style("…").dim(),
            };
            let code = match (step.status, step.exit_code) {
                (StepStatus::Failed, Some(code)) => format!(" exit {}", code),
                _ => String::new(),
            };
            println!("      {} {}{}", step_glyph, step.name, code);
        }
    }

    println!();
    match run.status {
        RunStatus::Succeeded => println!(
            "{} Run succeeded in {:.2}s",
            style("✓").green().bold(),
            run.duration_ms.unwrap_or(0) as f64 / 1000.0
        ),
        _ => {
            let failed: Vec<_> = run
                .failed_instances()
                .map(|i| i.display_name.as_str())
                .collect();
            println!(
                "{} Run failed after {:.2}s: {}",
                style("✗").red().bold(),
                run.duration_ms.unwrap_or(0) as f64 / 1000.0,
                failed.join(", ")
            );
        }
    }
}
