//! CLI command definitions.

use clap::{Subcommand, ValueEnum};
use gantry_core::workflow::TriggerEventKind;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter workflow file
    Init,

    /// Validate a workflow file
    Validate {
        /// Path to workflow file
        #[arg(default_value = "gantry.yaml")]
        path: String,
    },

    /// Feed a trigger event to a workflow and execute the resulting run
    Run {
        /// Event kind arriving from the external source
        #[arg(short, long, value_enum, default_value_t = EventArg::Push)]
        event: EventArg,

        /// Branch the event refers to
        #[arg(short, long)]
        branch: String,

        /// Path to workflow file (searched in standard locations if omitted)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Repository to check out into each instance workspace
        #[arg(short, long, default_value = ".")]
        source: PathBuf,

        /// Scratch directory holding per-instance workspaces
        #[arg(long)]
        scratch: Option<PathBuf>,

        /// Print the expanded instance set without executing
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum EventArg {
    Push,
    PullRequest,
}

impl From<EventArg> for TriggerEventKind {
    fn from(value: EventArg) -> Self {
        match value {
            EventArg::Push => TriggerEventKind::Push,
            EventArg::PullRequest => TriggerEventKind::PullRequest,
        }
    }
}
