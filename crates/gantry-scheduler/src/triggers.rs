//! Trigger matching and evaluation.

use gantry_core::workflow::{TriggerConfig, TriggerEvent};

/// Gate deciding whether an incoming event creates a run.
///
/// A mismatch is a silent no-op, never an error.
pub struct TriggerGate;

impl TriggerGate {
    pub fn new() -> Self {
        Self
    }

    /// True iff the event kind is one of the configured set and the branch
    /// exactly matches the configured target.
    pub fn matches(&self, config: &TriggerConfig, event: &TriggerEvent) -> bool {
        config.events.contains(&event.kind) && config.branch == event.branch
    }
}

impl Default for TriggerGate {
    fn default() -> Self {
        Self::new()
    }
}
