//! Trigger gating, matrix fan-out, and run orchestration for Gantry.

pub mod matrix;
pub mod scheduler;
pub mod triggers;

pub use matrix::MatrixExpander;
pub use scheduler::Scheduler;
pub use triggers::TriggerGate;
