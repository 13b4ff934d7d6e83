//! Environment provisioning and step execution engine for Gantry.

pub mod actions;
pub mod environments;
pub mod executor;
pub mod runner;
pub mod shell;
pub mod testing;

pub use actions::ActionRunner;
pub use environments::{EnvRequest, HostProvisioner, ProvisionedEnv, Provisioner};
pub use executor::InstanceExecutor;
pub use runner::{OutputLine, OutputStream, StepContext, StepOutcome, StepRunner};
pub use shell::ShellRunner;
