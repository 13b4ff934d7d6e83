//! Error types for Gantry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Workflow errors
    #[error("Invalid workflow definition: {0}")]
    InvalidWorkflow(String),

    #[error("Workflow validation failed: {0}")]
    WorkflowValidation(String),

    // Provisioning errors
    #[error("Provisioning failed: {0}")]
    Provisioning(String),

    // Step errors
    #[error("Step failed with exit code {exit_code}: {message}")]
    StepFailed { exit_code: i32, message: String },

    #[error("Unknown action reference: {0}")]
    UnknownAction(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
