// error.rs — Error types for planning and execution.

use thiserror::Error;

/// Errors raised outside step boundaries. A failing step never produces one
/// of these; it is recorded on the step instead.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Nothing was selected, so there is nothing to plan.
    #[error("refusing to plan an empty execution")]
    EmptyPlan,

    /// A file I/O operation failed (event log sinks).
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Failure of one persistence or refresh action. Carries only the
/// human-readable message shown next to the failed step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ActionError(pub String);

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for ActionError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for ActionError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}
