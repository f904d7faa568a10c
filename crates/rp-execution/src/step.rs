// step.rs — One unit of execution and its status.
//
// A step moves pending → running → done, or pending → running → error.
// It never moves backwards.

use std::fmt;

use rp_proposal::{EntityChange, PrerequisiteOperation};
use serde::{Deserialize, Serialize};

use crate::error::ActionError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Error,
}

impl StepStatus {
    /// Done or error.
    pub fn is_finished(&self) -> bool {
        matches!(self, StepStatus::Done | StepStatus::Error)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Done => write!(f, "done"),
            StepStatus::Error => write!(f, "error"),
        }
    }
}

/// What the progress subscriber sees for one step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionStep {
    pub label: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionStep {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            status: StepStatus::Pending,
            error: None,
        }
    }

    /// pending → running. Returns false (and changes nothing) from any other
    /// status.
    pub fn start(&mut self) -> bool {
        if self.status != StepStatus::Pending {
            return false;
        }
        self.status = StepStatus::Running;
        true
    }

    /// running → done / error. Returns false (and changes nothing) unless the
    /// step is running.
    pub fn finish(&mut self, result: &Result<(), ActionError>) -> bool {
        if self.status != StepStatus::Running {
            return false;
        }
        match result {
            Ok(()) => self.status = StepStatus::Done,
            Err(e) => {
                self.status = StepStatus::Error;
                self.error = Some(e.message().to_string());
            }
        }
        true
    }
}

/// What a planned step acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepTarget {
    Operation(PrerequisiteOperation),
    Change(EntityChange),
    /// Trailing re-sync of groupings and entities.
    Refresh,
}

impl StepTarget {
    pub fn is_operation(&self) -> bool {
        matches!(self, StepTarget::Operation(_))
    }

    pub fn is_change(&self) -> bool {
        matches!(self, StepTarget::Change(_))
    }
}
