// events.rs — Review outcome events and notification dispatch.
//
// The host (chat thread, audit log, toast) learns about accepted, rejected
// and executed proposals through these events. Sinks observe; they can't
// influence execution, and a failing sink never blocks the others.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rp_proposal::AcceptedProposal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::executor::ExecutionReport;
use crate::step::StepStatus;

/// Events emitted at the end of a review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum ReviewEvent {
    /// The reviewer accepted a selection.
    ProposalAccepted {
        review_id: Uuid,
        operations: usize,
        changes: usize,
        timestamp: DateTime<Utc>,
    },

    /// The reviewer rejected the whole proposal.
    ProposalRejected {
        review_id: Uuid,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Every planned step finished.
    ExecutionCompleted {
        review_id: Uuid,
        applied: Vec<String>,
        failed: Vec<String>,
        summary: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl ReviewEvent {
    pub fn event_type(&self) -> &str {
        match self {
            ReviewEvent::ProposalAccepted { .. } => "proposal_accepted",
            ReviewEvent::ProposalRejected { .. } => "proposal_rejected",
            ReviewEvent::ExecutionCompleted { .. } => "execution_completed",
        }
    }

    pub fn review_id(&self) -> Uuid {
        match self {
            ReviewEvent::ProposalAccepted { review_id, .. }
            | ReviewEvent::ProposalRejected { review_id, .. }
            | ReviewEvent::ExecutionCompleted { review_id, .. } => *review_id,
        }
    }

    pub fn proposal_accepted(accepted: &AcceptedProposal) -> Self {
        ReviewEvent::ProposalAccepted {
            review_id: accepted.review_id,
            operations: accepted.operations.len(),
            changes: accepted.changes.len(),
            timestamp: Utc::now(),
        }
    }

    pub fn proposal_rejected(review_id: Uuid, reason: Option<&str>) -> Self {
        ReviewEvent::ProposalRejected {
            review_id,
            reason: reason.map(str::to_string),
            timestamp: Utc::now(),
        }
    }

    pub fn execution_completed(report: &ExecutionReport) -> Self {
        ReviewEvent::ExecutionCompleted {
            review_id: report.review_id,
            applied: report
                .item_labels(StepStatus::Done)
                .into_iter()
                .map(str::to_string)
                .collect(),
            failed: report
                .steps
                .iter()
                .filter(|s| s.status == StepStatus::Error)
                .map(|s| s.label.clone())
                .collect(),
            summary: report.summary(),
            message: report.chat_message(),
            timestamp: Utc::now(),
        }
    }
}

/// Receives review events. Errors are logged by the dispatcher and never
/// reach the review or the executor.
pub trait NotificationSink: Send + Sync {
    fn send(&self, event: &ReviewEvent) -> Result<(), ExecutionError>;
}

/// Appends events as JSONL to a file.
pub struct LogSink {
    path: PathBuf,
}

impl LogSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl NotificationSink for LogSink {
    fn send(&self, event: &ReviewEvent) -> Result<(), ExecutionError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ExecutionError::IoError {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| ExecutionError::IoError {
                path: self.path.display().to_string(),
                source,
            })?;

        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json).map_err(|source| ExecutionError::IoError {
            path: self.path.display().to_string(),
            source,
        })?;

        Ok(())
    }
}

/// Fans events out to every registered sink.
#[derive(Default)]
pub struct EventDispatcher {
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn with_sink(mut self, sink: impl NotificationSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn dispatch(&self, event: &ReviewEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.send(event) {
                tracing::warn!(event = event.event_type(), "notification sink error: {}", e);
            }
        }
    }
}
