// executor.rs — Run a plan one step at a time.
//
// Steps run strictly in order and never concurrently: a later step may rely
// on the externally visible effect of an earlier one (a change filed under a
// category that an earlier step created). Each step is awaited before the
// next starts, and a failing step is recorded and skipped past; it never
// stops the steps after it.
//
// Between the last operation step and the first change step the groupings
// are reloaded, so the data source reflects newly created or renamed
// groupings before any change refers to them. That reload is not a step of
// its own; if it fails the failure is logged and kept on the report.
//
// There is no cancellation and no timeout. A hung action hangs its step.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rp_proposal::{EntityChange, PrerequisiteOperation};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ActionError;
use crate::events::{EventDispatcher, ReviewEvent};
use crate::planner::ExecutionPlan;
use crate::progress::{ProgressSink, ProgressSnapshot};
use crate::step::{ExecutionStep, StepStatus, StepTarget};

/// Persistence and refresh actions supplied by the data collaborator.
///
/// Each call is one bounded asynchronous request. An `Err` carries the
/// message shown next to the failed step.
#[async_trait]
pub trait PersistenceActions: Send + Sync {
    /// Persist one grouping operation (create/rename/delete a category).
    async fn apply_operation(&self, operation: &PrerequisiteOperation) -> Result<(), ActionError>;

    /// Persist one entity change, with reviewer overrides already merged.
    async fn apply_change(&self, change: &EntityChange) -> Result<(), ActionError>;

    /// Reload groupings from the data source.
    async fn reload_groupings(&self) -> Result<(), ActionError>;

    /// Reload entities from the data source.
    async fn reload_entities(&self) -> Result<(), ActionError>;
}

/// Final state of an execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub review_id: Uuid,
    /// Same length and order as the plan; no step is left pending.
    pub steps: Vec<ExecutionStep>,
    /// Set when the reload between operations and changes failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interim_refresh_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot::of(&self.steps)
    }

    pub fn applied(&self) -> usize {
        self.progress().done
    }

    pub fn failed(&self) -> usize {
        self.progress().errors
    }

    pub fn is_complete(&self) -> bool {
        self.progress().is_complete()
    }

    /// e.g. "3 applied, 1 failed".
    pub fn summary(&self) -> String {
        format!("{} applied, {} failed", self.applied(), self.failed())
    }

    /// Labels of the steps with the given status, leaving out the trailing
    /// refresh step.
    pub fn item_labels(&self, status: StepStatus) -> Vec<&str> {
        let items = self.steps.len().saturating_sub(1);
        self.steps[..items]
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.label.as_str())
            .collect()
    }

    /// Message for the chat thread the proposal came from, naming what was
    /// applied and what failed.
    pub fn chat_message(&self) -> String {
        let applied = self.item_labels(StepStatus::Done);
        let failed: Vec<&ExecutionStep> = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Error)
            .collect();

        let mut message = format!(
            "Applied {} of {} proposed action(s).",
            applied.len(),
            self.steps.len().saturating_sub(1)
        );
        for label in applied {
            message.push_str(&format!("\n- {}", label));
        }
        if !failed.is_empty() {
            message.push_str("\nFailed:");
            for step in failed {
                message.push_str(&format!(
                    "\n- {}: {}",
                    step.label,
                    step.error.as_deref().unwrap_or("unknown error")
                ));
            }
        }
        message
    }
}

/// Runs execution plans against injected actions, reporting progress as it
/// goes.
pub struct StepExecutor {
    actions: Arc<dyn PersistenceActions>,
    progress: Option<Box<dyn ProgressSink>>,
    events: Option<EventDispatcher>,
}

impl StepExecutor {
    pub fn new(actions: Arc<dyn PersistenceActions>) -> Self {
        Self {
            actions,
            progress: None,
            events: None,
        }
    }

    /// Receive the full step list after every transition.
    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    /// Dispatch an `execution_completed` event when a run finishes.
    pub fn with_events(mut self, dispatcher: EventDispatcher) -> Self {
        self.events = Some(dispatcher);
        self
    }

    /// Execute every step of the plan, in order.
    ///
    /// Never fails: step failures are captured on the steps themselves.
    pub async fn run(&self, plan: ExecutionPlan) -> ExecutionReport {
        let (review_id, mut steps, targets) = plan.into_parts();
        let started_at = Utc::now();
        let mut interim_refresh_error = None;

        tracing::info!(review_id = %review_id, steps = steps.len(), "execution started");
        self.emit(&steps);

        for (idx, target) in targets.iter().enumerate() {
            if target.is_change() && idx > 0 && targets[idx - 1].is_operation() {
                if let Err(e) = self.actions.reload_groupings().await {
                    tracing::warn!(
                        review_id = %review_id,
                        error = %e,
                        "grouping reload before entity changes failed"
                    );
                    interim_refresh_error = Some(e.to_string());
                }
            }

            steps[idx].start();
            self.emit(&steps);

            let result = match target {
                StepTarget::Operation(operation) => self.actions.apply_operation(operation).await,
                StepTarget::Change(change) => self.actions.apply_change(change).await,
                StepTarget::Refresh => self.refresh_all().await,
            };

            if let Err(e) = &result {
                tracing::warn!(
                    review_id = %review_id,
                    step = idx,
                    label = %steps[idx].label,
                    error = %e,
                    "step failed"
                );
            }
            steps[idx].finish(&result);
            self.emit(&steps);
        }

        let report = ExecutionReport {
            review_id,
            steps,
            interim_refresh_error,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            review_id = %review_id,
            applied = report.applied(),
            failed = report.failed(),
            "execution completed"
        );

        if let Some(events) = &self.events {
            events.dispatch(&ReviewEvent::execution_completed(&report));
        }

        report
    }

    /// Reload groupings and entities. Both are attempted even if the first
    /// fails.
    async fn refresh_all(&self) -> Result<(), ActionError> {
        let groupings = self.actions.reload_groupings().await;
        let entities = self.actions.reload_entities().await;
        match (groupings, entities) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(g), Err(e)) => Err(ActionError::new(format!("{}; {}", g, e))),
        }
    }

    fn emit(&self, steps: &[ExecutionStep]) {
        if let Some(sink) = &self.progress {
            sink.on_progress(steps);
        }
    }
}
