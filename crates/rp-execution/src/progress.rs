// progress.rs — Progress reporting for a running execution.
//
// Subscribers always receive the full step list, never a delta, so every
// callback sees a complete, consistent snapshot.

use serde::Serialize;

use crate::step::{ExecutionStep, StepStatus};

/// Receives the full step list after every status transition.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, steps: &[ExecutionStep]);
}

impl<F> ProgressSink for F
where
    F: Fn(&[ExecutionStep]) + Send + Sync,
{
    fn on_progress(&self, steps: &[ExecutionStep]) {
        self(steps)
    }
}

/// Counts derived from one step-list snapshot, for a progress bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub done: usize,
    pub errors: usize,
    pub running: usize,
}

impl ProgressSnapshot {
    pub fn of(steps: &[ExecutionStep]) -> Self {
        let count = |status: StepStatus| steps.iter().filter(|s| s.status == status).count();
        Self {
            total: steps.len(),
            done: count(StepStatus::Done),
            errors: count(StepStatus::Error),
            running: count(StepStatus::Running),
        }
    }

    /// Done plus error.
    pub fn finished(&self) -> usize {
        self.done + self.errors
    }

    /// Share of finished steps, 0–100. An empty list is 0%.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        (self.finished() * 100 / self.total) as u8
    }

    /// Every step is done or error.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.finished() == self.total
    }
}

impl std::fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} ({}%)", self.done, self.total, self.percent())?;
        if self.errors > 0 {
            write!(f, ", {} failed", self.errors)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ActionError;

    fn steps(statuses: &[StepStatus]) -> Vec<ExecutionStep> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                let mut step = ExecutionStep::new(format!("step {}", i));
                if *status != StepStatus::Pending {
                    step.start();
                }
                match status {
                    StepStatus::Done => {
                        step.finish(&Ok(()));
                    }
                    StepStatus::Error => {
                        step.finish(&Err(ActionError::new("boom")));
                    }
                    _ => {}
                }
                step
            })
            .collect()
    }

    #[test]
    fn counts_and_percent() {
        let snapshot = ProgressSnapshot::of(&steps(&[
            StepStatus::Done,
            StepStatus::Error,
            StepStatus::Running,
            StepStatus::Pending,
        ]));
        assert_eq!(snapshot.done, 1);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.running, 1);
        assert_eq!(snapshot.finished(), 2);
        assert_eq!(snapshot.percent(), 50);
        assert!(!snapshot.is_complete());
        assert_eq!(snapshot.to_string(), "1/4 (50%), 1 failed");
    }

    #[test]
    fn complete_when_all_finished() {
        let snapshot =
            ProgressSnapshot::of(&steps(&[StepStatus::Done, StepStatus::Error, StepStatus::Done]));
        assert!(snapshot.is_complete());
        assert_eq!(snapshot.percent(), 100);
    }

    #[test]
    fn empty_list_is_zero_percent_and_incomplete() {
        let snapshot = ProgressSnapshot::of(&[]);
        assert_eq!(snapshot.percent(), 0);
        assert!(!snapshot.is_complete());
    }

    #[test]
    fn closures_are_sinks() {
        let seen = std::sync::Mutex::new(0usize);
        let sink = |steps: &[ExecutionStep]| *seen.lock().unwrap() += steps.len();
        sink.on_progress(&steps(&[StepStatus::Pending, StepStatus::Pending]));
        assert_eq!(*seen.lock().unwrap(), 2);
    }
}
