//! # rp-execution
//!
//! Applies an accepted proposal as an ordered list of independently failing
//! steps, reporting progress after every transition.
//!
//! - [`plan`] — operations, then changes, then one refresh step
//! - [`StepExecutor`] — runs a plan one step at a time against injected
//!   [`PersistenceActions`]
//! - [`ProgressSink`] / [`ProgressSnapshot`] — live progress for the UI
//! - [`EventDispatcher`] / [`ReviewEvent`] — completion notification

pub mod error;
pub mod events;
pub mod executor;
pub mod planner;
pub mod progress;
pub mod step;

pub use error::{ActionError, ExecutionError};
pub use events::{EventDispatcher, LogSink, NotificationSink, ReviewEvent};
pub use executor::{ExecutionReport, PersistenceActions, StepExecutor};
pub use planner::{plan, refresh_label, ExecutionPlan};
pub use progress::{ProgressSink, ProgressSnapshot};
pub use step::{ExecutionStep, StepStatus, StepTarget};
