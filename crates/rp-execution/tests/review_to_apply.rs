// review_to_apply.rs — End-to-end: proposal → review → plan → execute.
//
// The data source here behaves like the real REST backend in one important
// way: an entity can only be filed under a category the client has *loaded*.
// That makes the reload between operation steps and change steps observable.
//
// VERIFY:
//   - deselecting a category create blocks and deselects the dependent update
//   - reviewer overrides reach the backend, minus no-op fields
//   - one failing step never stops the rest, and nothing stays pending
//   - completion is reported to notification sinks

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::tempdir;

use rp_execution::{
    plan, ActionError, EventDispatcher, ExecutionStep, LogSink, PersistenceActions,
    ProgressSnapshot, ReviewEvent, StepExecutor, StepStatus,
};
use rp_proposal::{
    ChangeAction, EntityChange, EntitySchema, EntitySnapshot, ExistingEntity, OperationAction,
    PrerequisiteOperation, Proposal, ProposalError, ProposalReview,
};

/// Backend with categories and artifacts plus the client's loaded view of
/// the categories.
struct Backend {
    categories: Mutex<Vec<String>>,
    loaded_categories: Mutex<Vec<String>>,
    artifacts: Mutex<HashMap<String, BTreeMap<String, String>>>,
    writes: Mutex<Vec<EntityChange>>,
    entity_reloads: Mutex<usize>,
}

impl Backend {
    fn new(categories: &[&str], artifacts: Vec<ExistingEntity>) -> Self {
        let categories: Vec<String> = categories.iter().map(|c| c.to_string()).collect();
        Self {
            loaded_categories: Mutex::new(categories.clone()),
            categories: Mutex::new(categories),
            artifacts: Mutex::new(artifacts.into_iter().map(|a| (a.id, a.fields)).collect()),
            writes: Mutex::new(Vec::new()),
            entity_reloads: Mutex::new(0),
        }
    }

    fn snapshot(&self) -> EntitySnapshot {
        let artifacts = self.artifacts.lock().unwrap();
        EntitySnapshot::new(artifacts.iter().map(|(id, fields)| ExistingEntity {
            id: id.clone(),
            fields: fields.clone(),
        }))
    }
}

#[async_trait]
impl PersistenceActions for Backend {
    async fn apply_operation(&self, op: &PrerequisiteOperation) -> Result<(), ActionError> {
        let mut categories = self.categories.lock().unwrap();
        match op.action {
            OperationAction::Create => {
                let name = op.name.clone().ok_or("create without a name")?;
                if categories.contains(&name) {
                    return Err(ActionError::new(format!("category {} already exists", name)));
                }
                categories.push(name);
            }
            OperationAction::Rename => {
                let old = op.old_name.as_deref().ok_or("rename without old name")?;
                let new = op.new_name.clone().ok_or("rename without new name")?;
                let slot = categories
                    .iter_mut()
                    .find(|c| c.as_str() == old)
                    .ok_or_else(|| ActionError::new(format!("no category {}", old)))?;
                *slot = new;
            }
            OperationAction::Delete => {
                let name = op.name.as_deref().ok_or("delete without a name")?;
                categories.retain(|c| c != name);
            }
        }
        Ok(())
    }

    async fn apply_change(&self, change: &EntityChange) -> Result<(), ActionError> {
        if let Some(category) = change.field("category") {
            if !self.loaded_categories.lock().unwrap().iter().any(|c| c == category) {
                return Err(ActionError::new(format!("unknown category {}", category)));
            }
        }
        let mut artifacts = self.artifacts.lock().unwrap();
        match change.action {
            ChangeAction::Create => {
                let id = format!("a-{}", artifacts.len() + 1);
                artifacts.insert(id, change.fields.clone());
            }
            ChangeAction::Update => {
                let id = change.id.as_deref().ok_or("update without id")?;
                let fields = artifacts
                    .get_mut(id)
                    .ok_or_else(|| ActionError::new(format!("artifact {} not found", id)))?;
                fields.extend(change.fields.clone());
            }
            ChangeAction::Delete => {
                let id = change.id.as_deref().ok_or("delete without id")?;
                artifacts
                    .remove(id)
                    .ok_or_else(|| ActionError::new(format!("artifact {} not found", id)))?;
            }
        }
        self.writes.lock().unwrap().push(change.clone());
        Ok(())
    }

    async fn reload_groupings(&self) -> Result<(), ActionError> {
        let current = self.categories.lock().unwrap().clone();
        *self.loaded_categories.lock().unwrap() = current;
        Ok(())
    }

    async fn reload_entities(&self) -> Result<(), ActionError> {
        *self.entity_reloads.lock().unwrap() += 1;
        Ok(())
    }
}

fn threat_model() -> ExistingEntity {
    ExistingEntity::new("a-1")
        .with_field("title", "Threat model")
        .with_field("priority", "high")
        .with_field("status", "idea")
}

fn security_proposal() -> Proposal {
    Proposal::new(
        vec![PrerequisiteOperation::create("Security")],
        vec![EntityChange::update("a-1").with_field("category", "Security")],
    )
}

#[tokio::test]
async fn category_create_gates_dependent_update() {
    let backend = Arc::new(Backend::new(&["Research"], vec![threat_model()]));
    let mut review = ProposalReview::new(
        security_proposal(),
        EntitySchema::artifacts(),
        backend.snapshot(),
    );

    // Both selected initially: 2 steps + refresh.
    assert_eq!(review.planned_step_count(), 3);

    // Deselecting the category create deselects the update.
    review.toggle_operation(0).unwrap();
    assert!(!review.is_change_checked(0));
    assert_eq!(review.planned_step_count(), 0);
    assert!(!review.can_accept());
    assert!(!review.toggle_change(0).unwrap());
    assert!(matches!(review.accept(), Err(ProposalError::EmptySelection)));

    // Reselecting restores both.
    review.toggle_operation(0).unwrap();
    assert!(review.is_change_checked(0));
    assert_eq!(review.planned_step_count(), 3);

    let accepted = review.accept().unwrap();
    let plan = plan(&accepted).unwrap();
    assert_eq!(plan.len(), 3);

    let report = StepExecutor::new(backend.clone()).run(plan).await;

    // The update only succeeds because categories were reloaded after the
    // create and before the update.
    assert_eq!(report.summary(), "3 applied, 0 failed");
    assert_eq!(
        backend.artifacts.lock().unwrap()["a-1"].get("category").map(String::as_str),
        Some("Security")
    );
    assert_eq!(*backend.entity_reloads.lock().unwrap(), 1);
}

#[tokio::test]
async fn override_matching_existing_value_is_not_sent() {
    let backend = Arc::new(Backend::new(&["Research"], vec![threat_model()]));
    let proposal = Proposal::new(
        vec![],
        vec![EntityChange::update("a-1").with_field("status", "review")],
    );
    let mut review = ProposalReview::new(proposal, EntitySchema::artifacts(), backend.snapshot());

    // Priority is already "high" and the proposal never mentioned it.
    review.set_override(0, "priority", "high").unwrap();
    review.set_override(0, "status", "done").unwrap();
    assert_eq!(review.effective_value(0, "priority").unwrap(), "high");

    let report = StepExecutor::new(backend.clone())
        .run(plan(&review.accept().unwrap()).unwrap())
        .await;
    assert!(report.is_complete());

    let writes = backend.writes.lock().unwrap();
    assert_eq!(writes.len(), 1);
    assert!(writes[0].field("priority").is_none());
    assert_eq!(writes[0].field("status"), Some("done"));
}

#[tokio::test]
async fn failed_step_is_isolated_and_reported() {
    let backend = Arc::new(Backend::new(
        &["Research", "Legacy"],
        vec![threat_model(), ExistingEntity::new("a-2").with_field("title", "Old notes")],
    ));
    let proposal = Proposal::new(
        vec![
            PrerequisiteOperation::rename("Nope", "Platform"),
            PrerequisiteOperation::delete("Legacy"),
        ],
        vec![
            EntityChange::delete("a-404"),
            EntityChange::update("a-2").with_field("status", "archived"),
            EntityChange::create()
                .with_field("title", "Eval harness")
                .with_field("category", "Research"),
        ],
    )
    .with_reasoning("Tidy up categories and archive old notes");
    let mut review = ProposalReview::new(proposal, EntitySchema::artifacts(), backend.snapshot());

    let accepted = review.accept().unwrap();
    let plan = plan(&accepted).unwrap();
    let planned = plan.len();

    let dir = tempdir().unwrap();
    let log_path = dir.path().join("review-events.jsonl");
    let snapshots: Arc<Mutex<Vec<Vec<ExecutionStep>>>> = Arc::default();
    let executor = StepExecutor::new(backend.clone())
        .with_progress({
            let snapshots = snapshots.clone();
            move |steps: &[ExecutionStep]| snapshots.lock().unwrap().push(steps.to_vec())
        })
        .with_events(EventDispatcher::new().with_sink(LogSink::new(&log_path)));

    let report = executor.run(plan).await;

    // Same length as planned, nothing left pending.
    assert_eq!(report.steps.len(), planned);
    assert!(report.steps.iter().all(|s| s.status.is_finished()));

    let statuses: Vec<StepStatus> = report.steps.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            StepStatus::Error, // rename of a missing category
            StepStatus::Done,
            StepStatus::Error, // delete of a missing artifact
            StepStatus::Done,
            StepStatus::Done,
            StepStatus::Done, // refresh
        ]
    );
    assert_eq!(report.summary(), "4 applied, 2 failed");
    assert_eq!(report.steps[0].error.as_deref(), Some("no category Nope"));

    // Every snapshot carries the full list.
    let snapshots = snapshots.lock().unwrap();
    assert!(snapshots.iter().all(|s| s.len() == planned));
    assert!(ProgressSnapshot::of(snapshots.last().unwrap()).is_complete());

    // Completion reached the event log.
    let line = fs::read_to_string(&log_path).unwrap();
    let event: ReviewEvent = serde_json::from_str(line.trim()).unwrap();
    match event {
        ReviewEvent::ExecutionCompleted {
            review_id,
            failed,
            summary,
            ..
        } => {
            assert_eq!(review_id, accepted.review_id);
            assert_eq!(failed.len(), 2);
            assert_eq!(summary, "4 applied, 2 failed");
        }
        other => panic!("unexpected event {}", other.event_type()),
    }
}
