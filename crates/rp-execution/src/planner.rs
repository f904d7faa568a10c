// planner.rs — Turn an accepted proposal into an ordered step list.
//
// Order is fixed: every selected operation (proposal order), then every
// selected change (proposal order), then exactly one refresh step. The list
// is built once and never grows, shrinks or reorders afterwards.

use rp_proposal::{change_label, AcceptedProposal, EntitySchema};
use uuid::Uuid;

use crate::error::ExecutionError;
use crate::step::{ExecutionStep, StepTarget};

/// Steps plus what each one acts on. Only the planner builds one, so
/// `steps` and `targets` always line up.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    review_id: Uuid,
    steps: Vec<ExecutionStep>,
    targets: Vec<StepTarget>,
}

impl ExecutionPlan {
    pub fn review_id(&self) -> Uuid {
        self.review_id
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    pub fn targets(&self) -> &[StepTarget] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false for a plan that came from [`plan`].
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Uuid, Vec<ExecutionStep>, Vec<StepTarget>) {
        (self.review_id, self.steps, self.targets)
    }
}

/// Label of the trailing refresh step, e.g. "Reload category and artifact data".
pub fn refresh_label(schema: &EntitySchema) -> String {
    format!("Reload {} and {} data", schema.group_noun, schema.entity_noun)
}

/// Plan the execution of an accepted proposal.
///
/// Refuses to plan when nothing was selected.
pub fn plan(accepted: &AcceptedProposal) -> Result<ExecutionPlan, ExecutionError> {
    if accepted.item_count() == 0 {
        return Err(ExecutionError::EmptyPlan);
    }

    let capacity = accepted.item_count() + 1;
    let mut steps = Vec::with_capacity(capacity);
    let mut targets = Vec::with_capacity(capacity);

    for selected in &accepted.operations {
        steps.push(ExecutionStep::new(selected.label.clone()));
        targets.push(StepTarget::Operation(selected.operation.clone()));
    }

    for selected in &accepted.changes {
        steps.push(ExecutionStep::new(change_label(
            selected.change.action,
            &selected.target,
            &accepted.schema,
        )));
        targets.push(StepTarget::Change(selected.change.clone()));
    }

    steps.push(ExecutionStep::new(refresh_label(&accepted.schema)));
    targets.push(StepTarget::Refresh);

    tracing::debug!(
        review_id = %accepted.review_id,
        steps = steps.len(),
        "execution planned"
    );

    Ok(ExecutionPlan {
        review_id: accepted.review_id,
        steps,
        targets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rp_proposal::{
        EntityChange, EntitySchema, EntitySnapshot, ExistingEntity, PrerequisiteOperation,
        Proposal, ProposalReview,
    };

    fn accepted(proposal: Proposal, existing: Vec<ExistingEntity>) -> AcceptedProposal {
        let mut review = ProposalReview::new(
            proposal,
            EntitySchema::artifacts(),
            EntitySnapshot::new(existing),
        );
        review.accept().unwrap()
    }

    #[test]
    fn operations_then_changes_then_refresh() {
        let proposal = Proposal::new(
            vec![
                PrerequisiteOperation::create("Security"),
                PrerequisiteOperation::rename("Infra", "Platform"),
            ],
            vec![
                EntityChange::update("a-1").with_field("category", "Security"),
                EntityChange::create().with_field("title", "Benchmark"),
                EntityChange::delete("a-9"),
            ],
        );
        let plan = plan(&accepted(
            proposal,
            vec![ExistingEntity::new("a-1").with_field("title", "Threat model")],
        ))
        .unwrap();

        let labels: Vec<&str> = plan.steps().iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Create category \"Security\"",
                "Rename category \"Infra\" → \"Platform\"",
                "Update artifact \"Threat model\"",
                "Create artifact \"Benchmark\"",
                "Delete artifact \"#a-9\"",
                "Reload category and artifact data",
            ]
        );
        assert!(plan.targets()[..2].iter().all(StepTarget::is_operation));
        assert!(plan.targets()[2..5].iter().all(StepTarget::is_change));
        assert_eq!(plan.targets()[5], StepTarget::Refresh);
    }

    #[test]
    fn every_step_starts_pending() {
        let proposal = Proposal::new(vec![PrerequisiteOperation::delete("Legacy")], vec![]);
        let plan = plan(&accepted(proposal, vec![])).unwrap();
        assert_eq!(plan.len(), 2);
        assert!(plan
            .steps()
            .iter()
            .all(|s| s.status == crate::step::StepStatus::Pending));
    }

    #[test]
    fn unselected_items_produce_no_steps() {
        let proposal = Proposal::new(
            vec![PrerequisiteOperation::create("Security")],
            vec![
                EntityChange::update("a-1").with_field("category", "Security"),
                EntityChange::update("a-2").with_field("priority", "low"),
            ],
        );
        let mut review =
            ProposalReview::new(proposal, EntitySchema::artifacts(), EntitySnapshot::default());
        review.toggle_operation(0).unwrap();
        let plan = plan(&review.accept().unwrap()).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.steps()[0].label, "Update artifact \"#a-2\"");
    }

    #[test]
    fn empty_acceptance_is_refused() {
        let empty = AcceptedProposal {
            review_id: Uuid::new_v4(),
            accepted_at: chrono::Utc::now(),
            schema: EntitySchema::artifacts(),
            operations: vec![],
            changes: vec![],
        };
        assert!(matches!(plan(&empty), Err(ExecutionError::EmptyPlan)));
    }
}
