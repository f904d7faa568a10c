// review.rs — ProposalReview: one proposal's interactive review state.
//
// A ProposalReview is created when a proposal arrives and owns everything the
// reviewer can change: the selection and the field overrides. It lives until
// the reviewer accepts or rejects; a new proposal always gets a new review,
// so nothing is shared between proposals.
//
// Lifecycle:
//   Pending → Accepted   (accept with a non-empty selection)
//   Pending → Rejected
//
// Toggles and edits on a decided review are ignored.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dependency::DependencyMap;
use crate::diff::{diff_change, summarize_change, FieldDiff};
use crate::entity::{EntitySnapshot, ExistingEntity};
use crate::error::ProposalError;
use crate::labels::{change_label, operation_label, target_label};
use crate::overrides::OverrideMap;
use crate::proposal::{ChangeAction, EntityChange, PrerequisiteOperation, Proposal};
use crate::schema::EntitySchema;
use crate::selection::{SelectionController, SelectionState};

/// Where a review is in its lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Accepted,
    Rejected,
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewStatus::Pending => write!(f, "pending"),
            ReviewStatus::Accepted => write!(f, "accepted"),
            ReviewStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Display model for one entity change.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeCard {
    pub index: usize,
    pub action: ChangeAction,
    pub label: String,
    pub checked: bool,
    pub blocked: bool,
    /// Labels of the unselected operations blocking this change.
    pub blocked_by: Vec<String>,
    /// Collapsed one-line summary.
    pub summary: String,
    pub diffs: Vec<FieldDiff>,
    /// Effective value of every schema field, for the expanded editor.
    pub values: Vec<(String, String)>,
}

/// A selected operation, carried with its position in the proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedOperation {
    pub index: usize,
    pub label: String,
    pub operation: PrerequisiteOperation,
}

/// A selected change with overrides already merged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedChange {
    pub index: usize,
    /// Human-identifying name of the target (title, or `#id`).
    pub target: String,
    pub change: EntityChange,
}

/// What the reviewer approved: ready to be planned and executed.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedProposal {
    pub review_id: Uuid,
    pub accepted_at: DateTime<Utc>,
    pub schema: EntitySchema,
    /// In original proposal order.
    pub operations: Vec<SelectedOperation>,
    /// In original proposal order; blocked changes are never included.
    pub changes: Vec<SelectedChange>,
}

impl AcceptedProposal {
    pub fn item_count(&self) -> usize {
        self.operations.len() + self.changes.len()
    }
}

/// Interactive review of a single proposal.
#[derive(Debug, Clone)]
pub struct ProposalReview {
    review_id: Uuid,
    received_at: DateTime<Utc>,
    status: ReviewStatus,
    proposal: Proposal,
    schema: EntitySchema,
    existing: EntitySnapshot,
    selection: SelectionController,
    overrides: OverrideMap,
}

impl ProposalReview {
    /// Start reviewing a freshly received proposal. Everything starts
    /// selected and no overrides exist.
    pub fn new(proposal: Proposal, schema: EntitySchema, existing: EntitySnapshot) -> Self {
        let deps = DependencyMap::build(&proposal, &schema.group_field);
        let selection =
            SelectionController::new(deps, proposal.operations.len(), proposal.changes.len());
        let review = Self {
            review_id: Uuid::new_v4(),
            received_at: Utc::now(),
            status: ReviewStatus::Pending,
            proposal,
            schema,
            existing,
            selection,
            overrides: OverrideMap::new(),
        };
        tracing::info!(
            review_id = %review.review_id,
            operations = review.proposal.operations.len(),
            changes = review.proposal.changes.len(),
            dependent_changes = review.selection.dependencies().len(),
            "proposal received for review"
        );
        review
    }

    pub fn review_id(&self) -> Uuid {
        self.review_id
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn status(&self) -> ReviewStatus {
        self.status
    }

    pub fn proposal(&self) -> &Proposal {
        &self.proposal
    }

    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    pub fn selection(&self) -> &SelectionState {
        self.selection.state()
    }

    pub fn overrides(&self) -> &OverrideMap {
        &self.overrides
    }

    pub fn dependencies(&self) -> &DependencyMap {
        self.selection.dependencies()
    }

    // ── Selection ──────────────────────────────────────────────

    /// Flip an operation (cascading to dependent changes). Returns whether
    /// anything changed.
    pub fn toggle_operation(&mut self, op_idx: usize) -> Result<bool, ProposalError> {
        self.check_operation(op_idx)?;
        if !self.is_editable("toggle_operation") {
            return Ok(false);
        }
        Ok(self.selection.toggle_operation(op_idx))
    }

    /// Flip a change. Blocked changes are left alone (returns `Ok(false)`).
    pub fn toggle_change(&mut self, change_idx: usize) -> Result<bool, ProposalError> {
        self.check_change(change_idx)?;
        if !self.is_editable("toggle_change") {
            return Ok(false);
        }
        Ok(self.selection.toggle_change(change_idx))
    }

    pub fn select_all_changes(&mut self) {
        if self.is_editable("select_all_changes") {
            self.selection.select_all_changes();
        }
    }

    pub fn clear_changes(&mut self) {
        if self.is_editable("clear_changes") {
            self.selection.clear_changes();
        }
    }

    pub fn is_blocked(&self, change_idx: usize) -> bool {
        self.selection.is_blocked(change_idx)
    }

    pub fn is_operation_selected(&self, op_idx: usize) -> bool {
        self.selection.is_operation_selected(op_idx)
    }

    pub fn is_change_checked(&self, change_idx: usize) -> bool {
        self.selection.is_change_checked(change_idx)
    }

    pub fn selected_operation_count(&self) -> usize {
        self.selection.state().selected_ops.len()
    }

    /// Selected changes, not counting blocked ones.
    pub fn effective_change_count(&self) -> usize {
        self.selection.effective_change_count()
    }

    pub fn can_accept(&self) -> bool {
        self.status == ReviewStatus::Pending && self.selection.has_selection()
    }

    /// Steps accepting now would plan: one per selected item plus the
    /// trailing refresh, or zero when nothing is selectable.
    pub fn planned_step_count(&self) -> usize {
        let items = self.selected_operation_count() + self.effective_change_count();
        if items == 0 {
            0
        } else {
            items + 1
        }
    }

    // ── Overrides ──────────────────────────────────────────────

    pub fn set_override(
        &mut self,
        change_idx: usize,
        field: &str,
        value: &str,
    ) -> Result<(), ProposalError> {
        self.check_change(change_idx)?;
        if self.is_editable("set_override") {
            tracing::debug!(change = change_idx, field, "override set");
            self.overrides.set_override(change_idx, field, value);
        }
        Ok(())
    }

    pub fn clear_override(&mut self, change_idx: usize, field: &str) -> Result<bool, ProposalError> {
        self.check_change(change_idx)?;
        if !self.is_editable("clear_override") {
            return Ok(false);
        }
        Ok(self.overrides.clear_override(change_idx, field))
    }

    pub fn effective_value(&self, change_idx: usize, field: &str) -> Result<String, ProposalError> {
        self.check_change(change_idx)?;
        let change = &self.proposal.changes[change_idx];
        Ok(self
            .overrides
            .effective_value(change_idx, change, self.existing_for(change), field))
    }

    // ── Presentation ───────────────────────────────────────────

    pub fn operation_label(&self, op_idx: usize) -> Result<String, ProposalError> {
        self.check_operation(op_idx)?;
        Ok(operation_label(&self.proposal.operations[op_idx], &self.schema))
    }

    pub fn change_label(&self, change_idx: usize) -> Result<String, ProposalError> {
        self.check_change(change_idx)?;
        let change = &self.proposal.changes[change_idx];
        let target = target_label(change_idx, change, self.existing_for(change), &self.schema);
        Ok(change_label(change.action, &target, &self.schema))
    }

    pub fn change_card(&self, change_idx: usize) -> Result<ChangeCard, ProposalError> {
        self.check_change(change_idx)?;
        let change = &self.proposal.changes[change_idx];
        let existing = self.existing_for(change);

        let blocked_by = self
            .selection
            .blocking_operations(change_idx)
            .into_iter()
            .map(|op| operation_label(&self.proposal.operations[op], &self.schema))
            .collect();

        let values = self
            .schema
            .fields
            .iter()
            .map(|spec| {
                let value =
                    self.overrides
                        .effective_value(change_idx, change, existing, &spec.name);
                (spec.name.clone(), value)
            })
            .collect();

        Ok(ChangeCard {
            index: change_idx,
            action: change.action,
            label: self.change_label(change_idx)?,
            checked: self.selection.is_change_checked(change_idx),
            blocked: self.selection.is_blocked(change_idx),
            blocked_by,
            summary: summarize_change(change, existing, &self.schema),
            diffs: diff_change(change, existing, &self.schema),
            values,
        })
    }

    pub fn change_cards(&self) -> Vec<ChangeCard> {
        (0..self.proposal.changes.len())
            .filter_map(|idx| self.change_card(idx).ok())
            .collect()
    }

    // ── Decision ───────────────────────────────────────────────

    /// Accept the current selection.
    ///
    /// Produces the selected operations and the selected, unblocked,
    /// override-merged changes, both in proposal order. Refuses an empty
    /// selection, in which case the review stays pending.
    pub fn accept(&mut self) -> Result<AcceptedProposal, ProposalError> {
        self.check_pending()?;
        if !self.selection.has_selection() {
            tracing::warn!(review_id = %self.review_id, "accept refused: empty selection");
            return Err(ProposalError::EmptySelection);
        }

        let operations: Vec<SelectedOperation> = self
            .selection
            .selected_operations()
            .into_iter()
            .map(|idx| {
                let operation = self.proposal.operations[idx].clone();
                SelectedOperation {
                    index: idx,
                    label: operation_label(&operation, &self.schema),
                    operation,
                }
            })
            .collect();

        let changes: Vec<SelectedChange> = self
            .selection
            .effective_changes()
            .into_iter()
            .map(|idx| {
                let original = &self.proposal.changes[idx];
                let existing = self.existing_for(original);
                let change = self.overrides.merge_overrides(idx, original, existing);
                SelectedChange {
                    index: idx,
                    target: target_label(idx, &change, existing, &self.schema),
                    change,
                }
            })
            .collect();

        self.status = ReviewStatus::Accepted;
        tracing::info!(
            review_id = %self.review_id,
            operations = operations.len(),
            changes = changes.len(),
            "proposal accepted"
        );

        Ok(AcceptedProposal {
            review_id: self.review_id,
            accepted_at: Utc::now(),
            schema: self.schema.clone(),
            operations,
            changes,
        })
    }

    /// Reject the whole proposal. Only possible before acceptance.
    pub fn reject(&mut self) -> Result<(), ProposalError> {
        self.check_pending()?;
        self.status = ReviewStatus::Rejected;
        tracing::info!(review_id = %self.review_id, "proposal rejected");
        Ok(())
    }

    // ── Helpers ────────────────────────────────────────────────

    fn existing_for(&self, change: &EntityChange) -> Option<&ExistingEntity> {
        match change.action {
            ChangeAction::Create => None,
            ChangeAction::Update | ChangeAction::Delete => self.existing.get(change.id.as_deref()),
        }
    }

    fn is_editable(&self, what: &str) -> bool {
        if self.status != ReviewStatus::Pending {
            tracing::warn!(
                review_id = %self.review_id,
                status = %self.status,
                "{} ignored on decided review",
                what
            );
            return false;
        }
        true
    }

    fn check_pending(&self) -> Result<(), ProposalError> {
        if self.status != ReviewStatus::Pending {
            return Err(ProposalError::AlreadyDecided {
                review_id: self.review_id.to_string(),
                state: self.status.to_string(),
            });
        }
        Ok(())
    }

    fn check_operation(&self, op_idx: usize) -> Result<(), ProposalError> {
        let len = self.proposal.operations.len();
        if op_idx >= len {
            return Err(ProposalError::IndexOutOfRange {
                kind: "operation",
                index: op_idx,
                len,
            });
        }
        Ok(())
    }

    fn check_change(&self, change_idx: usize) -> Result<(), ProposalError> {
        let len = self.proposal.changes.len();
        if change_idx >= len {
            return Err(ProposalError::IndexOutOfRange {
                kind: "change",
                index: change_idx,
                len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> EntitySnapshot {
        EntitySnapshot::new(vec![
            ExistingEntity::new("a-1")
                .with_field("title", "Threat model")
                .with_field("priority", "high")
                .with_field("status", "idea"),
            ExistingEntity::new("a-2").with_field("title", "Old notes"),
        ])
    }

    fn security_review() -> ProposalReview {
        let proposal = Proposal::new(
            vec![PrerequisiteOperation::create("Security")],
            vec![EntityChange::update("a-1").with_field("category", "Security")],
        )
        .with_reasoning("Group the security work");
        ProposalReview::new(proposal, EntitySchema::artifacts(), snapshot())
    }

    #[test]
    fn new_review_is_pending_and_fully_selected() {
        let review = security_review();
        assert_eq!(review.status(), ReviewStatus::Pending);
        assert!(review.is_operation_selected(0));
        assert!(review.is_change_checked(0));
        assert_eq!(review.planned_step_count(), 3);
        assert!(review.can_accept());
    }

    #[test]
    fn deselecting_category_disables_accept() {
        let mut review = security_review();
        assert!(review.toggle_operation(0).unwrap());

        assert!(review.is_blocked(0));
        assert_eq!(review.planned_step_count(), 0);
        assert!(!review.can_accept());
        assert!(matches!(review.accept(), Err(ProposalError::EmptySelection)));
        assert_eq!(review.status(), ReviewStatus::Pending);

        review.toggle_operation(0).unwrap();
        assert!(review.is_change_checked(0));
        assert_eq!(review.planned_step_count(), 3);
    }

    #[test]
    fn change_card_reports_blocking_operation() {
        let mut review = security_review();
        review.toggle_operation(0).unwrap();
        let card = review.change_card(0).unwrap();
        assert!(card.blocked);
        assert!(!card.checked);
        assert_eq!(card.blocked_by, vec!["Create category \"Security\"".to_string()]);
        assert_eq!(card.label, "Update artifact \"Threat model\"");
        assert_eq!(card.summary, "Category: (none) → Security");
    }

    #[test]
    fn card_values_reflect_overrides() {
        let mut review = security_review();
        review.set_override(0, "status", "done").unwrap();
        let card = review.change_card(0).unwrap();
        let status = card.values.iter().find(|(f, _)| f == "status").unwrap();
        assert_eq!(status.1, "done");
        let priority = card.values.iter().find(|(f, _)| f == "priority").unwrap();
        assert_eq!(priority.1, "high");
    }

    #[test]
    fn accept_merges_overrides_and_suppresses_noops() {
        let mut review = security_review();
        review.set_override(0, "priority", "high").unwrap();
        review.set_override(0, "status", "review").unwrap();

        let accepted = review.accept().unwrap();
        assert_eq!(accepted.operations.len(), 1);
        assert_eq!(accepted.operations[0].label, "Create category \"Security\"");
        assert_eq!(accepted.changes.len(), 1);

        let change = &accepted.changes[0].change;
        assert_eq!(change.field("category"), Some("Security"));
        assert_eq!(change.field("status"), Some("review"));
        assert!(change.field("priority").is_none());
        assert_eq!(accepted.changes[0].target, "Threat model");
        assert_eq!(review.status(), ReviewStatus::Accepted);
    }

    #[test]
    fn accept_keeps_proposal_order_and_skips_unchecked() {
        let proposal = Proposal::new(
            vec![
                PrerequisiteOperation::create("Security"),
                PrerequisiteOperation::delete("Legacy"),
            ],
            vec![
                EntityChange::update("a-1").with_field("status", "done"),
                EntityChange::delete("a-2"),
                EntityChange::create().with_field("title", "New dataset"),
            ],
        );
        let mut review = ProposalReview::new(proposal, EntitySchema::artifacts(), snapshot());
        review.toggle_operation(0).unwrap();
        review.toggle_change(1).unwrap();

        let accepted = review.accept().unwrap();
        let op_indices: Vec<usize> = accepted.operations.iter().map(|o| o.index).collect();
        let change_indices: Vec<usize> = accepted.changes.iter().map(|c| c.index).collect();
        assert_eq!(op_indices, vec![1]);
        assert_eq!(change_indices, vec![0, 2]);
        assert_eq!(accepted.item_count(), 3);
    }

    #[test]
    fn decided_review_ignores_edits_and_refuses_second_decision() {
        let mut review = security_review();
        review.reject().unwrap();

        assert!(!review.toggle_operation(0).unwrap());
        review.set_override(0, "status", "done").unwrap();
        assert!(review.overrides().is_empty());
        assert!(matches!(
            review.accept(),
            Err(ProposalError::AlreadyDecided { .. })
        ));
        assert!(review.reject().is_err());
    }

    #[test]
    fn out_of_range_indices_are_errors() {
        let mut review = security_review();
        assert!(matches!(
            review.toggle_change(4),
            Err(ProposalError::IndexOutOfRange { kind: "change", .. })
        ));
        assert!(matches!(
            review.operation_label(1),
            Err(ProposalError::IndexOutOfRange { kind: "operation", .. })
        ));
    }

    #[test]
    fn override_on_blocked_change_survives_unblock() {
        let mut review = security_review();
        review.toggle_operation(0).unwrap();
        review.set_override(0, "status", "done").unwrap();
        review.toggle_operation(0).unwrap();

        let accepted = review.accept().unwrap();
        assert_eq!(accepted.changes[0].change.field("status"), Some("done"));
    }
}
