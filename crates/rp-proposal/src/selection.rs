// selection.rs — Which operations and changes the reviewer has checked.
//
// Two rules hold at all times:
//   - a blocked change can never be checked on its own (toggling it is a no-op)
//   - when an operation's checked state flips, its dependent changes follow
//
// The cascade is computed from the *new* operation set, never the old one.
//
// A change can stay nominally selected while blocked (see toggle_operation).
// Everything that counts or applies selections goes through
// `effective_changes`, which drops blocked changes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::dependency::DependencyMap;

/// Raw checked sets, as the reviewer left them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub selected_ops: BTreeSet<usize>,
    pub selected_changes: BTreeSet<usize>,
}

/// Owns the selection state for one proposal and enforces the dependency
/// rules as the reviewer toggles items.
#[derive(Debug, Clone)]
pub struct SelectionController {
    deps: DependencyMap,
    op_count: usize,
    change_count: usize,
    state: SelectionState,
}

impl SelectionController {
    /// Everything starts selected.
    pub fn new(deps: DependencyMap, op_count: usize, change_count: usize) -> Self {
        let state = SelectionState {
            selected_ops: (0..op_count).collect(),
            selected_changes: (0..change_count).collect(),
        };
        Self {
            deps,
            op_count,
            change_count,
            state,
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn dependencies(&self) -> &DependencyMap {
        &self.deps
    }

    /// True iff the change requires an operation that isn't selected.
    pub fn is_blocked(&self, change_idx: usize) -> bool {
        Self::blocked_under(&self.deps, &self.state.selected_ops, change_idx)
    }

    /// The unselected operations currently blocking a change.
    pub fn blocking_operations(&self, change_idx: usize) -> Vec<usize> {
        self.deps
            .dependencies(change_idx)
            .iter()
            .copied()
            .filter(|op| !self.state.selected_ops.contains(op))
            .collect()
    }

    pub fn is_operation_selected(&self, op_idx: usize) -> bool {
        self.state.selected_ops.contains(&op_idx)
    }

    /// Whether the change shows as checked: selected and not blocked.
    pub fn is_change_checked(&self, change_idx: usize) -> bool {
        self.state.selected_changes.contains(&change_idx) && !self.is_blocked(change_idx)
    }

    /// Flip a change. No-op (returns false) when the change is blocked or
    /// out of range.
    pub fn toggle_change(&mut self, change_idx: usize) -> bool {
        if change_idx >= self.change_count || self.is_blocked(change_idx) {
            tracing::debug!(change = change_idx, "toggle ignored: change is blocked");
            return false;
        }
        if !self.state.selected_changes.remove(&change_idx) {
            self.state.selected_changes.insert(change_idx);
        }
        tracing::debug!(
            change = change_idx,
            selected = self.state.selected_changes.contains(&change_idx),
            "change toggled"
        );
        true
    }

    /// Flip an operation and cascade to its dependent changes.
    ///
    /// Deselecting removes a dependent change unless it has *other*
    /// dependencies and all of them are still selected. Selecting re-adds every dependent
    /// change whose dependencies are now all selected.
    pub fn toggle_operation(&mut self, op_idx: usize) -> bool {
        if op_idx >= self.op_count {
            return false;
        }

        let mut new_ops = self.state.selected_ops.clone();
        let now_selected = if new_ops.remove(&op_idx) {
            false
        } else {
            new_ops.insert(op_idx);
            true
        };

        let new_changes = Self::cascade(
            &self.deps,
            &new_ops,
            &self.state.selected_changes,
            op_idx,
            now_selected,
        );

        tracing::debug!(
            operation = op_idx,
            selected = now_selected,
            dependents = self.deps.dependents(op_idx).len(),
            "operation toggled"
        );

        self.state = SelectionState {
            selected_ops: new_ops,
            selected_changes: new_changes,
        };
        true
    }

    /// Select every change that isn't blocked. Blocked changes stay as they
    /// are.
    pub fn select_all_changes(&mut self) {
        for idx in 0..self.change_count {
            if !self.is_blocked(idx) {
                self.state.selected_changes.insert(idx);
            }
        }
    }

    pub fn clear_changes(&mut self) {
        self.state.selected_changes.clear();
    }

    /// Selected operation indices, in proposal order.
    pub fn selected_operations(&self) -> Vec<usize> {
        self.state.selected_ops.iter().copied().collect()
    }

    /// Selected changes that are not blocked, in proposal order.
    pub fn effective_changes(&self) -> Vec<usize> {
        self.state
            .selected_changes
            .iter()
            .copied()
            .filter(|&idx| !self.is_blocked(idx))
            .collect()
    }

    pub fn effective_change_count(&self) -> usize {
        self.effective_changes().len()
    }

    /// True when accepting would plan at least one real step.
    pub fn has_selection(&self) -> bool {
        !self.state.selected_ops.is_empty() || self.effective_change_count() > 0
    }

    fn blocked_under(deps: &DependencyMap, ops: &BTreeSet<usize>, change_idx: usize) -> bool {
        deps.dependencies(change_idx)
            .iter()
            .any(|op| !ops.contains(op))
    }

    /// New change set after `op_idx` flipped to `now_selected`, evaluated
    /// against the proposed operation set.
    fn cascade(
        deps: &DependencyMap,
        new_ops: &BTreeSet<usize>,
        changes: &BTreeSet<usize>,
        op_idx: usize,
        now_selected: bool,
    ) -> BTreeSet<usize> {
        let mut next = changes.clone();
        for &change_idx in deps.dependents(op_idx) {
            let requires = deps.dependencies(change_idx);
            if now_selected {
                if requires.iter().all(|op| new_ops.contains(op)) {
                    next.insert(change_idx);
                }
            } else {
                // A sole dependency has no "others" to keep the change alive.
                let mut others = requires.iter().filter(|&&op| op != op_idx).peekable();
                let has_others = others.peek().is_some();
                if !has_others || !others.all(|op| new_ops.contains(op)) {
                    next.remove(&change_idx);
                }
            }
        }
        next
    }
}
