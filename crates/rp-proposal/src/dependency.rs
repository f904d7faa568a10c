// dependency.rs — Which entity changes need which prerequisite operations.
//
// The graph is fixed at two levels: operations gate changes, never the other
// way round, and operations never depend on each other. A change depends on
// an operation when the operation produces the grouping name the change
// refers to (a `create` of that name, or a `rename` to it). Deletes never
// gate anything.

use std::collections::BTreeMap;

use crate::proposal::Proposal;

/// Change index → indices of the operations it requires.
///
/// Changes with no grouping reference (or whose reference no operation
/// produces) have no entry and are never blocked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyMap {
    requires: BTreeMap<usize, Vec<usize>>,
    /// Reverse adjacency: operation index → dependent change indices.
    required_by: BTreeMap<usize, Vec<usize>>,
}

impl DependencyMap {
    /// Build the map for a proposal. `group_field` is the change field that
    /// names a grouping (e.g. "category").
    ///
    /// When several operations produce the same name, all of them are
    /// dependencies: the change stays blocked until every one is selected.
    pub fn build(proposal: &Proposal, group_field: &str) -> Self {
        let mut requires: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut required_by: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

        for (change_idx, change) in proposal.changes.iter().enumerate() {
            let Some(reference) = change.group_ref(group_field) else {
                continue;
            };

            let deps: Vec<usize> = proposal
                .operations
                .iter()
                .enumerate()
                .filter(|(_, op)| op.produced_name().map(str::trim) == Some(reference))
                .map(|(op_idx, _)| op_idx)
                .collect();

            if deps.is_empty() {
                continue;
            }

            for &op_idx in &deps {
                required_by.entry(op_idx).or_default().push(change_idx);
            }
            requires.insert(change_idx, deps);
        }

        Self {
            requires,
            required_by,
        }
    }

    /// Operations the change requires, in operation order.
    pub fn dependencies(&self, change_idx: usize) -> &[usize] {
        self.requires
            .get(&change_idx)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Changes that require the operation, in change order.
    pub fn dependents(&self, op_idx: usize) -> &[usize] {
        self.required_by
            .get(&op_idx)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of changes with at least one dependency.
    pub fn len(&self) -> usize {
        self.requires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requires.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[usize])> {
        self.requires.iter().map(|(c, deps)| (*c, deps.as_slice()))
    }
}
