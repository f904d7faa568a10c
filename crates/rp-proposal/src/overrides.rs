// overrides.rs — Reviewer edits layered on top of the proposed values.
//
// Resolution order for a field's effective value:
//   1. the reviewer's override, if any (an empty override still counts)
//   2. create: the proposed value, else empty
//      update/delete: the proposed value, else the existing value
//   3. empty string
//
// Overrides live only in memory. They are merged into the change when the
// proposal is accepted and then dropped with the review.

use std::collections::BTreeMap;

use crate::entity::ExistingEntity;
use crate::proposal::{ChangeAction, EntityChange, FieldValues};

/// Change index → field → overridden value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideMap {
    edits: BTreeMap<usize, FieldValues>,
}

impl OverrideMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an override. Last write wins; no history is kept.
    pub fn set_override(&mut self, change_idx: usize, field: &str, value: &str) {
        self.edits
            .entry(change_idx)
            .or_default()
            .insert(field.to_string(), value.to_string());
    }

    /// Drop an override so the field falls back to proposed/existing again.
    pub fn clear_override(&mut self, change_idx: usize, field: &str) -> bool {
        let Some(fields) = self.edits.get_mut(&change_idx) else {
            return false;
        };
        let removed = fields.remove(field).is_some();
        if fields.is_empty() {
            self.edits.remove(&change_idx);
        }
        removed
    }

    pub fn get(&self, change_idx: usize, field: &str) -> Option<&str> {
        self.edits
            .get(&change_idx)
            .and_then(|fields| fields.get(field))
            .map(String::as_str)
    }

    pub fn for_change(&self, change_idx: usize) -> Option<&FieldValues> {
        self.edits.get(&change_idx)
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// The value a field will have if the change is applied as it stands.
    pub fn effective_value(
        &self,
        change_idx: usize,
        change: &EntityChange,
        existing: Option<&ExistingEntity>,
        field: &str,
    ) -> String {
        if let Some(value) = self.get(change_idx, field) {
            return value.to_string();
        }
        let proposed = change.field(field);
        let resolved = match change.action {
            ChangeAction::Create => proposed,
            ChangeAction::Update | ChangeAction::Delete => {
                proposed.or_else(|| existing.and_then(|e| e.value(field)))
            }
        };
        resolved.unwrap_or_default().to_string()
    }

    /// Rebuild a change with the reviewer's overrides folded in.
    ///
    /// For creates every override is set outright. For updates an override
    /// is sent only if it differs from the existing value or the proposer
    /// already included the field, so an edit that lands back on the
    /// current value doesn't produce a no-op write. Deletes carry no fields
    /// and come back unchanged.
    pub fn merge_overrides(
        &self,
        change_idx: usize,
        change: &EntityChange,
        existing: Option<&ExistingEntity>,
    ) -> EntityChange {
        let mut merged = change.clone();
        let Some(overrides) = self.edits.get(&change_idx) else {
            return merged;
        };

        match change.action {
            ChangeAction::Create => {
                for (field, value) in overrides {
                    merged.fields.insert(field.clone(), value.clone());
                }
            }
            ChangeAction::Update => {
                for (field, value) in overrides {
                    let current = existing.and_then(|e| e.value(field)).unwrap_or("");
                    if value != current || change.fields.contains_key(field) {
                        merged.fields.insert(field.clone(), value.clone());
                    }
                }
            }
            ChangeAction::Delete => {}
        }
        merged
    }
}
