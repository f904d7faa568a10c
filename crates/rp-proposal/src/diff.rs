// diff.rs — What an entity change would actually change.
//
// Used for the collapsed change card. For an update, only schema fields the
// proposer set *and* that differ from the current value show up. Free-text
// fields only say "changed" so long text never leaks into the summary.
// Creates have nothing to diff against, so their summary lists every
// proposed field as-is.

use serde::{Deserialize, Serialize};

use crate::entity::ExistingEntity;
use crate::proposal::{ChangeAction, EntityChange};
use crate::schema::{EntitySchema, FieldKind, FieldSpec};

/// One differing field of an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub field: String,
    pub kind: FieldKind,
    /// Current value (`None` when the entity has no value for the field).
    pub old: Option<String>,
    pub new: String,
}

impl FieldDiff {
    /// Render for display, e.g. `Priority: Low → High` or `Description changed`.
    pub fn render(&self, spec: &FieldSpec) -> String {
        match self.kind {
            FieldKind::Categorical => {
                let old = match self.old.as_deref() {
                    Some(old) if !old.is_empty() => spec.display_value(old),
                    _ => "(none)",
                };
                let new = if self.new.is_empty() {
                    "(none)"
                } else {
                    spec.display_value(&self.new)
                };
                format!("{}: {} → {}", spec.display_name(), old, new)
            }
            FieldKind::FreeText => format!("{} changed", spec.display_name()),
        }
    }
}

/// Fields of an update that differ from the existing entity, in schema
/// order. Empty for creates and deletes.
pub fn diff_change(
    change: &EntityChange,
    existing: Option<&ExistingEntity>,
    schema: &EntitySchema,
) -> Vec<FieldDiff> {
    if change.action != ChangeAction::Update {
        return Vec::new();
    }

    schema
        .fields
        .iter()
        .filter_map(|spec| {
            let new = change.field(&spec.name)?;
            let old = existing.and_then(|e| e.value(&spec.name));
            if old.unwrap_or("") == new {
                return None;
            }
            Some(FieldDiff {
                field: spec.name.clone(),
                kind: spec.kind,
                old: old.map(str::to_string),
                new: new.to_string(),
            })
        })
        .collect()
}

/// One-line summary for the collapsed change card.
pub fn summarize_change(
    change: &EntityChange,
    existing: Option<&ExistingEntity>,
    schema: &EntitySchema,
) -> String {
    match change.action {
        ChangeAction::Create => {
            // Schema fields first, in schema order, then anything else.
            let mut parts: Vec<String> = schema
                .fields
                .iter()
                .filter_map(|spec| {
                    change
                        .field(&spec.name)
                        .map(|v| format!("{}: {}", spec.name, v))
                })
                .collect();
            parts.extend(
                change
                    .fields
                    .iter()
                    .filter(|(name, _)| schema.field(name).is_none())
                    .map(|(name, value)| format!("{}: {}", name, value)),
            );
            if parts.is_empty() {
                "no fields".to_string()
            } else {
                parts.join(", ")
            }
        }
        ChangeAction::Update => {
            let diffs = diff_change(change, existing, schema);
            if diffs.is_empty() {
                return "no changes".to_string();
            }
            diffs
                .iter()
                .filter_map(|d| schema.field(&d.field).map(|spec| d.render(spec)))
                .collect::<Vec<_>>()
                .join(", ")
        }
        ChangeAction::Delete => format!("{} will be deleted", schema.entity_noun),
    }
}
