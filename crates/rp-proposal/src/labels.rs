// labels.rs — Human-readable labels for operations and changes.

use crate::entity::ExistingEntity;
use crate::proposal::{ChangeAction, EntityChange, OperationAction, PrerequisiteOperation};
use crate::schema::EntitySchema;

/// e.g. `Create category "Security"`, `Rename category "Sec" → "Security"`.
pub fn operation_label(op: &PrerequisiteOperation, schema: &EntitySchema) -> String {
    let noun = &schema.group_noun;
    let subject = op
        .subject_name()
        .map(str::to_string)
        .or_else(|| op.id.as_ref().map(|id| format!("#{}", id)))
        .unwrap_or_else(|| "?".to_string());
    match op.action {
        OperationAction::Create => format!("Create {} \"{}\"", noun, subject),
        OperationAction::Rename => format!(
            "Rename {} \"{}\" → \"{}\"",
            noun,
            subject,
            op.new_name.as_deref().unwrap_or("?")
        ),
        OperationAction::Delete => format!("Delete {} \"{}\"", noun, subject),
    }
}

/// Name identifying the change's target: existing title, then proposed
/// title, then `#<id>`, then `#<position>` (1-based).
pub fn target_label(
    change_idx: usize,
    change: &EntityChange,
    existing: Option<&ExistingEntity>,
    schema: &EntitySchema,
) -> String {
    let title_of = |value: Option<&str>| value.filter(|t| !t.trim().is_empty()).map(str::to_string);
    title_of(existing.and_then(|e| e.value(&schema.title_field)))
        .or_else(|| title_of(change.field(&schema.title_field)))
        .or_else(|| change.id.as_ref().map(|id| format!("#{}", id)))
        .unwrap_or_else(|| format!("#{}", change_idx + 1))
}

/// e.g. `Update artifact "Survey"`.
pub fn change_label(action: ChangeAction, target: &str, schema: &EntitySchema) -> String {
    let verb = match action {
        ChangeAction::Create => "Create",
        ChangeAction::Update => "Update",
        ChangeAction::Delete => "Delete",
    };
    format!("{} {} \"{}\"", verb, schema.entity_noun, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_labels() {
        let schema = EntitySchema::artifacts();
        assert_eq!(
            operation_label(&PrerequisiteOperation::create("Security"), &schema),
            "Create category \"Security\""
        );
        assert_eq!(
            operation_label(&PrerequisiteOperation::rename("Sec", "Security"), &schema),
            "Rename category \"Sec\" → \"Security\""
        );
        let unnamed = PrerequisiteOperation {
            name: None,
            ..PrerequisiteOperation::delete("x")
        }
        .with_id("7");
        assert_eq!(operation_label(&unnamed, &schema), "Delete category \"#7\"");
    }

    #[test]
    fn target_label_fallbacks() {
        let schema = EntitySchema::artifacts();
        let existing = ExistingEntity::new("a-1").with_field("title", "Survey");
        let update = EntityChange::update("a-1").with_field("title", "Renamed survey");

        assert_eq!(target_label(0, &update, Some(&existing), &schema), "Survey");
        assert_eq!(target_label(0, &update, None, &schema), "Renamed survey");
        assert_eq!(
            target_label(0, &EntityChange::delete("a-9"), None, &schema),
            "#a-9"
        );
        assert_eq!(target_label(3, &EntityChange::create(), None, &schema), "#4");
    }

    #[test]
    fn change_label_uses_entity_noun() {
        let schema = EntitySchema::table_rows();
        assert_eq!(
            change_label(ChangeAction::Delete, "#r-2", &schema),
            "Delete row \"#r-2\""
        );
    }
}
