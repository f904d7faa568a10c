// entity.rs — Read-only view of the entities a proposal refers to.
//
// The data collaborator owns the real records. The review engine only ever
// reads them: to diff an update against the current state and to fall back
// to the current value when the proposer didn't touch a field.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::proposal::FieldValues;

/// The persisted state of one entity, as last loaded from the data source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExistingEntity {
    pub id: String,

    #[serde(flatten)]
    pub fields: FieldValues,
}

impl ExistingEntity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: FieldValues::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn value(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// Entities indexed by id.
#[derive(Debug, Clone, Default)]
pub struct EntitySnapshot {
    by_id: HashMap<String, ExistingEntity>,
}

impl EntitySnapshot {
    pub fn new(entities: impl IntoIterator<Item = ExistingEntity>) -> Self {
        Self {
            by_id: entities.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    /// Look up the entity an update/delete targets. `None` for creates and
    /// for ids the data source doesn't know.
    pub fn get(&self, id: Option<&str>) -> Option<&ExistingEntity> {
        id.and_then(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_lookup_by_optional_id() {
        let snapshot = EntitySnapshot::new(vec![
            ExistingEntity::new("a-1").with_field("title", "Survey"),
            ExistingEntity::new("a-2"),
        ]);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot.get(Some("a-1")).and_then(|e| e.value("title")),
            Some("Survey")
        );
        assert!(snapshot.get(Some("missing")).is_none());
        assert!(snapshot.get(None).is_none());
    }

    #[test]
    fn entity_fields_flatten_in_json() {
        let entity: ExistingEntity =
            serde_json::from_str(r#"{"id": "a-1", "priority": "high"}"#).unwrap();
        assert_eq!(entity.value("priority"), Some("high"));
        assert!(entity.value("id").is_none());
    }
}
