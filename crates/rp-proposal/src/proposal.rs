// proposal.rs — The proposal data model.
//
// A Proposal is a batch of mutations suggested by the chat assistant (or a
// user) that waits for human review. It has two lists:
//
//   operations — grouping-level mutations (create/rename/delete a category)
//   changes    — entity-level mutations (create/update/delete an artifact/row)
//
// Both lists are immutable once received. Items are addressed by their
// position in the list, which is why nothing here carries a stable id of its
// own.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ProposalError;

/// Sparse field → value map. Only the fields the proposer wants to touch are
/// present; an absent field on an update means "leave as-is".
pub type FieldValues = BTreeMap<String, String>;

/// What a prerequisite operation does to its grouping entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationAction {
    Create,
    Rename,
    Delete,
}

impl std::fmt::Display for OperationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationAction::Create => write!(f, "create"),
            OperationAction::Rename => write!(f, "rename"),
            OperationAction::Delete => write!(f, "delete"),
        }
    }
}

/// A grouping-level mutation (e.g. a category) that entity changes may
/// depend on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrerequisiteOperation {
    pub action: OperationAction,

    /// Identifier of an existing grouping (rename/delete).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Target name for create, or the grouping being deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
}

impl PrerequisiteOperation {
    pub fn create(name: impl Into<String>) -> Self {
        Self {
            action: OperationAction::Create,
            id: None,
            name: Some(name.into()),
            old_name: None,
            new_name: None,
        }
    }

    pub fn rename(old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            action: OperationAction::Rename,
            id: None,
            name: None,
            old_name: Some(old_name.into()),
            new_name: Some(new_name.into()),
        }
    }

    pub fn delete(name: impl Into<String>) -> Self {
        Self {
            action: OperationAction::Delete,
            id: None,
            name: Some(name.into()),
            old_name: None,
            new_name: None,
        }
    }

    /// Attach the identifier of an existing grouping.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The grouping name this operation brings into existence, if any.
    ///
    /// Only `create` and `rename` produce a name. A `delete` never does, so it
    /// can never be a prerequisite of an entity change.
    pub fn produced_name(&self) -> Option<&str> {
        match self.action {
            OperationAction::Create => self.name.as_deref(),
            OperationAction::Rename => self.new_name.as_deref(),
            OperationAction::Delete => None,
        }
    }

    /// The best human-readable name for the grouping this operation targets
    /// *before* it runs.
    pub fn subject_name(&self) -> Option<&str> {
        match self.action {
            OperationAction::Rename => self.old_name.as_deref().or(self.name.as_deref()),
            _ => self.name.as_deref().or(self.old_name.as_deref()),
        }
    }
}

/// What an entity change does to its domain record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeAction::Create => write!(f, "create"),
            ChangeAction::Update => write!(f, "update"),
            ChangeAction::Delete => write!(f, "delete"),
        }
    }
}

/// A create/update/delete targeting one domain record.
///
/// In JSON the proposed field values sit next to `action` and `id`:
/// `{"action": "update", "id": "a-1", "priority": "high"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityChange {
    pub action: ChangeAction,

    /// Required for update and delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Proposed field values (sparse).
    #[serde(flatten)]
    pub fields: FieldValues,
}

impl EntityChange {
    pub fn create() -> Self {
        Self {
            action: ChangeAction::Create,
            id: None,
            fields: FieldValues::new(),
        }
    }

    pub fn update(id: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Update,
            id: Some(id.into()),
            fields: FieldValues::new(),
        }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Self {
            action: ChangeAction::Delete,
            id: Some(id.into()),
            fields: FieldValues::new(),
        }
    }

    /// Set a proposed field value and return self (builder pattern).
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// The proposed value for a field, if the proposer supplied one.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// The grouping name this change refers to through `group_field`.
    /// Blank references count as no reference.
    pub fn group_ref(&self, group_field: &str) -> Option<&str> {
        self.field(group_field)
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// A batch of operations and changes awaiting human review.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Proposal {
    #[serde(default)]
    pub operations: Vec<PrerequisiteOperation>,

    #[serde(default)]
    pub changes: Vec<EntityChange>,

    /// Free-form explanation from the proposer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Proposal {
    pub fn new(operations: Vec<PrerequisiteOperation>, changes: Vec<EntityChange>) -> Self {
        Self {
            operations,
            changes,
            reasoning: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Parse a proposal from the JSON payload sent by the proposing
    /// collaborator.
    pub fn from_json(json: &str) -> Result<Self, ProposalError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a proposal from a JSON file.
    pub fn load(path: &std::path::Path) -> Result<Self, ProposalError> {
        let json = std::fs::read_to_string(path).map_err(|source| ProposalError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.changes.is_empty()
    }
}
