// store.rs — JsonEntityStore: a file-backed stand-in for the admin backend.
//
// The whole store is one JSON document:
//
//   { "groups":   [{ "id": "...", "name": "Research" }],
//     "entities": [{ "id": "a-1", "title": "...", "category": "Research" }] }
//
// Entities refer to their group by name through the schema's group field.
// Like the real client, the store only accepts a group reference that is in
// its *loaded* view of the groups, which is refreshed by `reload_groupings`.
// Every successful write is saved to disk immediately.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rp_execution::{ActionError, PersistenceActions};
use rp_proposal::{
    ChangeAction, EntityChange, EntitySnapshot, ExistingEntity, OperationAction,
    PrerequisiteOperation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{noun} {id} not found")]
    UnknownEntity { noun: &'static str, id: String },

    #[error("unknown group: {0}")]
    UnknownGroup(String),

    #[error("group already exists: {0}")]
    DuplicateGroup(String),

    #[error("{action} is missing {field}")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    #[error("I/O error at {path}: {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<StoreError> for ActionError {
    fn from(e: StoreError) -> Self {
        ActionError::new(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub entities: Vec<ExistingEntity>,
}

impl StoreData {
    fn group_position(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    fn group_position_by_id(&self, id: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.id == id)
    }

    /// The group a rename/delete targets: by id when the operation carries
    /// one, otherwise by its subject name.
    fn locate_group(
        &self,
        op: &PrerequisiteOperation,
        action: &'static str,
    ) -> Result<usize, StoreError> {
        if let Some(id) = op.id.as_deref() {
            return self
                .group_position_by_id(id)
                .ok_or_else(|| StoreError::UnknownGroup(id.to_string()));
        }
        let name = op.subject_name().ok_or(StoreError::MissingField {
            action,
            field: "id or name",
        })?;
        self.group_position(name)
            .ok_or_else(|| StoreError::UnknownGroup(name.to_string()))
    }

    fn entity_position(&self, id: &str) -> Option<usize> {
        self.entities.iter().position(|e| e.id == id)
    }

    /// Point entities filed under `from` at `to`, or clear the reference
    /// when `to` is `None`.
    fn refile(&mut self, group_field: &str, from: &str, to: Option<&str>) {
        for entity in &mut self.entities {
            if entity.value(group_field) != Some(from) {
                continue;
            }
            match to {
                Some(name) => {
                    entity.fields.insert(group_field.to_string(), name.to_string());
                }
                None => {
                    entity.fields.remove(group_field);
                }
            }
        }
    }
}

pub struct JsonEntityStore {
    path: PathBuf,
    group_field: String,
    data: Mutex<StoreData>,
    loaded_groups: Mutex<Vec<String>>,
}

impl JsonEntityStore {
    /// Open a store file. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>, group_field: impl Into<String>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let data = read_data(&path)?;
        let loaded = data.groups.iter().map(|g| g.name.clone()).collect();
        tracing::debug!(
            path = %path.display(),
            groups = data.groups.len(),
            entities = data.entities.len(),
            "entity store opened"
        );
        Ok(Self {
            path,
            group_field: group_field.into(),
            data: Mutex::new(data),
            loaded_groups: Mutex::new(loaded),
        })
    }

    /// Current entities, for diffing a proposal against.
    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot::new(self.data().entities.clone())
    }

    #[cfg(test)]
    pub fn data_cloned(&self) -> StoreData {
        self.data().clone()
    }

    fn data(&self) -> MutexGuard<'_, StoreData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn loaded_groups(&self) -> MutexGuard<'_, Vec<String>> {
        self.loaded_groups
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `mutate` to a copy of the data, save it, and only then make it
    /// current. A failed mutation or save leaves the store untouched.
    fn write<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut StoreData) -> Result<(), StoreError>,
    {
        let mut data = self.data();
        let mut next = data.clone();
        mutate(&mut next)?;
        save_data(&self.path, &next)?;
        *data = next;
        Ok(())
    }

    fn apply_operation_sync(&self, op: &PrerequisiteOperation) -> Result<(), StoreError> {
        let group_field = self.group_field.clone();
        match op.action {
            OperationAction::Create => {
                let name = op.name.clone().ok_or(StoreError::MissingField {
                    action: "create",
                    field: "name",
                })?;
                self.write(|data| {
                    if data.group_position(&name).is_some() {
                        return Err(StoreError::DuplicateGroup(name));
                    }
                    let id = op.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
                    data.groups.push(Group { id, name });
                    Ok(())
                })
            }
            OperationAction::Rename => {
                let new = op.new_name.as_deref().ok_or(StoreError::MissingField {
                    action: "rename",
                    field: "new_name",
                })?;
                self.write(|data| {
                    let pos = data.locate_group(op, "rename")?;
                    if data.group_position(new).is_some_and(|other| other != pos) {
                        return Err(StoreError::DuplicateGroup(new.to_string()));
                    }
                    let old = std::mem::replace(&mut data.groups[pos].name, new.to_string());
                    data.refile(&group_field, &old, Some(new));
                    Ok(())
                })
            }
            OperationAction::Delete => self.write(|data| {
                let pos = data.locate_group(op, "delete")?;
                let removed = data.groups.remove(pos);
                data.refile(&group_field, &removed.name, None);
                Ok(())
            }),
        }
    }

    fn apply_change_sync(&self, change: &EntityChange) -> Result<(), StoreError> {
        if let Some(group) = change.group_ref(&self.group_field) {
            if !self.loaded_groups().iter().any(|g| g == group) {
                return Err(StoreError::UnknownGroup(group.to_string()));
            }
        }

        match change.action {
            ChangeAction::Create => self.write(|data| {
                let id = change
                    .id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                data.entities.push(ExistingEntity {
                    id,
                    fields: change.fields.clone(),
                });
                Ok(())
            }),
            ChangeAction::Update => {
                let id = change.id.as_deref().ok_or(StoreError::MissingField {
                    action: "update",
                    field: "id",
                })?;
                self.write(|data| {
                    let pos = data.entity_position(id).ok_or_else(|| StoreError::UnknownEntity {
                        noun: "entity",
                        id: id.to_string(),
                    })?;
                    data.entities[pos].fields.extend(change.fields.clone());
                    Ok(())
                })
            }
            ChangeAction::Delete => {
                let id = change.id.as_deref().ok_or(StoreError::MissingField {
                    action: "delete",
                    field: "id",
                })?;
                self.write(|data| {
                    let pos = data.entity_position(id).ok_or_else(|| StoreError::UnknownEntity {
                        noun: "entity",
                        id: id.to_string(),
                    })?;
                    data.entities.remove(pos);
                    Ok(())
                })
            }
        }
    }

    fn reload_groupings_sync(&self) -> Result<(), StoreError> {
        let fresh = read_data(&self.path)?;
        *self.loaded_groups() = fresh.groups.iter().map(|g| g.name.clone()).collect();
        self.data().groups = fresh.groups;
        Ok(())
    }

    fn reload_entities_sync(&self) -> Result<(), StoreError> {
        let fresh = read_data(&self.path)?;
        self.data().entities = fresh.entities;
        Ok(())
    }
}

#[async_trait]
impl PersistenceActions for JsonEntityStore {
    async fn apply_operation(&self, operation: &PrerequisiteOperation) -> Result<(), ActionError> {
        Ok(self.apply_operation_sync(operation)?)
    }

    async fn apply_change(&self, change: &EntityChange) -> Result<(), ActionError> {
        Ok(self.apply_change_sync(change)?)
    }

    async fn reload_groupings(&self) -> Result<(), ActionError> {
        Ok(self.reload_groupings_sync()?)
    }

    async fn reload_entities(&self) -> Result<(), ActionError> {
        Ok(self.reload_entities_sync()?)
    }
}

fn read_data(path: &Path) -> Result<StoreData, StoreError> {
    if !path.exists() {
        return Ok(StoreData::default());
    }
    let json = fs::read_to_string(path).map_err(|source| StoreError::IoError {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&json)?)
}

fn save_data(path: &Path, data: &StoreData) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StoreError::IoError {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(data)?;
    fs::write(path, json).map_err(|source| StoreError::IoError {
        path: path.display().to_string(),
        source,
    })
}
