//! Entity schemas and the review configuration that registers them.
//!
//! The chat UI used to look renderers up in a module-level registry. Here the
//! mapping is an explicit value: a [`ReviewConfig`] maps a proposal kind to the
//! [`EntitySchema`] the review engine is constructed with.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ProposalError;

/// How a field is compared and rendered in the collapsed summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Short enumerated value; rendered as `old → new`.
    #[default]
    Categorical,
    /// Long text; rendered only as a "changed" marker.
    FreeText,
}

/// One comparable field of an entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,

    #[serde(default)]
    pub kind: FieldKind,

    /// Display name (defaults to `name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Value → display label lookup for categorical fields.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, String>,
}

impl FieldSpec {
    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Categorical,
            label: None,
            values: BTreeMap::new(),
        }
    }

    pub fn free_text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::FreeText,
            label: None,
            values: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add display labels for categorical values.
    pub fn with_values<'a>(mut self, values: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (value, label) in values {
            self.values.insert(value.to_string(), label.to_string());
        }
        self
    }

    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// The display label for a value, falling back to the raw value.
    pub fn display_value<'a>(&'a self, value: &'a str) -> &'a str {
        self.values.get(value).map(String::as_str).unwrap_or(value)
    }
}

/// Describes one kind of reviewable entity: how to name it in labels, which
/// field references a grouping, and which fields participate in diffs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntitySchema {
    /// Noun used in step labels ("artifact", "row").
    #[serde(default = "default_entity_noun")]
    pub entity_noun: String,

    /// Noun for the grouping entity ("category").
    #[serde(default = "default_group_noun")]
    pub group_noun: String,

    /// Field on an entity change that names its grouping.
    #[serde(default = "default_group_field")]
    pub group_field: String,

    /// Field used as the human-identifying label of an entity.
    #[serde(default = "default_title_field")]
    pub title_field: String,

    /// Comparable fields, in display order.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

fn default_entity_noun() -> String {
    "entity".to_string()
}

fn default_group_noun() -> String {
    "category".to_string()
}

fn default_group_field() -> String {
    "category".to_string()
}

fn default_title_field() -> String {
    "title".to_string()
}

impl Default for EntitySchema {
    fn default() -> Self {
        Self {
            entity_noun: default_entity_noun(),
            group_noun: default_group_noun(),
            group_field: default_group_field(),
            title_field: default_title_field(),
            fields: Vec::new(),
        }
    }
}

impl EntitySchema {
    /// Research artifacts: papers, datasets, code, models, reports.
    pub fn artifacts() -> Self {
        Self {
            entity_noun: "artifact".to_string(),
            group_noun: "category".to_string(),
            group_field: "category".to_string(),
            title_field: "title".to_string(),
            fields: vec![
                FieldSpec::free_text("title").with_label("Title"),
                FieldSpec::categorical("artifact_type")
                    .with_label("Type")
                    .with_values([
                        ("paper", "Paper"),
                        ("dataset", "Dataset"),
                        ("code", "Code"),
                        ("model", "Model"),
                        ("report", "Report"),
                    ]),
                FieldSpec::categorical("status").with_label("Status").with_values([
                    ("idea", "Idea"),
                    ("in_progress", "In Progress"),
                    ("review", "In Review"),
                    ("done", "Done"),
                    ("archived", "Archived"),
                ]),
                FieldSpec::categorical("priority")
                    .with_label("Priority")
                    .with_values([
                        ("low", "Low"),
                        ("medium", "Medium"),
                        ("high", "High"),
                        ("critical", "Critical"),
                    ]),
                FieldSpec::categorical("category").with_label("Category"),
                FieldSpec::free_text("description").with_label("Description"),
            ],
        }
    }

    /// Rows of a user-defined table.
    pub fn table_rows() -> Self {
        Self {
            entity_noun: "row".to_string(),
            group_noun: "category".to_string(),
            group_field: "category".to_string(),
            title_field: "name".to_string(),
            fields: vec![
                FieldSpec::free_text("name").with_label("Name"),
                FieldSpec::categorical("category").with_label("Category"),
                FieldSpec::categorical("status").with_label("Status"),
                FieldSpec::free_text("notes").with_label("Notes"),
            ],
        }
    }

    /// Column definitions of a table, grouped into column groups.
    pub fn table_schema() -> Self {
        Self {
            entity_noun: "column".to_string(),
            group_noun: "column group".to_string(),
            group_field: "group".to_string(),
            title_field: "name".to_string(),
            fields: vec![
                FieldSpec::free_text("name").with_label("Name"),
                FieldSpec::categorical("data_type")
                    .with_label("Type")
                    .with_values([
                        ("text", "Text"),
                        ("number", "Number"),
                        ("date", "Date"),
                        ("boolean", "Yes/No"),
                        ("select", "Select"),
                    ]),
                FieldSpec::categorical("group").with_label("Group"),
                FieldSpec::free_text("description").with_label("Description"),
            ],
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Top-level review configuration from `.rp/review.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewConfig {
    /// Proposal kind → schema.
    #[serde(default = "default_schemas")]
    pub schemas: BTreeMap<String, EntitySchema>,
}

fn default_schemas() -> BTreeMap<String, EntitySchema> {
    BTreeMap::from([
        ("artifacts".to_string(), EntitySchema::artifacts()),
        ("table_rows".to_string(), EntitySchema::table_rows()),
        ("table_schema".to_string(), EntitySchema::table_schema()),
    ])
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            schemas: default_schemas(),
        }
    }
}

impl ReviewConfig {
    /// Parse a config from TOML. Built-in kinds the file doesn't mention are
    /// kept.
    pub fn from_toml(content: &str) -> Result<Self, ProposalError> {
        let mut config: ReviewConfig = toml::from_str(content)?;
        for (kind, schema) in default_schemas() {
            config.schemas.entry(kind).or_insert(schema);
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ProposalError> {
        let content = std::fs::read_to_string(path).map_err(|source| ProposalError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Load the config, or use the built-in defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self, ProposalError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no review config, using defaults");
            Ok(Self::default())
        }
    }

    pub fn schema(&self, kind: &str) -> Result<&EntitySchema, ProposalError> {
        self.schemas
            .get(kind)
            .ok_or_else(|| ProposalError::UnknownKind(kind.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_register_builtin_kinds() {
        let config = ReviewConfig::default();
        assert_eq!(config.schema("artifacts").unwrap().entity_noun, "artifact");
        assert_eq!(config.schema("table_rows").unwrap().title_field, "name");
        assert_eq!(config.schema("table_schema").unwrap().group_field, "group");
        assert!(matches!(
            config.schema("reports"),
            Err(ProposalError::UnknownKind(_))
        ));
    }

    #[test]
    fn toml_adds_kind_and_keeps_builtins() {
        let config = ReviewConfig::from_toml(
            r#"
            [schemas.reports]
            entity_noun = "report"
            group_field = "schedule"
            group_noun = "schedule"

            [[schemas.reports.fields]]
            name = "cadence"
            kind = "categorical"
            values = { weekly = "Weekly", monthly = "Monthly" }

            [[schemas.reports.fields]]
            name = "body"
            kind = "free_text"
            "#,
        )
        .unwrap();

        let reports = config.schema("reports").unwrap();
        assert_eq!(reports.title_field, "title");
        assert_eq!(reports.fields.len(), 2);
        assert_eq!(
            reports.field("cadence").unwrap().display_value("weekly"),
            "Weekly"
        );
        assert_eq!(reports.field("body").unwrap().kind, FieldKind::FreeText);
        assert!(config.schemas.contains_key("artifacts"));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = ReviewConfig::from_toml("schemas = 3").unwrap_err();
        assert!(matches!(err, ProposalError::ConfigError(_)));
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let config = ReviewConfig::load_or_default(&dir.path().join("review.toml")).unwrap();
        assert_eq!(config, ReviewConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("review.toml");
        std::fs::write(
            &path,
            "[schemas.artifacts]\nentity_noun = \"paper\"\ntitle_field = \"name\"\n",
        )
        .unwrap();
        let config = ReviewConfig::load_or_default(&path).unwrap();
        let artifacts = config.schema("artifacts").unwrap();
        assert_eq!(artifacts.entity_noun, "paper");
        assert!(artifacts.fields.is_empty());
    }

    #[test]
    fn display_value_falls_back_to_raw() {
        let spec = EntitySchema::artifacts();
        let status = spec.field("status").unwrap();
        assert_eq!(status.display_value("in_progress"), "In Progress");
        assert_eq!(status.display_value("blocked"), "blocked");
        assert_eq!(status.display_name(), "Status");
    }
}
