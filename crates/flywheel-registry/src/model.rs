use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a registered model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelId(pub String);

impl ModelId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Whether a model is a foundation model or the product of a training job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Base,
    FineTuned,
}

/// Training status of a fine-tuned model. At most one model per lineage is
/// Active at a time; base models carry no status at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Active,
    Archived,
}

/// A registered model.
///
/// Immutable after creation except for `status`, which only the registry
/// transitions (Active -> Archived when a newer version is promoted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: ModelId,
    /// Display name, e.g. "flywheel-v1.4".
    pub name: String,
    pub kind: ModelKind,
    /// None for base models; the model this one was tuned from otherwise.
    pub parent_id: Option<ModelId>,
    pub created_at: DateTime<Utc>,
    /// None for base models, which are never Active/Archived-tagged.
    pub status: Option<ModelStatus>,
}

impl Model {
    pub(crate) fn base(name: impl Into<String>) -> Self {
        Self {
            id: ModelId::new(),
            name: name.into(),
            kind: ModelKind::Base,
            parent_id: None,
            created_at: Utc::now(),
            status: None,
        }
    }

    pub(crate) fn fine_tuned(name: impl Into<String>, parent_id: ModelId) -> Self {
        Self {
            id: ModelId::new(),
            name: name.into(),
            kind: ModelKind::FineTuned,
            parent_id: Some(parent_id),
            created_at: Utc::now(),
            status: Some(ModelStatus::Active),
        }
    }

    /// Whether this model currently carries the Active badge.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == Some(ModelStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_model_has_no_status() {
        let model = Model::base("qwen-coder-7b");
        assert_eq!(model.kind, ModelKind::Base);
        assert!(model.parent_id.is_none());
        assert!(model.status.is_none());
        assert!(!model.is_active());
    }

    #[test]
    fn test_fine_tuned_model_starts_active() {
        let parent = Model::base("qwen-coder-7b");
        let model = Model::fine_tuned("flywheel-v1.0", parent.id.clone());
        assert_eq!(model.kind, ModelKind::FineTuned);
        assert_eq!(model.parent_id, Some(parent.id));
        assert!(model.is_active());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ModelStatus::Active).unwrap(), "\"active\"");
        assert_eq!(serde_json::to_string(&ModelStatus::Archived).unwrap(), "\"archived\"");
    }
}
