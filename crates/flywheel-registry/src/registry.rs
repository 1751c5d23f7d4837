//! Model registry for base models and fine-tuned versions.
//!
//! This module owns model creation, lineage resolution, and the Active/Archived
//! promotion that keeps at most one Active model per lineage.

use crate::error::{RegistryError, RegistryResult};
use crate::model::{Model, ModelId, ModelKind, ModelStatus};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Registry for managing models.
///
/// Models are never deleted; archival is the only transition besides creation.
pub struct ModelRegistry {
    /// Map of model ID to model.
    models: Arc<RwLock<HashMap<ModelId, Model>>>,
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("model_count", &self.models.try_read().map(|m| m.len()).unwrap_or(0))
            .finish_non_exhaustive()
    }
}

impl ModelRegistry {
    /// Creates a new empty model registry.
    #[must_use]
    pub fn new() -> Self {
        Self { models: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Registers a base model, idempotently by name.
    ///
    /// # Returns
    /// Returns the existing model if the name is already registered as a base
    /// model, or `DuplicateName` if the name belongs to a fine-tuned model.
    pub async fn register_base(&self, name: &str) -> RegistryResult<Model> {
        let mut models = self.models.write().await;

        if let Some(existing) = models.values().find(|m| m.name == name) {
            if existing.kind == ModelKind::Base {
                debug!(model = %name, "Base model already registered");
                return Ok(existing.clone());
            }
            warn!(model = %name, "Name registered with a different kind");
            return Err(RegistryError::DuplicateName(name.to_string()));
        }

        let model = Model::base(name);
        info!(model_id = %model.id, model = %name, "Registered base model");
        models.insert(model.id.clone(), model.clone());
        Ok(model)
    }

    /// Registers a fine-tuned model version under an existing parent.
    ///
    /// The new model becomes Active; the previously Active model in the same
    /// lineage (if any) is demoted to Archived. Both changes happen under one
    /// write lock, so the promotion is atomic.
    pub async fn register_fine_tuned(
        &self,
        parent_id: &ModelId,
        name: &str,
    ) -> RegistryResult<Model> {
        let mut models = self.models.write().await;

        if !models.contains_key(parent_id) {
            return Err(RegistryError::NotFound(parent_id.to_string()));
        }
        if models.values().any(|m| m.name == name) {
            warn!(model = %name, "Fine-tuned model name already taken");
            return Err(RegistryError::DuplicateName(name.to_string()));
        }

        let root = Self::root_of(&models, parent_id)?;
        let previous: Vec<ModelId> = models
            .values()
            .filter(|m| m.is_active())
            .filter(|m| Self::root_of(&models, &m.id).is_ok_and(|r| r == root))
            .map(|m| m.id.clone())
            .collect();

        for id in previous {
            if let Some(m) = models.get_mut(&id) {
                m.status = Some(ModelStatus::Archived);
                debug!(model_id = %id, "Archived previous active model");
            }
        }

        let model = Model::fine_tuned(name, parent_id.clone());
        info!(
            model_id = %model.id,
            model = %name,
            parent_id = %parent_id,
            lineage_root = %root,
            "Registered fine-tuned model"
        );
        models.insert(model.id.clone(), model.clone());
        Ok(model)
    }

    /// Retrieves a model by ID.
    pub async fn get(&self, id: &ModelId) -> RegistryResult<Model> {
        let models = self.models.read().await;
        models.get(id).cloned().ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Looks a model up by display name.
    pub async fn find_by_name(&self, name: &str) -> Option<Model> {
        let models = self.models.read().await;
        models.values().find(|m| m.name == name).cloned()
    }

    /// Lists base models, most recently created first.
    pub async fn list_base(&self) -> Vec<Model> {
        self.list_kind(ModelKind::Base).await
    }

    /// Lists fine-tuned models, most recently created first.
    pub async fn list_fine_tuned(&self) -> Vec<Model> {
        self.list_kind(ModelKind::FineTuned).await
    }

    async fn list_kind(&self, kind: ModelKind) -> Vec<Model> {
        let models = self.models.read().await;
        let mut out: Vec<Model> = models.values().filter(|m| m.kind == kind).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Resolves the base model at the root of a model's lineage.
    ///
    /// Lineage is the parent-pointer chain, never inferred from version
    /// strings.
    pub async fn lineage_root(&self, id: &ModelId) -> RegistryResult<ModelId> {
        let models = self.models.read().await;
        Self::root_of(&models, id)
    }

    /// Returns the single Active fine-tuned model of a lineage, if any.
    ///
    /// Finding more than one Active model indicates a locking bug; it is
    /// logged and surfaced as `LineageBreach` rather than a normal error.
    pub async fn active_of_lineage(&self, root: &ModelId) -> RegistryResult<Option<Model>> {
        let models = self.models.read().await;
        let mut active = None;
        for model in models.values().filter(|m| m.is_active()) {
            if Self::root_of(&models, &model.id)? != *root {
                continue;
            }
            if active.is_some() {
                error!(lineage_root = %root, "Multiple active models in one lineage");
                return Err(RegistryError::LineageBreach(root.to_string()));
            }
            active = Some(model.clone());
        }
        Ok(active)
    }

    fn root_of(models: &HashMap<ModelId, Model>, id: &ModelId) -> RegistryResult<ModelId> {
        let mut current =
            models.get(id).ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        while let Some(parent_id) = &current.parent_id {
            current = models
                .get(parent_id)
                .ok_or_else(|| RegistryError::NotFound(parent_id.to_string()))?;
        }
        Ok(current.id.clone())
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
