//! Model registry and metrics sources.
//!
//! The selector only depends on the [`ModelRegistry`] and [`MetricsProvider`] traits;
//! the in-memory implementations here back tests, the CLI and single-process setups.

use crate::types::{ModelConfig, ModelMetrics, ModelStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Errors raised by registry and metrics lookups.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The backing store could not be reached.
    #[error("Registry unavailable: {0}")]
    Unavailable(String),

    /// The requested model does not exist.
    #[error("Model not found: {0}")]
    ModelNotFound(String),
}

/// Source of registered models.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Returns every selectable model for a role.
    async fn active_models(&self, role: &str) -> Result<Vec<ModelConfig>, RegistryError>;
}

/// Source of observed model metrics.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Returns metrics for a model, or `None` if nothing has been recorded.
    async fn metrics(&self, model_id: &str) -> Result<Option<ModelMetrics>, RegistryError>;
}

/// In-memory model registry.
pub struct InMemoryModelRegistry {
    /// Map of model ID to configuration.
    models: Arc<RwLock<HashMap<String, ModelConfig>>>,
}

impl fmt::Debug for InMemoryModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryModelRegistry")
            .field("model_count", &self.models.try_read().map(|m| m.len()).unwrap_or(0))
            .finish_non_exhaustive()
    }
}

impl InMemoryModelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { models: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Creates a registry pre-populated with `models`.
    #[must_use]
    pub fn with_models(models: impl IntoIterator<Item = ModelConfig>) -> Self {
        let map = models.into_iter().map(|m| (m.id.clone(), m)).collect();
        Self { models: Arc::new(RwLock::new(map)) }
    }

    /// Registers a model.
    ///
    /// # Returns
    /// Returns `true` if the model was newly registered, `false` if it replaced one.
    pub async fn register(&self, model: ModelConfig) -> bool {
        debug!(model_id = %model.id, role = %model.role, status = %model.status, "Registering model");

        let mut models = self.models.write().await;
        let replaced = models.insert(model.id.clone(), model).is_some();
        !replaced
    }

    /// Changes a model's rollout status.
    pub async fn set_status(&self, model_id: &str, status: ModelStatus) -> Result<(), RegistryError> {
        let mut models = self.models.write().await;
        let model = models
            .get_mut(model_id)
            .ok_or_else(|| RegistryError::ModelNotFound(model_id.to_string()))?;
        debug!(model_id = %model_id, from = %model.status, to = %status, "Model status changed");
        model.status = status;
        Ok(())
    }

    /// Removes a model.
    pub async fn remove(&self, model_id: &str) -> bool {
        let removed = self.models.write().await.remove(model_id).is_some();
        if !removed {
            warn!(model_id = %model_id, "Attempted to remove non-existent model");
        }
        removed
    }

    /// Returns all models regardless of status.
    pub async fn list(&self) -> Vec<ModelConfig> {
        let mut models: Vec<ModelConfig> = self.models.read().await.values().cloned().collect();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        models
    }
}

impl Default for InMemoryModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelRegistry for InMemoryModelRegistry {
    async fn active_models(&self, role: &str) -> Result<Vec<ModelConfig>, RegistryError> {
        let models = self.models.read().await;
        let mut active: Vec<ModelConfig> = models
            .values()
            .filter(|m| m.role == role && m.is_selectable())
            .cloned()
            .collect();
        // HashMap order is not stable; callers rely on a deterministic candidate order.
        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }
}

/// In-memory metrics source.
#[derive(Debug, Default)]
pub struct InMemoryMetricsProvider {
    metrics: RwLock<HashMap<String, ModelMetrics>>,
}

impl InMemoryMetricsProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider pre-populated with metrics.
    #[must_use]
    pub fn with_metrics(metrics: impl IntoIterator<Item = (String, ModelMetrics)>) -> Self {
        Self { metrics: RwLock::new(metrics.into_iter().collect()) }
    }

    /// Records metrics for a model, replacing previous figures.
    pub async fn record(&self, model_id: impl Into<String>, metrics: ModelMetrics) {
        self.metrics.write().await.insert(model_id.into(), metrics);
    }
}

#[async_trait]
impl MetricsProvider for InMemoryMetricsProvider {
    async fn metrics(&self, model_id: &str) -> Result<Option<ModelMetrics>, RegistryError> {
        Ok(self.metrics.read().await.get(model_id).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_active_models_filters_role_and_status() {
        let registry = InMemoryModelRegistry::with_models([
            ModelConfig::new("b-planner", "anthropic", "planner"),
            ModelConfig::new("a-planner", "openai", "planner").with_status(ModelStatus::Canary),
            ModelConfig::new("off", "openai", "planner").with_status(ModelStatus::Disabled),
            ModelConfig::new("coder", "openai", "coder"),
        ]);

        let active = registry.active_models("planner").await.unwrap();
        let ids: Vec<&str> = active.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a-planner", "b-planner"]);
    }

    #[tokio::test]
    async fn test_register_and_replace() {
        let registry = InMemoryModelRegistry::new();
        assert!(registry.register(ModelConfig::new("m", "p", "r")).await);
        assert!(!registry.register(ModelConfig::new("m", "p", "r")).await);
        assert_eq!(registry.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_set_status() {
        let registry = InMemoryModelRegistry::with_models([ModelConfig::new("m", "p", "r")]);
        registry.set_status("m", ModelStatus::Disabled).await.unwrap();
        assert!(registry.active_models("r").await.unwrap().is_empty());

        let err = registry.set_status("missing", ModelStatus::Stable).await.unwrap_err();
        assert_eq!(err, RegistryError::ModelNotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = InMemoryModelRegistry::with_models([ModelConfig::new("m", "p", "r")]);
        assert!(registry.remove("m").await);
        assert!(!registry.remove("m").await);
    }

    #[tokio::test]
    async fn test_metrics_provider() {
        let provider = InMemoryMetricsProvider::new();
        assert_eq!(provider.metrics("m").await.unwrap(), None);

        let metrics = ModelMetrics {
            success_rate: 0.9,
            correction_rate: 0.1,
            avg_confidence: 0.8,
            avg_cost: 0.02,
        };
        provider.record("m", metrics).await;
        assert_eq!(provider.metrics("m").await.unwrap(), Some(metrics));
    }
}
