//! TOML configuration for the model registry and canary rollout.

use crate::canary::{CanaryConfig, CanaryConfigError};
use crate::registry::{InMemoryMetricsProvider, InMemoryModelRegistry};
use crate::selector::ModelSelector;
use crate::types::{ModelConfig, ModelMetrics};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the file.
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("Failed to parse TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Canary section out of range.
    #[error("Invalid canary configuration: {0}")]
    Canary(#[from] CanaryConfigError),

    /// Configuration validation error.
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Model selection configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Canary rollout settings.
    #[serde(default)]
    pub canary: CanaryConfig,

    /// Registered models.
    #[serde(default)]
    pub models: Vec<ModelConfig>,

    /// Seed metrics keyed by model id.
    #[serde(default)]
    pub metrics: BTreeMap<String, ModelMetrics>,
}

impl ModelsConfig {
    /// Builds a selector backed by in-memory registry and metrics.
    pub fn build_selector(&self) -> Result<ModelSelector> {
        let registry = InMemoryModelRegistry::with_models(self.models.iter().cloned());
        let metrics = InMemoryMetricsProvider::with_metrics(
            self.metrics.iter().map(|(id, m)| (id.clone(), *m)),
        );

        Ok(ModelSelector::new(Arc::new(registry))
            .with_metrics(Arc::new(metrics))
            .with_canary_config(self.canary.clone())?)
    }
}

/// Configuration loader for model settings.
pub struct ModelsConfigLoader;

impl ModelsConfigLoader {
    /// Loads model configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<ModelsConfig> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses and validates model configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<ModelsConfig> {
        let config: ModelsConfig = toml::from_str(content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validates model configuration.
    pub fn validate(config: &ModelsConfig) -> Result<()> {
        config.canary.validate()?;

        let mut seen = HashSet::new();
        for (idx, model) in config.models.iter().enumerate() {
            if model.id.trim().is_empty() {
                return Err(ConfigError::Validation(format!("Model {}: id must not be empty", idx)));
            }
            if model.role.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Model '{}': role must not be empty",
                    model.id
                )));
            }
            if !seen.insert(model.id.as_str()) {
                return Err(ConfigError::Validation(format!("Duplicate model id: {}", model.id)));
            }
        }

        for (id, metrics) in &config.metrics {
            for (name, value) in [
                ("success_rate", metrics.success_rate),
                ("correction_rate", metrics.correction_rate),
                ("avg_confidence", metrics.avg_confidence),
            ] {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ConfigError::Validation(format!(
                        "Metrics for '{}': {} ({}) must be between 0.0 and 1.0",
                        id, name, value
                    )));
                }
            }
            if metrics.avg_cost < 0.0 {
                return Err(ConfigError::Validation(format!(
                    "Metrics for '{}': avg_cost must not be negative",
                    id
                )));
            }
        }

        Ok(())
    }
}
