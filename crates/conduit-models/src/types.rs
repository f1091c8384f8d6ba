//! Types for model selection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Rollout status of a registered model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// Serves the default population.
    #[default]
    Stable,
    /// Serves the canary population only.
    Canary,
    /// Never selected.
    Disabled,
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelStatus::Stable => write!(f, "stable"),
            ModelStatus::Canary => write!(f, "canary"),
            ModelStatus::Disabled => write!(f, "disabled"),
        }
    }
}

/// A backing model registered for a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Unique model identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Provider name (e.g., "anthropic", "openai").
    pub provider: String,
    /// Role this model serves (e.g., "planner", "coder").
    pub role: String,
    /// Capabilities the model offers.
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Rollout status.
    #[serde(default)]
    pub status: ModelStatus,
    /// Whether the model may be selected at all.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl ModelConfig {
    /// Creates an active, stable model with no capabilities.
    #[must_use]
    pub fn new(id: impl Into<String>, provider: impl Into<String>, role: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            provider: provider.into(),
            role: role.into(),
            capabilities: BTreeSet::new(),
            status: ModelStatus::Stable,
            is_active: true,
        }
    }

    /// Adds capabilities.
    #[must_use]
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities.extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Sets the rollout status.
    #[must_use]
    pub fn with_status(mut self, status: ModelStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns `true` if the model may be selected.
    pub fn is_selectable(&self) -> bool {
        self.is_active && self.status != ModelStatus::Disabled
    }

    /// Returns `true` if the model offers every requested capability.
    pub fn supports_all(&self, required: &[String]) -> bool {
        required.iter().all(|c| self.capabilities.contains(c))
    }
}

/// Observed quality figures for a model, fed by an external metrics source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Fraction of requests that succeeded (0.0 to 1.0).
    pub success_rate: f64,
    /// Fraction of outputs that needed a human correction (0.0 to 1.0).
    pub correction_rate: f64,
    /// Mean self-reported confidence (0.0 to 1.0).
    pub avg_confidence: f64,
    /// Mean cost per request in USD.
    pub avg_cost: f64,
}

/// Weights for the performance score.
#[derive(Debug, Clone)]
pub struct ScoreWeights {
    /// Weight for success rate.
    pub success: f64,
    /// Weight for the inverse of the correction rate.
    pub correction: f64,
    /// Weight for confidence.
    pub confidence: f64,
    /// Weight for the cost factor.
    pub cost: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { success: 0.4, correction: 0.3, confidence: 0.2, cost: 0.1 }
    }
}

impl ModelMetrics {
    /// Computes the performance score (0.0 to 1.0).
    ///
    /// Cost maps into `1 / (1 + avg_cost)` so cheaper models score higher.
    #[must_use]
    pub fn score(&self, weights: &ScoreWeights) -> f64 {
        let cost_factor = 1.0 / (1.0 + self.avg_cost.max(0.0));
        let score = weights.success * self.success_rate
            + weights.correction * (1.0 - self.correction_rate)
            + weights.confidence * self.avg_confidence
            + weights.cost * cost_factor;
        score.clamp(0.0, 1.0)
    }
}

/// Targeting information for one selection request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionContext {
    /// Role to select a model for.
    pub role: String,
    /// Capabilities the model must offer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
    /// Requesting user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Requesting project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Whether the calling task is critical.
    #[serde(default)]
    pub is_critical: bool,
}

impl SelectionContext {
    /// Creates a context for a role.
    #[must_use]
    pub fn for_role(role: impl Into<String>) -> Self {
        Self { role: role.into(), ..Self::default() }
    }

    /// Sets required capabilities.
    #[must_use]
    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = Some(capabilities.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the user.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Sets the project.
    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Marks the request as critical.
    #[must_use]
    pub fn critical(mut self) -> Self {
        self.is_critical = true;
        self
    }
}

/// Why a model was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// Top-ranked stable model by observed metrics.
    PerformanceBased,
    /// The request landed in the canary population.
    Canary,
    /// No usable metrics; a neutral default was applied.
    Fallback,
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionReason::PerformanceBased => write!(f, "performance_based"),
            SelectionReason::Canary => write!(f, "canary"),
            SelectionReason::Fallback => write!(f, "fallback"),
        }
    }
}

/// Population a request was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Population {
    /// Stable models.
    Stable,
    /// Canary models.
    Canary,
}

/// Extra information about a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionMetadata {
    /// Whether canary routing was possible for this request.
    pub canary_enabled: bool,
    /// Population the request landed in.
    pub population: Population,
    /// Deterministic bucket in `[0, 100)`, when one was computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<u8>,
    /// Number of candidates ranked in the chosen population.
    pub candidates: usize,
}

/// The outcome of a successful selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSelection {
    /// The chosen model.
    pub model: ModelConfig,
    /// Why it was chosen.
    pub reason: SelectionReason,
    /// Confidence in the choice (0.0 to 1.0).
    pub confidence: f64,
    /// Routing details.
    pub metadata: SelectionMetadata,
}
