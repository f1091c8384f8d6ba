//! Model selector with deterministic canary routing.
//!
//! Selection never fails loudly: registry errors yield `None`, metrics errors degrade to
//! the fallback path with a fixed confidence.

use crate::canary::{
    CanaryConfig, CanaryConfigError, CanaryConfigUpdate, CanaryController, bucket_for,
};
use crate::registry::{MetricsProvider, ModelRegistry};
use crate::types::{
    ModelConfig, ModelSelection, ModelStatus, Population, ScoreWeights, SelectionContext,
    SelectionMetadata, SelectionReason,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Confidence reported when a candidate has no recorded metrics.
pub const NEUTRAL_CONFIDENCE: f64 = 0.7;

/// Confidence reported when the metrics lookup itself failed.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Counters describing how requests were routed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SelectionStatistics {
    /// Number of successful selections.
    pub total_selections: u64,
    /// Selections served from the stable population.
    pub stable_selections: u64,
    /// Selections served from the canary population.
    pub canary_selections: u64,
    /// Observed share of canary selections (0 to 100).
    pub canary_percentage: f64,
}

#[derive(Debug, Default)]
struct SelectionCounters {
    total: AtomicU64,
    stable: AtomicU64,
    canary: AtomicU64,
}

/// How a candidate was scored.
#[derive(Debug, Clone, Copy, PartialEq)]
enum CandidateScore {
    /// Score derived from recorded metrics.
    Measured(f64),
    /// Nothing recorded for the model.
    Unmeasured,
    /// The metrics source returned an error.
    LookupFailed,
}

impl CandidateScore {
    fn value(self) -> f64 {
        match self {
            Self::Measured(score) => score,
            Self::Unmeasured => NEUTRAL_CONFIDENCE,
            Self::LookupFailed => FALLBACK_CONFIDENCE,
        }
    }
}

/// Picks a backing model for a role.
pub struct ModelSelector {
    /// Source of registered models.
    registry: Arc<dyn ModelRegistry>,
    /// Optional source of performance metrics.
    metrics: Option<Arc<dyn MetricsProvider>>,
    /// Process-wide canary configuration.
    canary: CanaryController,
    /// Weights for the performance score.
    weights: ScoreWeights,
    /// Routing counters.
    counters: SelectionCounters,
}

impl fmt::Debug for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSelector")
            .field("metrics", &if self.metrics.is_some() { "Some" } else { "None" })
            .field("canary", &self.canary.snapshot())
            .field("weights", &self.weights)
            .finish_non_exhaustive()
    }
}

impl ModelSelector {
    /// Creates a selector with canary routing disabled and no metrics source.
    #[must_use]
    pub fn new(registry: Arc<dyn ModelRegistry>) -> Self {
        Self {
            registry,
            metrics: None,
            canary: CanaryController::default(),
            weights: ScoreWeights::default(),
            counters: SelectionCounters::default(),
        }
    }

    /// Attaches a metrics source.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsProvider>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the initial canary configuration.
    pub fn with_canary_config(mut self, config: CanaryConfig) -> Result<Self, CanaryConfigError> {
        self.canary = CanaryController::new(config)?;
        Ok(self)
    }

    /// Overrides the score weights.
    #[must_use]
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Returns the current canary configuration.
    pub fn canary_config(&self) -> Arc<CanaryConfig> {
        self.canary.snapshot()
    }

    /// Applies a partial canary configuration update.
    pub fn update_canary(
        &self,
        update: &CanaryConfigUpdate,
    ) -> Result<Arc<CanaryConfig>, CanaryConfigError> {
        self.canary.update(update)
    }

    /// Returns routing counters.
    pub fn statistics(&self) -> SelectionStatistics {
        let total = self.counters.total.load(Ordering::Relaxed);
        let stable = self.counters.stable.load(Ordering::Relaxed);
        let canary = self.counters.canary.load(Ordering::Relaxed);
        let canary_percentage =
            if total == 0 { 0.0 } else { canary as f64 / total as f64 * 100.0 };

        SelectionStatistics {
            total_selections: total,
            stable_selections: stable,
            canary_selections: canary,
            canary_percentage,
        }
    }

    /// Selects a model for the given request.
    ///
    /// # Returns
    /// `None` when no active model matches the role and capabilities, or when the
    /// registry cannot be read. When the routed population has no model the other one
    /// serves the request with [`SelectionReason::Fallback`].
    pub async fn select_model(&self, context: &SelectionContext) -> Option<ModelSelection> {
        let candidates = match self.registry.active_models(&context.role).await {
            Ok(models) => models,
            Err(e) => {
                warn!(role = %context.role, error = %e, "Model registry lookup failed");
                return None;
            }
        };

        if candidates.is_empty() {
            debug!(role = %context.role, "No active models for role");
            return None;
        }

        let candidates: Vec<ModelConfig> = match &context.capabilities {
            Some(required) => candidates.into_iter().filter(|m| m.supports_all(required)).collect(),
            None => candidates,
        };

        if candidates.is_empty() {
            debug!(
                role = %context.role,
                capabilities = ?context.capabilities,
                "No models offer the requested capabilities"
            );
            return None;
        }

        let (canary_models, stable_models): (Vec<_>, Vec<_>) =
            candidates.into_iter().partition(|m| m.status == ModelStatus::Canary);

        let config = self.canary.snapshot();
        let canary_enabled = config.allows(context);

        let bucket = if canary_enabled && !canary_models.is_empty() {
            bucket_for(context.user_id.as_deref(), context.project_id.as_deref())
        } else {
            None
        };

        let preferred = match bucket {
            Some(b) if f64::from(b) < config.percentage => Population::Canary,
            _ => Population::Stable,
        };

        // An empty preferred population falls back to whatever the role still offers.
        let (population, pool, rerouted) = match (preferred, canary_models, stable_models) {
            (Population::Canary, canary, _) if !canary.is_empty() => (Population::Canary, canary, false),
            (Population::Canary, _, stable) => (Population::Stable, stable, true),
            (Population::Stable, _, stable) if !stable.is_empty() => (Population::Stable, stable, false),
            (Population::Stable, canary, _) => (Population::Canary, canary, true),
        };

        if rerouted {
            debug!(
                role = %context.role,
                preferred = ?preferred,
                served = ?population,
                "Preferred population is empty, falling back"
            );
        }

        let candidate_count = pool.len();
        let (model, score) = self.rank(pool).await.into_iter().next()?;

        let (reason, confidence) = match (rerouted, population, score) {
            (true, _, score) => (SelectionReason::Fallback, score.value()),
            (false, Population::Canary, score) => (SelectionReason::Canary, score.value()),
            (false, Population::Stable, CandidateScore::Measured(value)) => {
                (SelectionReason::PerformanceBased, value)
            }
            (false, Population::Stable, CandidateScore::Unmeasured) => {
                (SelectionReason::Fallback, NEUTRAL_CONFIDENCE)
            }
            (false, Population::Stable, CandidateScore::LookupFailed) => {
                (SelectionReason::Fallback, FALLBACK_CONFIDENCE)
            }
        };

        self.counters.total.fetch_add(1, Ordering::Relaxed);
        match population {
            Population::Canary => self.counters.canary.fetch_add(1, Ordering::Relaxed),
            Population::Stable => self.counters.stable.fetch_add(1, Ordering::Relaxed),
        };

        info!(
            role = %context.role,
            model_id = %model.id,
            reason = %reason,
            confidence,
            canary_enabled,
            bucket = ?bucket,
            "Selected model"
        );

        Some(ModelSelection {
            model,
            reason,
            confidence,
            metadata: SelectionMetadata {
                canary_enabled,
                population,
                bucket,
                candidates: candidate_count,
            },
        })
    }

    /// Scores candidates and orders them best first. Ties break on model id.
    async fn rank(&self, pool: Vec<ModelConfig>) -> Vec<(ModelConfig, CandidateScore)> {
        let mut scored = Vec::with_capacity(pool.len());

        for model in pool {
            let score = match &self.metrics {
                None => CandidateScore::Unmeasured,
                Some(provider) => match provider.metrics(&model.id).await {
                    Ok(Some(metrics)) => CandidateScore::Measured(metrics.score(&self.weights)),
                    Ok(None) => CandidateScore::Unmeasured,
                    Err(e) => {
                        warn!(model_id = %model.id, error = %e, "Metrics lookup failed");
                        CandidateScore::LookupFailed
                    }
                },
            };
            scored.push((model, score));
        }

        scored.sort_by(|(a, sa), (b, sb)| {
            sb.value().total_cmp(&sa.value()).then_with(|| a.id.cmp(&b.id))
        });
        scored
    }
}
