//! Model registry and selection for Conduit.
//!
//! This crate decides which backing model serves a request:
//!
//! - **Registry**: active models per role, with rollout status and capabilities
//! - **Canary**: process-wide rollout configuration and deterministic bucketing
//! - **Selector**: capability filtering, population choice and performance ranking
//! - **Config**: TOML loading for all of the above

pub mod canary;
pub mod config;
pub mod registry;
pub mod selector;
pub mod types;

pub use canary::{
    BUCKET_COUNT, CanaryConfig, CanaryConfigError, CanaryConfigUpdate, CanaryController,
    bucket_for,
};
pub use config::{ConfigError, ModelsConfig, ModelsConfigLoader};
pub use registry::{
    InMemoryMetricsProvider, InMemoryModelRegistry, MetricsProvider, ModelRegistry, RegistryError,
};
pub use selector::{FALLBACK_CONFIDENCE, ModelSelector, NEUTRAL_CONFIDENCE, SelectionStatistics};
pub use types::{
    ModelConfig, ModelMetrics, ModelSelection, ModelStatus, Population, ScoreWeights,
    SelectionContext, SelectionMetadata, SelectionReason,
};
