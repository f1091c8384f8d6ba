//! Canary rollout configuration and deterministic bucketing.

use crate::types::SelectionContext;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::info;

/// Number of buckets requests are spread over.
pub const BUCKET_COUNT: u64 = 100;

/// Canary rollout configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanaryConfig {
    /// Whether canary routing is on at all.
    pub enabled: bool,
    /// Share of buckets routed to canary models (0 to 100).
    pub percentage: f64,
    /// Only critical requests may land in canary.
    pub critical_tasks_only: bool,
    /// Roles that never use canary models.
    pub exclude_roles: BTreeSet<String>,
}

impl Default for CanaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            percentage: 10.0,
            critical_tasks_only: false,
            exclude_roles: BTreeSet::new(),
        }
    }
}

impl CanaryConfig {
    /// Checks that the percentage is within range.
    pub fn validate(&self) -> Result<(), CanaryConfigError> {
        if !self.percentage.is_finite() || !(0.0..=100.0).contains(&self.percentage) {
            return Err(CanaryConfigError::InvalidPercentage(self.percentage));
        }
        Ok(())
    }

    /// Returns `true` if a request may be routed to canary models.
    pub fn allows(&self, context: &SelectionContext) -> bool {
        if !self.enabled {
            return false;
        }
        if self.exclude_roles.contains(&context.role) {
            return false;
        }
        if self.critical_tasks_only && !context.is_critical {
            return false;
        }
        true
    }
}

/// Partial update of the canary configuration. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanaryConfigUpdate {
    /// New enabled flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// New percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    /// New critical-only flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_tasks_only: Option<bool>,
    /// New excluded roles (replaces the whole set).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_roles: Option<BTreeSet<String>>,
}

impl CanaryConfigUpdate {
    /// Applies the update on top of `base`, producing a new configuration.
    #[must_use]
    pub fn apply_to(&self, base: &CanaryConfig) -> CanaryConfig {
        CanaryConfig {
            enabled: self.enabled.unwrap_or(base.enabled),
            percentage: self.percentage.unwrap_or(base.percentage),
            critical_tasks_only: self.critical_tasks_only.unwrap_or(base.critical_tasks_only),
            exclude_roles: self.exclude_roles.clone().unwrap_or_else(|| base.exclude_roles.clone()),
        }
    }
}

/// Errors raised when updating the canary configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CanaryConfigError {
    /// Percentage outside `[0, 100]`.
    #[error("Invalid canary percentage: {0}. Must be between 0 and 100")]
    InvalidPercentage(f64),
}

/// Holds the process-wide canary configuration.
///
/// Readers get an `Arc` snapshot; updates build a complete new value and swap it in,
/// so a reader never observes a half-applied update.
#[derive(Debug, Default)]
pub struct CanaryController {
    current: RwLock<Arc<CanaryConfig>>,
}

impl CanaryController {
    /// Creates a controller with the given initial configuration.
    pub fn new(config: CanaryConfig) -> Result<Self, CanaryConfigError> {
        config.validate()?;
        Ok(Self { current: RwLock::new(Arc::new(config)) })
    }

    /// Returns the current configuration snapshot.
    pub fn snapshot(&self) -> Arc<CanaryConfig> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    /// Applies a partial update and returns the new configuration.
    pub fn update(&self, update: &CanaryConfigUpdate) -> Result<Arc<CanaryConfig>, CanaryConfigError> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let next = update.apply_to(&guard);
        next.validate()?;

        info!(
            enabled = next.enabled,
            percentage = next.percentage,
            critical_tasks_only = next.critical_tasks_only,
            excluded = next.exclude_roles.len(),
            "Canary configuration updated"
        );

        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        Ok(next)
    }
}

/// Maps an identifying pair to a bucket in `[0, 100)`.
///
/// The key is `"{user_id}:{project_id}"` with missing parts left empty. The first eight
/// bytes of its SHA-256 digest, read big-endian, are reduced modulo 100. Returns `None`
/// when neither identifier is present.
pub fn bucket_for(user_id: Option<&str>, project_id: Option<&str>) -> Option<u8> {
    if user_id.is_none() && project_id.is_none() {
        return None;
    }

    let key = format!("{}:{}", user_id.unwrap_or(""), project_id.unwrap_or(""));
    let digest = Sha256::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    Some((u64::from_be_bytes(prefix) % BUCKET_COUNT) as u8)
}
