//! CLI configuration file support.
//!
//! Configuration precedence:
//! 1. `--config <path>`
//! 2. Local config file (./conduit.toml)
//! 3. Global config file (~/.conduit/config.toml)
//! 4. Defaults

use anyhow::Context;
use conduit_models::{ModelsConfig, ModelsConfigLoader};
use conduit_orchestrator::ExecutorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the local configuration file.
pub const LOCAL_CONFIG_FILE: &str = "conduit.toml";

/// CLI configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Log level
    #[serde(default)]
    pub log_level: Option<String>,

    /// Executor settings
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Canary rollout, models and seed metrics
    #[serde(flatten)]
    pub models: ModelsConfig,
}

impl CliConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;
        ModelsConfigLoader::validate(&config.models)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    /// Get default global configuration file path.
    pub fn default_global_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".conduit").join("config.toml"))
    }

    /// Discover and load configuration.
    ///
    /// An explicit path must exist. Discovered files are optional, but a discovered
    /// file that fails to parse is still an error.
    pub fn discover(explicit: Option<&Path>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load_from_file(path)?, Some(path.to_path_buf())));
        }

        let candidates = std::iter::once(PathBuf::from(LOCAL_CONFIG_FILE)).chain(Self::default_global_path());
        for path in candidates {
            if path.is_file() {
                let config = Self::load_from_file(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((Self::default(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_models::ModelStatus;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
log_level = "debug"

[executor]
max_concurrency = 4

[canary]
enabled = true
percentage = 25
exclude_roles = ["critical"]

[[models]]
id = "planner-stable"
name = "Planner"
provider = "anthropic"
role = "planner"
capabilities = ["text"]

[[models]]
id = "planner-next"
name = "Planner Next"
provider = "anthropic"
role = "planner"
capabilities = ["text"]
status = "canary"

[metrics.planner-stable]
success_rate = 0.9
correction_rate = 0.1
avg_confidence = 0.8
avg_cost = 0.01
"#;

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conduit.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = CliConfig::load_from_file(&path).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.executor.max_concurrency, Some(4));
        assert!(config.executor.validate_on_submit);
        assert!(config.models.canary.enabled);
        assert!(config.models.canary.exclude_roles.contains("critical"));
        assert_eq!(config.models.models.len(), 2);
        assert_eq!(config.models.models[1].status, ModelStatus::Canary);
        assert!(config.models.metrics.contains_key("planner-stable"));
    }

    #[test]
    fn test_invalid_percentage_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conduit.toml");
        std::fs::write(&path, "[canary]\nenabled = true\npercentage = 150\n").unwrap();

        let err = CliConfig::load_from_file(&path).unwrap_err();
        assert!(format!("{err:#}").contains("150"));
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.toml");
        assert!(CliConfig::discover(Some(&missing)).is_err());
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conduit.toml");
        std::fs::write(&path, "").unwrap();

        let (config, source) = CliConfig::discover(Some(&path)).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(source, Some(path));
    }
}
