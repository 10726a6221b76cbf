//! Top-level drill-sergeant configuration with 4-layer resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{CoverageConfig, DuplicateConfig, StorageConfig};
use crate::errors::ConfigError;

/// Project config file name, looked up in the project root.
pub const PROJECT_CONFIG_FILE: &str = "drill-sergeant.toml";

/// Top-level configuration aggregating all sub-configs.
///
/// Resolution order (highest priority first):
/// 1. CLI flags (applied via `apply_cli_overrides`)
/// 2. Environment variables (`DRILL_SERGEANT_*`)
/// 3. Project config (`drill-sergeant.toml` in project root)
/// 4. User config (`~/.drill-sergeant/config.toml`)
/// 5. Compiled defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SergeantConfig {
    pub duplicates: DuplicateConfig,
    pub coverage: CoverageConfig,
    pub storage: StorageConfig,
}

/// CLI override arguments that can be applied to a config.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub similar_pattern_threshold: Option<f64>,
    pub min_cluster_size: Option<usize>,
    pub python: Option<String>,
    pub timeout_secs: Option<u64>,
    pub storage_path: Option<String>,
    pub storage_enabled: Option<bool>,
}

impl SergeantConfig {
    /// Load configuration with 4-layer resolution rooted at `root`.
    pub fn load(root: &Path, cli_overrides: Option<&CliOverrides>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Layer 4 (lowest priority): user config
        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                match Self::merge_toml_file(&mut config, &user_config_path) {
                    Ok(()) => {}
                    Err(e @ ConfigError::ParseError { .. }) => return Err(e),
                    Err(e) => {
                        tracing::warn!(error = %e, "ignoring unreadable user config");
                    }
                }
            }
        }

        // Layer 3: project config
        let project_config_path = root.join(PROJECT_CONFIG_FILE);
        if project_config_path.exists() {
            Self::merge_toml_file(&mut config, &project_config_path)?;
        }

        // Layer 2: environment variables
        Self::apply_env_overrides(&mut config);

        // Layer 1 (highest priority): CLI flags
        if let Some(cli) = cli_overrides {
            Self::apply_cli_overrides(&mut config, cli);
        }

        Self::validate(&config)?;

        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::ParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Validate the configuration values.
    ///
    /// Weights are not required to sum to 1.0.
    pub fn validate(config: &SergeantConfig) -> Result<(), ConfigError> {
        let d = &config.duplicates;
        let unit_fields = [
            ("duplicates.exact_duplicate_threshold", d.exact_duplicate_threshold),
            ("duplicates.near_duplicate_threshold", d.near_duplicate_threshold),
            ("duplicates.similar_pattern_threshold", d.similar_pattern_threshold),
            ("duplicates.coverage_weight", d.coverage_weight),
            ("duplicates.mock_assertion_weight", d.mock_assertion_weight),
            ("duplicates.exception_weight", d.exception_weight),
            ("duplicates.structure_weight", d.structure_weight),
        ];
        for (field, value) in unit_fields {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(ConfigError::ValidationFailed {
                        field: field.to_string(),
                        message: "must be between 0.0 and 1.0".to_string(),
                    });
                }
            }
        }

        let min = d.effective_min_cluster_size();
        if min < 2 {
            return Err(ConfigError::ValidationFailed {
                field: "duplicates.min_cluster_size".to_string(),
                message: "must be at least 2".to_string(),
            });
        }
        if d.effective_max_cluster_size() < min {
            return Err(ConfigError::ValidationFailed {
                field: "duplicates.max_cluster_size".to_string(),
                message: "must be greater than or equal to min_cluster_size".to_string(),
            });
        }

        if config.coverage.effective_timeout_secs() == 0 {
            return Err(ConfigError::ValidationFailed {
                field: "coverage.timeout_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if config.coverage.python.as_deref() == Some("") {
            return Err(ConfigError::ValidationFailed {
                field: "coverage.python".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Returns the user config path: `~/.drill-sergeant/config.toml`.
    fn user_config_path() -> Option<PathBuf> {
        dirs_path().map(|d| d.join("config.toml"))
    }

    /// Merge a TOML file into the existing config.
    /// Unknown keys are silently ignored.
    fn merge_toml_file(config: &mut SergeantConfig, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;

        let file_config: SergeantConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Self::merge(config, &file_config);
        Ok(())
    }

    /// Merge `other` into `base`; `other` wins only where it has a `Some` value.
    fn merge(base: &mut SergeantConfig, other: &SergeantConfig) {
        // Duplicates
        let (b, o) = (&mut base.duplicates, &other.duplicates);
        if o.exact_duplicate_threshold.is_some() {
            b.exact_duplicate_threshold = o.exact_duplicate_threshold;
        }
        if o.near_duplicate_threshold.is_some() {
            b.near_duplicate_threshold = o.near_duplicate_threshold;
        }
        if o.similar_pattern_threshold.is_some() {
            b.similar_pattern_threshold = o.similar_pattern_threshold;
        }
        if o.min_cluster_size.is_some() {
            b.min_cluster_size = o.min_cluster_size;
        }
        if o.max_cluster_size.is_some() {
            b.max_cluster_size = o.max_cluster_size;
        }
        if o.coverage_weight.is_some() {
            b.coverage_weight = o.coverage_weight;
        }
        if o.mock_assertion_weight.is_some() {
            b.mock_assertion_weight = o.mock_assertion_weight;
        }
        if o.exception_weight.is_some() {
            b.exception_weight = o.exception_weight;
        }
        if o.structure_weight.is_some() {
            b.structure_weight = o.structure_weight;
        }

        // Coverage
        let (b, o) = (&mut base.coverage, &other.coverage);
        if o.python.is_some() {
            b.python = o.python.clone();
        }
        if o.timeout_secs.is_some() {
            b.timeout_secs = o.timeout_secs;
        }
        if o.max_parent_depth.is_some() {
            b.max_parent_depth = o.max_parent_depth;
        }
        if o.max_selected_files.is_some() {
            b.max_selected_files = o.max_selected_files;
        }
        if o.max_candidate_files.is_some() {
            b.max_candidate_files = o.max_candidate_files;
        }

        // Storage
        let (b, o) = (&mut base.storage, &other.storage);
        if o.path.is_some() {
            b.path = o.path.clone();
        }
        if o.retention_days.is_some() {
            b.retention_days = o.retention_days;
        }
        if o.enabled.is_some() {
            b.enabled = o.enabled;
        }
    }

    /// Apply environment variable overrides.
    /// Pattern: `DRILL_SERGEANT_SIMILAR_THRESHOLD`, `DRILL_SERGEANT_PYTHON`, etc.
    fn apply_env_overrides(config: &mut SergeantConfig) {
        if let Some(v) = env_parse::<f64>("DRILL_SERGEANT_EXACT_THRESHOLD") {
            config.duplicates.exact_duplicate_threshold = Some(v);
        }
        if let Some(v) = env_parse::<f64>("DRILL_SERGEANT_NEAR_THRESHOLD") {
            config.duplicates.near_duplicate_threshold = Some(v);
        }
        if let Some(v) = env_parse::<f64>("DRILL_SERGEANT_SIMILAR_THRESHOLD") {
            config.duplicates.similar_pattern_threshold = Some(v);
        }
        if let Some(v) = env_parse::<usize>("DRILL_SERGEANT_MIN_CLUSTER_SIZE") {
            config.duplicates.min_cluster_size = Some(v);
        }
        if let Some(v) = env_parse::<usize>("DRILL_SERGEANT_MAX_CLUSTER_SIZE") {
            config.duplicates.max_cluster_size = Some(v);
        }
        if let Ok(val) = std::env::var("DRILL_SERGEANT_PYTHON") {
            config.coverage.python = Some(val);
        }
        if let Some(v) = env_parse::<u64>("DRILL_SERGEANT_TIMEOUT_SECS") {
            config.coverage.timeout_secs = Some(v);
        }
        if let Ok(val) = std::env::var("DRILL_SERGEANT_STORAGE_PATH") {
            config.storage.path = Some(val);
        }
        if let Some(v) = env_parse::<i64>("DRILL_SERGEANT_RETENTION_DAYS") {
            config.storage.retention_days = Some(v);
        }
        if let Some(v) = env_parse::<bool>("DRILL_SERGEANT_STORAGE_ENABLED") {
            config.storage.enabled = Some(v);
        }
    }

    /// Apply CLI overrides (highest priority).
    fn apply_cli_overrides(config: &mut SergeantConfig, cli: &CliOverrides) {
        if let Some(v) = cli.similar_pattern_threshold {
            config.duplicates.similar_pattern_threshold = Some(v);
        }
        if let Some(v) = cli.min_cluster_size {
            config.duplicates.min_cluster_size = Some(v);
        }
        if let Some(ref v) = cli.python {
            config.coverage.python = Some(v.clone());
        }
        if let Some(v) = cli.timeout_secs {
            config.coverage.timeout_secs = Some(v);
        }
        if let Some(ref v) = cli.storage_path {
            config.storage.path = Some(v.clone());
        }
        if let Some(v) = cli.storage_enabled {
            config.storage.enabled = Some(v);
        }
    }

    /// Serialize the config back to TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            path: "<serialization>".to_string(),
            message: e.to_string(),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

/// Returns the user-level config directory: `~/.drill-sergeant/`.
fn dirs_path() -> Option<PathBuf> {
    home_dir().map(|h| h.join(".drill-sergeant"))
}

/// Cross-platform home directory resolution.
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
