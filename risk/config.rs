//! Run configuration for the scoring pipeline.
//!
//! Every field has a default, so an empty TOML file (or no file at all) gives
//! the standard 100-tree forest seeded with 42 and an 80/20 split.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Hyperparameters of the risk model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RiskModelConfig {
    /// Number of trees in the forest.
    pub n_trees: usize,
    /// Seed for the train/held-out split and for tree growth.
    pub seed: u64,
    /// Fraction of rows held out from training, in [0, 1).
    pub test_fraction: f64,
    /// Depth limit per tree; unlimited when absent.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl Default for RiskModelConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            seed: 42,
            test_fraction: 0.2,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

impl RiskModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_trees == 0 {
            return Err(ConfigError::Invalid("n_trees must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(ConfigError::Invalid(format!(
                "test_fraction must lie in [0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.min_samples_split < 2 {
            return Err(ConfigError::Invalid(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        if self.max_depth == Some(0) {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        Ok(())
    }
}

/// Top-level configuration read by the command-line tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub model: RiskModelConfig,
    /// Priority threshold used when none is given on the command line.
    pub default_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: RiskModelConfig::default(),
            default_threshold: 0.6,
        }
    }
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&toml_string)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model.validate()?;
        if !(0.0..=1.0).contains(&self.default_threshold) {
            return Err(ConfigError::Invalid(format!(
                "default_threshold must lie in [0, 1], got {}",
                self.default_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_the_standard_forest() {
        let config = PipelineConfig::default();
        assert_eq!(config.model.n_trees, 100);
        assert_eq!(config.model.seed, 42);
        assert_eq!(config.model.test_fraction, 0.2);
        assert_eq!(config.default_threshold, 0.6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let config: PipelineConfig = toml::from_str("[model]\nn_trees = 10\n").unwrap();
        assert_eq!(config.model.n_trees, 10);
        assert_eq!(config.model.seed, 42);
        assert_eq!(config.default_threshold, 0.6);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<PipelineConfig>("[model]\ntrees = 10\n").is_err());
    }

    #[test]
    fn save_and_load_agree() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relance.toml");
        let mut config = PipelineConfig::default();
        config.model.max_depth = Some(8);
        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn out_of_range_values_fail_validation() {
        let mut config = PipelineConfig::default();
        config.default_threshold = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut model = RiskModelConfig::default();
        model.test_fraction = 1.0;
        assert!(model.validate().is_err());
        model = RiskModelConfig {
            n_trees: 0,
            ..RiskModelConfig::default()
        };
        assert!(model.validate().is_err());
    }
}
