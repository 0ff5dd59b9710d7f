use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read planner config: {error}")]
    Read { error: String },
    #[error("Failed to parse planner config: {error}")]
    Parse { error: String },
    #[error("Invalid planner config: {message}")]
    Invalid { message: String },
}

/// Planner tunables. Defaults match the shipped behavior; deployments
/// override them from a YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Beam width of the join-order search.
    pub max_states: usize,
    /// Prune extension candidates against the best complete plan found
    /// so far. The bound understates joint-edge savings on dense cyclic
    /// patterns, so it can be switched off.
    pub lower_bound_pruning: bool,
    /// Estimated size at which a join boundary gets a DOWNSIZE guard.
    pub downsize_threshold: f64,
    /// Factor applied to the size estimate at a guarded boundary.
    pub downsize_weight: f64,
    /// Distinct sink ids kept as equality buckets before the histogram
    /// collapses to range buckets.
    pub histogram_bucket_cap: usize,
    /// Fallback key density when the host reports none or exactly 1.0.
    pub default_density: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            max_states: 100,
            lower_bound_pruning: true,
            downsize_threshold: 1e6,
            downsize_weight: 100.0,
            histogram_bucket_cap: 200,
            default_density: 0.001,
        }
    }
}

impl PlannerConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            error: e.to_string(),
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: PlannerConfig = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_states == 0 {
            return Err(ConfigError::Invalid {
                message: "max_states must be at least 1".to_string(),
            });
        }
        if self.downsize_threshold <= 0.0 || self.downsize_weight <= 1.0 {
            return Err(ConfigError::Invalid {
                message: "downsize_threshold must be positive and downsize_weight above 1"
                    .to_string(),
            });
        }
        if self.histogram_bucket_cap == 0 {
            return Err(ConfigError::Invalid {
                message: "histogram_bucket_cap must be at least 1".to_string(),
            });
        }
        if self.default_density <= 0.0 || self.default_density > 1.0 {
            return Err(ConfigError::Invalid {
                message: "default_density must be in (0, 1]".to_string(),
            });
        }
        Ok(())
    }
}
