use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};

/// Limits applied by the reachability engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Maximum hop count of a path enumerated by `all_paths_to_sinks`
    pub max_path_length: usize,

    /// Capacity of the pairwise distance cache (entries)
    pub max_distance_cache: usize,

    /// Maximum number of paths returned by a single enumeration
    pub max_paths: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_path_length: 50,
            max_distance_cache: 10_000,
            max_paths: 10_000,
        }
    }
}

impl GraphConfig {
    /// Tighter limits for very large or densely connected graphs
    pub fn for_large_graphs() -> Self {
        Self {
            max_path_length: 20,
            max_distance_cache: 50_000,
            max_paths: 1_000,
        }
    }

    /// Parse a TOML document; missing keys fall back to defaults
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_distance_cache == 0 {
            return Err(GraphError::invalid_config(
                "max_distance_cache must be > 0",
            ));
        }

        if self.max_path_length == 0 {
            return Err(GraphError::invalid_config("max_path_length must be > 0"));
        }

        if self.max_paths == 0 {
            return Err(GraphError::invalid_config("max_paths must be > 0"));
        }

        Ok(())
    }
}
