//! Configuration for shared composables.
//!
//! Settings can be built in code, deserialized from JSON, or read from
//! environment variables for deployments that tune them without recompiling.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ShareError, ShareResult};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "COMPOSE";

/// Tunables shared by both composable variants.
///
/// # Examples
///
/// ```
/// use ferrous_compose::ComposeConfig;
///
/// let config = ComposeConfig::from_json(r#"{ "max_construction_depth": 16 }"#).unwrap();
/// assert_eq!(config.max_construction_depth, 16);
/// assert!(config.sweep_dead_scopes);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Prune buckets of dropped scopes whenever a new scope bucket is created.
    pub sweep_dead_scopes: bool,
    /// Maximum nesting of factories constructing other entries on one thread.
    pub max_construction_depth: usize,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            sweep_dead_scopes: true,
            max_construction_depth: 256,
        }
    }
}

impl ComposeConfig {
    /// Sets [`sweep_dead_scopes`](Self::sweep_dead_scopes).
    pub fn with_sweep_dead_scopes(mut self, enabled: bool) -> Self {
        self.sweep_dead_scopes = enabled;
        self
    }

    /// Sets [`max_construction_depth`](Self::max_construction_depth).
    pub fn with_max_construction_depth(mut self, depth: usize) -> Self {
        self.max_construction_depth = depth;
        self
    }

    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> ShareResult<Self> {
        serde_json::from_str(json).map_err(|err| ShareError::InvalidConfig {
            key: "<json>".to_string(),
            value: err.to_string(),
        })
    }

    /// Reads overrides from `COMPOSE_*` environment variables.
    pub fn from_env() -> ShareResult<Self> {
        Self::from_env_with_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Reads overrides from `<PREFIX>_SWEEP_DEAD_SCOPES` and
    /// `<PREFIX>_MAX_CONSTRUCTION_DEPTH`. Unset variables keep defaults.
    pub fn from_env_with_prefix(prefix: &str) -> ShareResult<Self> {
        let mut config = Self::default();
        let prefix = prefix.to_uppercase();

        if let Some(sweep) = read_env::<bool>(&format!("{}_SWEEP_DEAD_SCOPES", prefix))? {
            config.sweep_dead_scopes = sweep;
        }
        if let Some(depth) = read_env::<usize>(&format!("{}_MAX_CONSTRUCTION_DEPTH", prefix))? {
            config.max_construction_depth = depth;
        }
        Ok(config)
    }
}

fn read_env<T: FromStr>(key: &str) -> ShareResult<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ShareError::InvalidConfig { key: key.to_string(), value: raw }),
        Err(_) => Ok(None),
    }
}
