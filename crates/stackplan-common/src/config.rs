//! Planner configuration model.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_OUTPUTS, DEFAULT_MAX_RESOURCES, DEFAULT_PSEUDO_PARAMETER_PREFIX,
};
use crate::error::{Result, StackplanError};

/// Tunables for resolving and validating a manifest.
///
/// Every field falls back to its default when absent from a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// `Ref` targets starting with this prefix are provider pseudo parameters.
    pub pseudo_parameter_prefix: String,
    /// Upper bound on declared resources.
    pub max_resources: usize,
    /// Upper bound on declared outputs.
    pub max_outputs: usize,
    /// Whether logical names must match `[A-Za-z0-9]+`.
    pub require_alphanumeric_names: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            pseudo_parameter_prefix: DEFAULT_PSEUDO_PARAMETER_PREFIX.to_owned(),
            max_resources: DEFAULT_MAX_RESOURCES,
            max_outputs: DEFAULT_MAX_OUTPUTS,
            require_alphanumeric_names: true,
        }
    }
}

impl PlannerConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON
    /// for this model.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| StackplanError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        if config.pseudo_parameter_prefix.is_empty() {
            return Err(StackplanError::Config {
                message: "pseudo_parameter_prefix must not be empty".into(),
            });
        }
        Ok(config)
    }

    /// Returns whether `name` designates a provider pseudo parameter.
    #[must_use]
    pub fn is_pseudo_parameter(&self, name: &str) -> bool {
        name.starts_with(&self.pseudo_parameter_prefix)
    }
}
