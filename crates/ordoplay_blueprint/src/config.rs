// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interpreter settings, stored as RON.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Interpreter settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Trace every node step, sub-flow push and resume
    pub log_steps: bool,
    /// Check arguments against the entry node's parameter types
    pub validate_arguments: bool,
}

impl InterpreterConfig {
    /// Parse settings from RON text; missing fields keep their defaults
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    /// Serialize settings to pretty RON text
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }
}

/// Error while loading settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read interpreter config: {0}")]
    Io(#[from] std::io::Error),

    /// Text is not valid RON for the settings
    #[error("Invalid interpreter config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be written as RON
    #[error("Failed to write interpreter config: {0}")]
    Serialize(#[from] ron::Error),
}
