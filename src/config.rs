//! Engine configuration
//!
//! Loaded from JSON (`serde_json`) or assembled with [`EngineConfig::builder`].
//! Every field has a default, so `{}` is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::stats::{check_confidence_level, DEFAULT_CONFIDENCE_LEVEL};
use crate::Result;

/// Settings shared by the registry, assignment service, and results calculator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Confidence level used when a caller does not pass one
    pub default_confidence_level: f64,
    /// Allow `complete` directly from draft (experiment never started)
    pub allow_complete_from_draft: bool,
    /// Seed for the assignment RNG; `None` draws from OS entropy
    pub assignment_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_confidence_level: DEFAULT_CONFIDENCE_LEVEL,
            allow_complete_from_draft: true,
            assignment_seed: None,
        }
    }
}

impl EngineConfig {
    /// Create a builder starting from the defaults.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns `Config` for malformed JSON and `InvalidInput` for
    /// out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the confidence level is not in (0, 1).
    pub fn validate(&self) -> Result<()> {
        check_confidence_level(self.default_confidence_level).map(|_| ())
    }
}

/// Builder for `EngineConfig`.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the default confidence level.
    #[must_use]
    pub const fn default_confidence_level(mut self, level: f64) -> Self {
        self.config.default_confidence_level = level;
        self
    }

    /// Allow or forbid completing an experiment that never started.
    #[must_use]
    pub const fn allow_complete_from_draft(mut self, allow: bool) -> Self {
        self.config.allow_complete_from_draft = allow;
        self
    }

    /// Seed the assignment RNG for reproducible runs.
    #[must_use]
    pub const fn assignment_seed(mut self, seed: u64) -> Self {
        self.config.assignment_seed = Some(seed);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if a value is out of range.
    pub fn build(self) -> Result<EngineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
