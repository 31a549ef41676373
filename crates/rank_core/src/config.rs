//! Engine configuration
//!
//! All settings have defaults, so an empty TOML document is a valid config:
//!
//! ```toml
//! k_factor = 24.0
//! sufficiently_tested_threshold = 30
//!
//! [[promptsets]]
//! name = "basic1"
//! categories = ["General Knowledge", "Programming", "Reasoning"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::error::{RankError, Result};
use crate::outcome::Promptset;

/// Default starting ELO for models seen for the first time
pub const DEFAULT_BASE_RATING: f64 = 1400.0;

/// K-factor for ELO updates (higher = more volatile)
pub const DEFAULT_K_FACTOR: f64 = 32.0;

pub const DEFAULT_BT_TOLERANCE: f64 = 1e-6;
pub const DEFAULT_BT_MAX_ITERATIONS: usize = 1000;

/// Pseudo-games added to every pair before a Bradley-Terry fit
pub const DEFAULT_BT_SMOOTHING: f64 = 1.0;

pub const DEFAULT_SUGGESTION_COUNT: usize = 10;
pub const DEFAULT_SUFFICIENTLY_TESTED: u32 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rating assigned the first time a model appears in a series
    pub base_rating: f64,
    pub k_factor: f64,
    /// Maximum relative strength change that counts as converged
    pub bt_tolerance: f64,
    pub bt_max_iterations: usize,
    pub bt_smoothing: f64,
    /// How many pairs the suggestion policy returns by default
    pub suggestion_count: usize,
    /// Pairs with at least this many games are never suggested
    pub sufficiently_tested_threshold: u32,
    pub count_weight: f64,
    pub proximity_weight: f64,
    /// Rating gap at which the proximity term halves
    pub proximity_scale: f64,
    pub promptsets: Vec<Promptset>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_rating: DEFAULT_BASE_RATING,
            k_factor: DEFAULT_K_FACTOR,
            bt_tolerance: DEFAULT_BT_TOLERANCE,
            bt_max_iterations: DEFAULT_BT_MAX_ITERATIONS,
            bt_smoothing: DEFAULT_BT_SMOOTHING,
            suggestion_count: DEFAULT_SUGGESTION_COUNT,
            sufficiently_tested_threshold: DEFAULT_SUFFICIENTLY_TESTED,
            count_weight: 1.0,
            proximity_weight: 0.5,
            proximity_scale: 100.0,
            promptsets: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| RankError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Look up a declared promptset by name
    pub fn promptset(&self, name: &str) -> Result<&Promptset> {
        self.promptsets
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| RankError::UnknownPromptset(name.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("base_rating", self.base_rating),
            ("k_factor", self.k_factor),
            ("bt_tolerance", self.bt_tolerance),
            ("bt_smoothing", self.bt_smoothing),
            ("proximity_scale", self.proximity_scale),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(RankError::InvalidConfig(format!(
                    "{name} must be a positive finite number, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("count_weight", self.count_weight),
            ("proximity_weight", self.proximity_weight),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(RankError::InvalidConfig(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        if self.bt_max_iterations == 0 {
            return Err(RankError::InvalidConfig(
                "bt_max_iterations must be at least 1".into(),
            ));
        }
        if self.sufficiently_tested_threshold == 0 {
            return Err(RankError::InvalidConfig(
                "sufficiently_tested_threshold must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for promptset in &self.promptsets {
            if promptset.name.trim().is_empty() {
                return Err(RankError::InvalidConfig("promptset name is empty".into()));
            }
            if !seen.insert(promptset.name.as_str()) {
                return Err(RankError::InvalidConfig(format!(
                    "promptset '{}' declared twice",
                    promptset.name
                )));
            }
            if promptset.categories.iter().any(|c| c.trim().is_empty()) {
                return Err(RankError::InvalidConfig(format!(
                    "promptset '{}' has an empty category name",
                    promptset.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
