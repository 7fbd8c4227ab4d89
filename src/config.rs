//! Core configuration: named, validated tuning fields.
//!
//! The core consumes already-parsed configuration objects; this module only
//! defines the schema and fails fast when a field is missing or out of its
//! valid range. A thin TOML loader is provided for embedders and tests.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, CoreResult};

/// Tunable parameters of the decision core.
///
/// All fields have defaults; `validate()` must be called after construction
/// from external input. Invalid values are fatal at load time, never at turn
/// time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Global confidence decay rate λ per elapsed turn (must be > 0).
    pub decay_rate: f32,
    /// Confidence floor below which a belief is treated as unknown.
    pub confidence_floor: f32,
    /// Evidence blend factor α for lower-confidence observations.
    pub blend_factor: f32,
    /// Minimum effective priority for a derived goal to survive.
    pub goal_threshold: f32,
    /// Minimum acceptable alignment score for a confident tool selection.
    pub selection_threshold: f32,
    /// How many top goals are handed to the tool selector.
    pub top_k_goals: usize,
    /// Budget for one affordance-oracle call, in seconds.
    pub oracle_timeout_secs: u64,
    /// Inactivity window after which an idle session is reaped, in seconds.
    pub session_idle_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            decay_rate: 0.05,
            confidence_floor: 0.05,
            blend_factor: 0.3,
            goal_threshold: 0.15,
            selection_threshold: 0.25,
            top_k_goals: 2,
            oracle_timeout_secs: 5,
            session_idle_secs: 2 * 60 * 60,
        }
    }
}

impl CoreConfig {
    /// Check every field against its valid range.
    ///
    /// Returns the first offending field as a diagnostic error.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.decay_rate > 0.0) || !self.decay_rate.is_finite() {
            return Err(ConfigError::OutOfRange {
                field: "decay_rate",
                value: self.decay_rate as f64,
                expected: "> 0",
            }
            .into());
        }
        if !(0.0..1.0).contains(&self.confidence_floor) {
            return Err(ConfigError::OutOfRange {
                field: "confidence_floor",
                value: self.confidence_floor as f64,
                expected: "[0, 1)",
            }
            .into());
        }
        if !(self.blend_factor > 0.0 && self.blend_factor <= 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "blend_factor",
                value: self.blend_factor as f64,
                expected: "(0, 1]",
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.goal_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "goal_threshold",
                value: self.goal_threshold as f64,
                expected: "[0, 1]",
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.selection_threshold) {
            return Err(ConfigError::OutOfRange {
                field: "selection_threshold",
                value: self.selection_threshold as f64,
                expected: "[0, 1]",
            }
            .into());
        }
        if self.top_k_goals == 0 {
            return Err(ConfigError::OutOfRange {
                field: "top_k_goals",
                value: 0.0,
                expected: ">= 1",
            }
            .into());
        }
        if self.oracle_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "oracle_timeout_secs",
                value: 0.0,
                expected: ">= 1",
            }
            .into());
        }
        if self.session_idle_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "session_idle_secs",
                value: 0.0,
                expected: ">= 1",
            }
            .into());
        }
        Ok(())
    }

    /// Parse and validate a configuration from a TOML document.
    pub fn from_toml_str(doc: &str) -> CoreResult<Self> {
        let config: Self = toml::from_str(doc).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}
