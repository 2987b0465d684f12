//! Position safety limits.

use serde::Deserialize;

use super::units::{Degrees, DegreesPerSec};
use crate::error::ConfigError;

/// Per-motor safety limits and enforcement flags.
///
/// Soft limits must lie strictly inside hard limits. Hard limits are enforced
/// whatever `enabled` or `enforce_hard_limits` say; clearing
/// `enforce_hard_limits` only logs a warning when the monitor is configured.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PositionSafetyConfig {
    /// Soft-limit, velocity, runaway and encoder monitoring enabled.
    pub enabled: bool,

    /// Lower soft limit.
    #[serde(rename = "soft_min_degrees")]
    pub soft_min: Degrees,

    /// Upper soft limit.
    #[serde(rename = "soft_max_degrees")]
    pub soft_max: Degrees,

    /// Lower hard limit.
    #[serde(rename = "hard_min_degrees")]
    pub hard_min: Degrees,

    /// Upper hard limit.
    #[serde(rename = "hard_max_degrees")]
    pub hard_max: Degrees,

    /// Largest velocity tolerated before a controlled stop.
    #[serde(rename = "max_velocity_deg_per_sec")]
    pub max_velocity: DegreesPerSec,

    /// Largest position change tolerated between two consecutive updates.
    #[serde(rename = "runaway_threshold_degrees")]
    pub runaway_threshold: Degrees,

    /// Longest tolerated gap between two position updates.
    pub runaway_timeout_ms: u32,

    /// Distance inside a soft limit at which the warning flag is raised.
    #[serde(rename = "warning_margin_degrees")]
    pub warning_margin: Degrees,

    /// Stop the motor when a soft limit is crossed.
    pub enforce_soft_limits: bool,

    /// Requested hard-limit enforcement. Cannot actually be disabled.
    pub enforce_hard_limits: bool,
}

impl Default for PositionSafetyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            soft_min: Degrees(-180.0),
            soft_max: Degrees(180.0),
            hard_min: Degrees(-200.0),
            hard_max: Degrees(200.0),
            max_velocity: DegreesPerSec(720.0),
            runaway_threshold: Degrees(30.0),
            runaway_timeout_ms: 50,
            warning_margin: Degrees(10.0),
            enforce_soft_limits: true,
            enforce_hard_limits: true,
        }
    }
}

impl PositionSafetyConfig {
    /// Check that soft limits lie strictly inside hard limits and that the
    /// thresholds are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.hard_min.0 < self.soft_min.0
            && self.soft_min.0 < self.soft_max.0
            && self.soft_max.0 < self.hard_max.0;
        if !ordered {
            return Err(ConfigError::InvalidSafetyLimits {
                soft: (self.soft_min.0, self.soft_max.0),
                hard: (self.hard_min.0, self.hard_max.0),
            });
        }

        if self.max_velocity.0 <= 0.0 {
            return Err(ConfigError::InvalidMaxVelocity(self.max_velocity.0));
        }

        if self.runaway_threshold.0 <= 0.0 {
            return Err(ConfigError::NegativeParameter("runaway_threshold_degrees"));
        }

        if self.warning_margin.0 < 0.0 {
            return Err(ConfigError::NegativeParameter("warning_margin_degrees"));
        }

        Ok(())
    }

    /// Check if a position is inside the soft limits (inclusive).
    #[inline]
    pub fn within_soft(&self, position: f32) -> bool {
        position >= self.soft_min.0 && position <= self.soft_max.0
    }

    /// Check if a position is inside the hard limits (inclusive).
    #[inline]
    pub fn within_hard(&self, position: f32) -> bool {
        position >= self.hard_min.0 && position <= self.hard_max.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PositionSafetyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_soft_must_be_inside_hard() {
        let config = PositionSafetyConfig {
            soft_max: Degrees(200.0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSafetyLimits { .. })
        ));

        let config = PositionSafetyConfig {
            soft_min: Degrees(-250.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_limit_membership() {
        let config = PositionSafetyConfig::default();
        assert!(config.within_soft(180.0));
        assert!(!config.within_soft(190.0));
        assert!(config.within_hard(190.0));
        assert!(!config.within_hard(-201.0));
    }
}
