//! Motor configuration from TOML.

use heapless::String;
use serde::Deserialize;

use super::control::ControlConfig;
use super::homing::HomingConfig;
use super::limits::TravelRange;
use super::safety::PositionSafetyConfig;
use super::units::{DegreesPerSec, DegreesPerSecSquared};
use crate::hal::MotorId;
use crate::motion::MotionLimits;

/// Complete motor configuration from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct MotorConfig {
    /// Index of the motor on the driver and encoder buses.
    pub id: MotorId,

    /// Human-readable name (max 32 chars).
    pub name: String<32>,

    /// Maximum angular velocity in degrees per second.
    #[serde(rename = "max_velocity_deg_per_sec")]
    pub max_velocity: DegreesPerSec,

    /// Maximum angular acceleration in degrees per second squared.
    #[serde(rename = "max_acceleration_deg_per_sec2")]
    pub max_acceleration: DegreesPerSecSquared,

    /// Absolute travel range accepted by `set_target`.
    #[serde(default)]
    pub travel: TravelRange,

    /// Position-loop tuning.
    #[serde(default)]
    pub control: ControlConfig,

    /// Safety limits.
    #[serde(default)]
    pub safety: PositionSafetyConfig,

    /// Optional homing procedure.
    #[serde(default)]
    pub homing: Option<HomingConfig>,
}

impl MotorConfig {
    /// Create a configuration with default tuning and limits.
    pub fn new(
        id: MotorId,
        name: &str,
        max_velocity: DegreesPerSec,
        max_acceleration: DegreesPerSecSquared,
    ) -> Self {
        Self {
            id,
            name: String::try_from(name).unwrap_or_default(),
            max_velocity,
            max_acceleration,
            travel: TravelRange::default(),
            control: ControlConfig::default(),
            safety: PositionSafetyConfig::default(),
            homing: None,
        }
    }

    /// Motion limits used to validate trajectory requests.
    pub fn motion_limits(&self) -> MotionLimits {
        MotionLimits::new(self.max_velocity.0, self.max_acceleration.0)
    }

    /// Whether moves are rejected until homing completes.
    pub fn requires_homing(&self) -> bool {
        self.homing.map(|h| h.required).unwrap_or(false)
    }
}
