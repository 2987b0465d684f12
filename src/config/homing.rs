//! Homing configuration.

use serde::Deserialize;

use super::units::{Degrees, DegreesPerSec};

/// How the reference position is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum HomingMethod {
    /// Drive toward a limit switch, back off, stop.
    LimitSwitch,
    /// Drive until the encoder reports its index mark.
    IndexPulse,
    /// Accept the current position as the reference.
    CurrentPosition,
}

/// Search direction for homing methods that move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum HomingDirection {
    /// Search toward increasing position.
    Positive,
    /// Search toward decreasing position.
    #[default]
    Negative,
}

impl HomingDirection {
    /// Sign multiplier for velocities.
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            HomingDirection::Positive => 1.0,
            HomingDirection::Negative => -1.0,
        }
    }
}

/// Homing parameters for one motor.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct HomingConfig {
    /// Homing strategy.
    pub method: HomingMethod,

    /// Search direction.
    #[serde(default)]
    pub direction: HomingDirection,

    /// Search speed (magnitude).
    #[serde(default = "default_search_velocity", rename = "search_velocity_deg_per_sec")]
    pub search_velocity: DegreesPerSec,

    /// Distance to back off the switch after it trips.
    #[serde(default = "default_backoff", rename = "backoff_degrees")]
    pub backoff: Degrees,

    /// Abort the sequence after this long.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u32,

    /// Position assigned to the reference point.
    #[serde(default, rename = "home_offset_degrees")]
    pub home_offset: Degrees,

    /// Reject moves until homing has completed.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_search_velocity() -> DegreesPerSec {
    DegreesPerSec(10.0)
}

fn default_backoff() -> Degrees {
    Degrees(2.0)
}

fn default_timeout_ms() -> u32 {
    10_000
}

fn default_required() -> bool {
    true
}

impl HomingConfig {
    /// Homing configuration for the given method with default parameters.
    pub fn new(method: HomingMethod) -> Self {
        Self {
            method,
            direction: HomingDirection::default(),
            search_velocity: default_search_velocity(),
            backoff: default_backoff(),
            timeout_ms: default_timeout_ms(),
            home_offset: Degrees(0.0),
            required: default_required(),
        }
    }
}
