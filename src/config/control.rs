//! Position-loop tuning parameters.

use serde::Deserialize;

use super::units::{Degrees, DegreesPerSec};

/// PID, filter and feedforward parameters for one position controller.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Proportional gain (deg/s per degree of error).
    pub kp: f32,

    /// Integral gain.
    pub ki: f32,

    /// Derivative gain.
    pub kd: f32,

    /// Bound on the integral accumulator, in output units (deg/s).
    pub integral_limit: f32,

    /// Symmetric clamp on the total output.
    #[serde(rename = "output_limit_deg_per_sec")]
    pub output_limit: DegreesPerSec,

    /// Single-pole IIR coefficient for the measured position, in (0, 1].
    /// 1.0 disables filtering.
    pub position_filter: f32,

    /// IIR coefficient for the finite-difference velocity estimate, in (0, 1].
    pub velocity_filter: f32,

    /// Velocity feedforward gain (multiplies target velocity).
    pub velocity_feedforward: f32,

    /// Acceleration feedforward gain (multiplies rate of change of target velocity).
    pub acceleration_feedforward: f32,

    /// Static friction compensation applied in the direction of motion (deg/s).
    pub static_friction: f32,

    /// Tracking error that is reported as a control fault.
    #[serde(rename = "max_position_error_degrees")]
    pub max_position_error: Degrees,

    /// Position error below which the axis may count as settled.
    #[serde(rename = "settle_position_degrees")]
    pub settle_position_tolerance: Degrees,

    /// Velocity below which the axis may count as settled.
    #[serde(rename = "settle_velocity_deg_per_sec")]
    pub settle_velocity_tolerance: DegreesPerSec,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            kp: 8.0,
            ki: 0.5,
            kd: 0.0,
            integral_limit: 20.0,
            output_limit: DegreesPerSec(360.0),
            position_filter: 1.0,
            velocity_filter: 0.3,
            velocity_feedforward: 1.0,
            acceleration_feedforward: 0.0,
            static_friction: 0.0,
            max_position_error: Degrees(20.0),
            settle_position_tolerance: Degrees(0.1),
            settle_velocity_tolerance: DegreesPerSec(1.0),
        }
    }
}
