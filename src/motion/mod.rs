//! Motion module for stepper-servo.
//!
//! Provides trajectory generation (trapezoidal and S-curve) and time-stepped
//! execution with controlled stops.

mod executor;
mod profile;
mod ramp;

pub use executor::MotionExecutor;
pub use profile::{
    Direction, MotionLimits, MotionPhase, MotionRequest, ProfileKind, Sample, Trajectory,
};
