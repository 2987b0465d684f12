//! Configuration module for stepper-servo.
//!
//! Provides the parameter structs for motors, control loops, safety limits,
//! homing and scheduling, loadable from TOML files (with `std` feature) or
//! built in code.

mod control;
mod homing;
mod limits;
mod motor;
mod safety;
mod system;
mod timing;
pub mod units;
#[cfg(feature = "std")]
mod loader;
mod validation;

pub use control::ControlConfig;
pub use homing::{HomingConfig, HomingDirection, HomingMethod};
pub use limits::TravelRange;
pub use motor::MotorConfig;
pub use safety::PositionSafetyConfig;
pub use system::SystemConfig;
pub use timing::{CoordinationConfig, SchedulerConfig};
pub use validation::{validate_config, validate_motor};

#[cfg(feature = "std")]
pub use loader::{load_config, parse_config};

// Re-export unit types at config level
pub use units::{Degrees, DegreesPerSec, DegreesPerSecSquared};
