//! # stepper-servo
//!
//! Closed-loop motion core for encoder-equipped stepper motors.
//!
//! ## Features
//!
//! - **Trajectories**: trapezoidal and seven-phase S-curve profiles, with
//!   controlled stops from any point
//! - **Position control**: filtered feedback, PID with windup clamp, velocity
//!   and acceleration feedforward, homing by switch, index mark or in place
//! - **Safety**: soft and hard limits, velocity limit, runaway and stalled
//!   feedback detection, escalation to emergency stop, checked at the
//!   critical rate from a band that preempts the control loop
//! - **Coordination**: independent, synchronized, load-sharing and
//!   master/slave moves over several motors
//! - **Scheduling**: four priority tiers on two timers with deadline, overrun
//!   and jitter accounting
//! - **no_std compatible**: no allocation on the real-time path
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stepper_servo::{MotionSystem, MoveTarget, ProfileKind, Degrees, SafetyBand};
//!
//! let config = stepper_servo::load_config("motion.toml")?;
//! let band = SafetyBand::new(&safety_line);
//! let mut system = MotionSystem::new(board, config, &band)?;
//! let pan = system.motor_id("pan").unwrap();
//!
//! system.enable_motor(pan, true)?;
//! system.move_to(MoveTarget::new(pan, Degrees(45.0)), ProfileKind::SCurve)?;
//!
//! // From the timer interrupts:
//! band.tick();                    // every 100 us, may preempt the control tick
//! system.control_tick(1_000)?;    // every 1 ms
//! system.coordination_tick();
//! ```
//!
//! `safety_line` is the part of the board the safety interrupt may touch
//! while the control tick owns the rest: clock, emergency-stop line, fault
//! sink and interrupt mask (see [`hal::SafetyLine`]).
//!
//! ## Feature Flags
//!
//! - `std` (default): TOML file loading and the simulated platform
//! - `alloc`: heap allocation for no_std with allocator
//! - `defmt`: defmt logging for embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
// Allow large error types - necessary for no_std with heapless strings
#![allow(clippy::result_large_err)]

#[cfg(feature = "alloc")]
extern crate alloc;

// Must come first: the logging macros are used by every other module.
#[macro_use]
mod fmt;

pub mod config;
pub mod control;
pub mod coordination;
pub mod error;
pub mod hal;
pub mod motion;
pub mod safety;
pub mod scheduler;
pub mod system;

/// Number of motors a system can drive.
pub const MAX_MOTORS: usize = 4;

// Re-exports for ergonomic API
pub use config::{validate_config, MotorConfig, SystemConfig};
pub use control::PositionController;
pub use coordination::{CoordinatedMove, CoordinationMode, Coordinator, MoveTarget};
pub use error::{Error, Result};
pub use hal::{MotorId, Platform};
pub use motion::{Direction, MotionExecutor, MotionPhase, ProfileKind, Trajectory};
pub use safety::{PositionSafetyMonitor, SafetyBand, ViolationKind};
pub use scheduler::{Scheduler, TaskPriority};
pub use system::{MotionSystem, MotorStatus, SystemStatus, SystemTasks};

// Configuration loading (std only)
#[cfg(feature = "std")]
pub use config::{load_config, parse_config};

// Unit types
pub use config::units::{Degrees, DegreesPerSec, DegreesPerSecSquared};
