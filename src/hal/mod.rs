//! Contracts with the hardware around the motion core.
//!
//! The core never talks to registers. Encoder reads, driver commands, the
//! millisecond tick, emergency-stop escalation and fault reporting all go
//! through the traits here; a board support crate implements them once and
//! gets [`Platform`] for free.

mod critical;
#[cfg(feature = "std")]
mod sim;
mod switch;

pub use critical::{CriticalSection, InterruptControl, IrqCell};
#[cfg(feature = "std")]
pub use sim::{SimMotor, SimSafetyLine, SimulatedPlatform};
pub use switch::LimitSwitch;

use crate::config::units::{Degrees, DegreesPerSec};
use crate::error::HardwareError;
use crate::safety::ViolationKind;

/// Index of a motor on the encoder and driver buses.
pub type MotorId = u8;

/// Who asked for an emergency stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopSource {
    /// A position safety monitor detected a violation.
    Safety {
        /// Motor that violated its limits.
        motor: MotorId,
        /// What was violated.
        violation: ViolationKind,
    },
    /// The application requested it.
    Command,
}

/// Non-fatal anomalies reported to the supervisory layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultKind {
    /// Tracking error above the configured maximum.
    PositionErrorExceeded,
    /// Encoder read failed.
    EncoderCommunication,
    /// Driver command failed.
    DriverCommunication,
    /// Motors in a synchronized move drifted apart.
    SynchronizationDrift,
    /// A load-sharing motor deviated from the group average.
    LoadImbalance,
    /// Homing did not finish within its timeout.
    HomingTimeout,
    /// A safety violation was handled locally.
    SafetyViolation(ViolationKind),
    /// Control-loop overruns passed the configured threshold.
    ControlOverrun,
    /// Deadline misses passed the configured threshold.
    DeadlineMiss,
    /// A scheduled task body returned an error.
    TaskFailure,
}

/// Monotonic time source.
pub trait Clock {
    /// Microseconds since an arbitrary epoch. Must never go backwards.
    fn now_us(&self) -> u64;

    /// Milliseconds since the same epoch.
    fn now_ms(&self) -> u64 {
        self.now_us() / 1_000
    }
}

/// Absolute position feedback.
pub trait PositionEncoder {
    /// Read the shaft angle of a motor.
    fn read_position(&mut self, motor: MotorId) -> Result<Degrees, HardwareError>;

    /// Whether the index mark passed since the previous call.
    fn index_detected(&mut self, _motor: MotorId) -> Result<bool, HardwareError> {
        Ok(false)
    }
}

/// Command sink of the stepper drivers.
pub trait MotorDriver {
    /// Run at a signed velocity.
    fn send_velocity(&mut self, motor: MotorId, velocity: DegreesPerSec) -> Result<(), HardwareError>;

    /// Decelerate to rest using the driver's own ramp.
    fn soft_stop(&mut self, motor: MotorId) -> Result<(), HardwareError>;

    /// Stop immediately.
    fn hard_stop(&mut self, motor: MotorId) -> Result<(), HardwareError>;

    /// Release the windings.
    fn set_high_impedance(&mut self, motor: MotorId) -> Result<(), HardwareError>;
}

/// Inputs used by homing.
pub trait HomeSensors {
    /// Whether the homing limit switch of a motor is currently active.
    fn limit_switch_active(&mut self, motor: MotorId) -> Result<bool, HardwareError>;
}

/// System-wide emergency stop entry point.
///
/// Callable from any interrupt priority, hence `&self`.
pub trait EmergencyStop {
    /// Cut motor power everywhere. Must not fail.
    fn trigger_emergency_stop(&self, source: StopSource);
}

/// Sink for non-fatal faults. Callable from any interrupt priority.
pub trait FaultReporter {
    /// Record a fault. `motor` is `None` for system-wide faults.
    fn report_fault(&self, motor: Option<MotorId>, fault: FaultKind);
}

/// Everything the motion core needs from the board.
pub trait Platform:
    Clock + PositionEncoder + MotorDriver + HomeSensors + EmergencyStop + FaultReporter + InterruptControl
{
}

impl<T> Platform for T where
    T: Clock
        + PositionEncoder
        + MotorDriver
        + HomeSensors
        + EmergencyStop
        + FaultReporter
        + InterruptControl
{
}

/// What the safety interrupt owns: its own view of the clock, the
/// emergency-stop line, the fault sink and the interrupt mask.
///
/// Every method takes `&self`, so the handle can be used while the control
/// band holds the [`Platform`] mutably.
pub trait SafetyLine: Clock + EmergencyStop + FaultReporter + InterruptControl {}

impl<T> SafetyLine for T where T: Clock + EmergencyStop + FaultReporter + InterruptControl {}
