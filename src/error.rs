//! Error types for stepper-servo.
//!
//! Provides unified error handling across configuration, trajectory generation,
//! position control, coordination, safety enforcement and scheduling.

use core::fmt;

use crate::hal::MotorId;

/// Result type alias using the library's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all stepper-servo operations.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration parsing or validation error
    Config(ConfigError),
    /// Trajectory generation error
    Motion(MotionError),
    /// Position control or homing error
    Control(ControlError),
    /// Multi-motor coordination error
    Coordination(CoordinationError),
    /// Safety limit enforcement error
    Safety(SafetyError),
    /// Task scheduler error
    Scheduler(SchedulerError),
    /// Encoder or driver I/O error
    Hardware(HardwareError),
}

/// Configuration-related errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    ParseError(heapless::String<128>),
    /// Motor name not found in configuration
    MotorNotFound(heapless::String<32>),
    /// Two motors share the same id
    DuplicateMotorId(MotorId),
    /// Motor id is outside the supported range
    InvalidMotorId(MotorId),
    /// Too many motors configured
    TooManyMotors,
    /// Invalid max velocity (must be > 0)
    InvalidMaxVelocity(f32),
    /// Invalid max acceleration (must be > 0)
    InvalidMaxAcceleration(f32),
    /// Invalid travel range (min must be < max)
    InvalidTravelRange {
        /// Minimum travel in degrees
        min: f32,
        /// Maximum travel in degrees
        max: f32,
    },
    /// Filter coefficient outside (0, 1]
    InvalidFilterCoefficient(f32),
    /// A gain or limit that must not be negative is negative
    NegativeParameter(&'static str),
    /// Soft limits do not lie strictly inside hard limits
    InvalidSafetyLimits {
        /// Soft limits `[min, max]`
        soft: (f32, f32),
        /// Hard limits `[min, max]`
        hard: (f32, f32),
    },
    /// Homing parameters are unusable
    InvalidHoming(&'static str),
    /// Scheduler period or deadline is zero
    InvalidSchedulerTiming {
        /// Safety tick period in microseconds
        safety_period_us: u32,
        /// Control tick period in microseconds
        control_period_us: u32,
    },
    /// File I/O error (std only)
    #[cfg(feature = "std")]
    IoError(heapless::String<128>),
}

/// Trajectory generation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionError {
    /// Requested velocity exceeds motor's maximum
    VelocityExceedsLimit {
        /// Requested velocity
        requested: f32,
        /// Maximum allowed velocity
        max: f32,
    },
    /// Requested acceleration or deceleration exceeds motor's maximum
    AccelerationExceedsLimit {
        /// Requested acceleration
        requested: f32,
        /// Maximum allowed acceleration
        max: f32,
    },
    /// Velocity must be strictly positive
    NonPositiveVelocity(f32),
    /// Acceleration or deceleration must be strictly positive
    NonPositiveAcceleration(f32),
    /// Jerk time must be finite and not negative
    InvalidJerkTime(f32),
    /// Start or end position is not a finite number
    NonFinitePosition,
}

/// Position control and homing errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlError {
    /// No controller exists for this motor id
    InvalidMotorId(MotorId),
    /// Motor is disabled
    MotorDisabled(MotorId),
    /// Motor requires homing before accepting moves
    NotHomed(MotorId),
    /// Target lies outside the absolute travel range
    TargetOutOfRange {
        /// Requested target in degrees
        target: f32,
        /// Travel minimum in degrees
        min: f32,
        /// Travel maximum in degrees
        max: f32,
    },
    /// Tracking error is larger than the configured maximum
    PositionErrorExceeded {
        /// Motor id
        motor: MotorId,
        /// Measured error in degrees
        error: f32,
        /// Configured maximum in degrees
        max: f32,
    },
    /// Last encoder read failed; position is unknown
    PositionInvalid(MotorId),
    /// Motor has no homing configuration
    HomingNotConfigured(MotorId),
    /// A homing sequence is already running
    HomingInProgress(MotorId),
    /// Homing did not finish within its timeout
    HomingTimeout(MotorId),
}

/// Multi-motor coordination errors.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinationError {
    /// None of the motors named in the command is enabled
    NoMotorsEnabled,
    /// A coordinated move is still running
    MotionAlreadyActive,
    /// Master motor is missing from the command or disabled
    InvalidMaster(MotorId),
    /// The same motor appears twice in one command
    DuplicateMotor(MotorId),
    /// Command is empty
    EmptyCommand,
}

/// Safety limit errors.
#[derive(Debug, Clone, PartialEq)]
pub enum SafetyError {
    /// Requested position was clamped to a limit
    LimitExceeded {
        /// Requested position in degrees
        requested: f32,
        /// Position after clamping in degrees
        clamped: f32,
    },
    /// A commanded emergency stop is active
    EmergencyStopActive,
    /// A violation is latched; motion blocked until cleared
    ViolationLatched(MotorId),
    /// A new violation was detected on this update
    Violation {
        /// Motor id
        motor: MotorId,
        /// What was violated
        kind: crate::safety::ViolationKind,
    },
}

/// Scheduler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerError {
    /// No free task slot
    TaskTableFull,
    /// Unknown task id
    InvalidTaskId(u8),
    /// Period must be non-zero
    InvalidPeriod,
    /// Task name too long
    NameTooLong,
}

/// Encoder and driver I/O errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareError {
    /// Bus communication with encoder or driver failed
    Communication,
    /// Driver reported a fault condition
    DriverFault,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Motion(e) => write!(f, "Motion error: {}", e),
            Error::Control(e) => write!(f, "Control error: {}", e),
            Error::Coordination(e) => write!(f, "Coordination error: {}", e),
            Error::Safety(e) => write!(f, "Safety error: {}", e),
            Error::Scheduler(e) => write!(f, "Scheduler error: {}", e),
            Error::Hardware(e) => write!(f, "Hardware error: {}", e),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ConfigError::MotorNotFound(name) => write!(f, "Motor '{}' not found", name),
            ConfigError::DuplicateMotorId(id) => write!(f, "Duplicate motor id: {}", id),
            ConfigError::InvalidMotorId(id) => {
                write!(f, "Invalid motor id: {}. Must be below {}", id, crate::MAX_MOTORS)
            }
            ConfigError::TooManyMotors => {
                write!(f, "Too many motors (max {})", crate::MAX_MOTORS)
            }
            ConfigError::InvalidMaxVelocity(v) => write!(f, "Invalid max velocity: {}. Must be > 0", v),
            ConfigError::InvalidMaxAcceleration(v) => {
                write!(f, "Invalid max acceleration: {}. Must be > 0", v)
            }
            ConfigError::InvalidTravelRange { min, max } => {
                write!(f, "Invalid travel range: min ({}) must be < max ({})", min, max)
            }
            ConfigError::InvalidFilterCoefficient(v) => {
                write!(f, "Invalid filter coefficient: {}. Must be in (0, 1]", v)
            }
            ConfigError::NegativeParameter(name) => write!(f, "Parameter '{}' must not be negative", name),
            ConfigError::InvalidSafetyLimits { soft, hard } => write!(
                f,
                "Soft limits [{}, {}] must lie strictly inside hard limits [{}, {}]",
                soft.0, soft.1, hard.0, hard.1
            ),
            ConfigError::InvalidHoming(reason) => write!(f, "Invalid homing configuration: {}", reason),
            ConfigError::InvalidSchedulerTiming {
                safety_period_us,
                control_period_us,
            } => write!(
                f,
                "Invalid scheduler timing: safety {} us, control {} us",
                safety_period_us, control_period_us
            ),
            #[cfg(feature = "std")]
            ConfigError::IoError(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl fmt::Display for MotionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionError::VelocityExceedsLimit { requested, max } => {
                write!(f, "Requested velocity {} exceeds maximum {}", requested, max)
            }
            MotionError::AccelerationExceedsLimit { requested, max } => {
                write!(f, "Requested acceleration {} exceeds maximum {}", requested, max)
            }
            MotionError::NonPositiveVelocity(v) => write!(f, "Velocity must be > 0, got {}", v),
            MotionError::NonPositiveAcceleration(a) => {
                write!(f, "Acceleration must be > 0, got {}", a)
            }
            MotionError::InvalidJerkTime(t) => write!(f, "Invalid jerk time: {}", t),
            MotionError::NonFinitePosition => write!(f, "Position is not finite"),
        }
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::InvalidMotorId(id) => write!(f, "No controller for motor {}", id),
            ControlError::MotorDisabled(id) => write!(f, "Motor {} is disabled", id),
            ControlError::NotHomed(id) => write!(f, "Motor {} is not homed", id),
            ControlError::TargetOutOfRange { target, min, max } => {
                write!(f, "Target {} outside travel range [{}, {}]", target, min, max)
            }
            ControlError::PositionErrorExceeded { motor, error, max } => write!(
                f,
                "Motor {} position error {} exceeds maximum {}",
                motor, error, max
            ),
            ControlError::PositionInvalid(id) => write!(f, "Motor {} position unknown", id),
            ControlError::HomingNotConfigured(id) => write!(f, "Motor {} has no homing configuration", id),
            ControlError::HomingInProgress(id) => write!(f, "Motor {} is already homing", id),
            ControlError::HomingTimeout(id) => write!(f, "Motor {} homing timed out", id),
        }
    }
}

impl fmt::Display for CoordinationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinationError::NoMotorsEnabled => write!(f, "No enabled motor in command"),
            CoordinationError::MotionAlreadyActive => write!(f, "Coordinated move already active"),
            CoordinationError::InvalidMaster(id) => write!(f, "Invalid master motor {}", id),
            CoordinationError::DuplicateMotor(id) => write!(f, "Motor {} listed twice", id),
            CoordinationError::EmptyCommand => write!(f, "Coordinated move has no targets"),
        }
    }
}

impl fmt::Display for SafetyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyError::LimitExceeded { requested, clamped } => {
                write!(f, "Position {} clamped to {}", requested, clamped)
            }
            SafetyError::EmergencyStopActive => write!(f, "Emergency stop active"),
            SafetyError::ViolationLatched(id) => {
                write!(f, "Motor {} has a latched safety violation", id)
            }
            SafetyError::Violation { motor, kind } => {
                write!(f, "Motor {} safety violation: {}", motor, kind.name())
            }
        }
    }
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::TaskTableFull => write!(f, "Task table full"),
            SchedulerError::InvalidTaskId(id) => write!(f, "Unknown task id {}", id),
            SchedulerError::InvalidPeriod => write!(f, "Task period must be > 0"),
            SchedulerError::NameTooLong => write!(f, "Task name too long"),
        }
    }
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareError::Communication => write!(f, "communication failure"),
            HardwareError::DriverFault => write!(f, "driver fault"),
        }
    }
}

// Conversion impls
impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<MotionError> for Error {
    fn from(e: MotionError) -> Self {
        Error::Motion(e)
    }
}

impl From<ControlError> for Error {
    fn from(e: ControlError) -> Self {
        Error::Control(e)
    }
}

impl From<CoordinationError> for Error {
    fn from(e: CoordinationError) -> Self {
        Error::Coordination(e)
    }
}

impl From<SafetyError> for Error {
    fn from(e: SafetyError) -> Self {
        Error::Safety(e)
    }
}

impl From<SchedulerError> for Error {
    fn from(e: SchedulerError) -> Self {
        Error::Scheduler(e)
    }
}

impl From<HardwareError> for Error {
    fn from(e: HardwareError) -> Self {
        Error::Hardware(e)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for MotionError {}

#[cfg(feature = "std")]
impl std::error::Error for ControlError {}

#[cfg(feature = "std")]
impl std::error::Error for CoordinationError {}

#[cfg(feature = "std")]
impl std::error::Error for SafetyError {}

#[cfg(feature = "std")]
impl std::error::Error for SchedulerError {}

#[cfg(feature = "std")]
impl std::error::Error for HardwareError {}
