//! Configuration validation.

use crate::error::{ConfigError, Error, Result};
use crate::MAX_MOTORS;

use super::{MotorConfig, SystemConfig};

/// Validate a system configuration.
///
/// Checks:
/// - Motor ids are unique and below [`MAX_MOTORS`]
/// - Velocity and acceleration maxima are positive
/// - Travel range, gains, filters and tolerances are usable
/// - Soft limits lie strictly inside hard limits
/// - Homing parameters are usable
/// - Scheduler periods are non-zero
pub fn validate_config(config: &SystemConfig) -> Result<()> {
    if config.motors.len() > MAX_MOTORS {
        return Err(Error::Config(ConfigError::TooManyMotors));
    }

    let mut seen = [false; MAX_MOTORS];
    for (_, motor) in config.motors.iter() {
        validate_motor(motor)?;

        let slot = motor.id as usize;
        if seen[slot] {
            return Err(Error::Config(ConfigError::DuplicateMotorId(motor.id)));
        }
        seen[slot] = true;
    }

    let scheduler = &config.scheduler;
    if scheduler.safety_period_us == 0 || scheduler.control_period_us == 0 {
        return Err(Error::Config(ConfigError::InvalidSchedulerTiming {
            safety_period_us: scheduler.safety_period_us,
            control_period_us: scheduler.control_period_us,
        }));
    }

    if config.coordination.load_balance_threshold.0 < 0.0 {
        return Err(Error::Config(ConfigError::NegativeParameter(
            "load_balance_threshold_degrees",
        )));
    }

    Ok(())
}

/// Validate a single motor configuration.
pub fn validate_motor(config: &MotorConfig) -> Result<()> {
    if config.id as usize >= MAX_MOTORS {
        return Err(Error::Config(ConfigError::InvalidMotorId(config.id)));
    }

    // Max velocity must be positive
    if config.max_velocity.0 <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidMaxVelocity(
            config.max_velocity.0,
        )));
    }

    // Max acceleration must be positive
    if config.max_acceleration.0 <= 0.0 {
        return Err(Error::Config(ConfigError::InvalidMaxAcceleration(
            config.max_acceleration.0,
        )));
    }

    if !config.travel.is_valid() {
        return Err(Error::Config(ConfigError::InvalidTravelRange {
            min: config.travel.min.0,
            max: config.travel.max.0,
        }));
    }

    let control = &config.control;
    for (name, value) in [
        ("kp", control.kp),
        ("ki", control.ki),
        ("kd", control.kd),
        ("integral_limit", control.integral_limit),
        ("output_limit_deg_per_sec", control.output_limit.0),
        ("static_friction", control.static_friction),
        ("max_position_error_degrees", control.max_position_error.0),
        ("settle_position_degrees", control.settle_position_tolerance.0),
        ("settle_velocity_deg_per_sec", control.settle_velocity_tolerance.0),
    ] {
        if value < 0.0 {
            return Err(Error::Config(ConfigError::NegativeParameter(name)));
        }
    }

    for coefficient in [control.position_filter, control.velocity_filter] {
        if !(coefficient > 0.0 && coefficient <= 1.0) {
            return Err(Error::Config(ConfigError::InvalidFilterCoefficient(
                coefficient,
            )));
        }
    }

    config.safety.validate()?;

    if let Some(homing) = config.homing {
        if homing.search_velocity.0 <= 0.0 {
            return Err(Error::Config(ConfigError::InvalidHoming(
                "search velocity must be > 0",
            )));
        }
        if homing.timeout_ms == 0 {
            return Err(Error::Config(ConfigError::InvalidHoming(
                "timeout must be > 0",
            )));
        }
        if homing.backoff.0 < 0.0 {
            return Err(Error::Config(ConfigError::InvalidHoming(
                "backoff must not be negative",
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::units::{Degrees, DegreesPerSec, DegreesPerSecSquared};
    use crate::config::{HomingConfig, HomingMethod};

    fn motor(id: u8) -> MotorConfig {
        MotorConfig::new(id, "m", DegreesPerSec(360.0), DegreesPerSecSquared(720.0))
    }

    #[test]
    fn test_invalid_max_velocity() {
        let mut config = motor(0);
        config.max_velocity = DegreesPerSec(-1.0);

        assert!(matches!(
            validate_motor(&config),
            Err(Error::Config(ConfigError::InvalidMaxVelocity(_)))
        ));
    }

    #[test]
    fn test_invalid_filter_coefficient() {
        let mut config = motor(0);
        config.control.position_filter = 0.0;
        assert!(matches!(
            validate_motor(&config),
            Err(Error::Config(ConfigError::InvalidFilterCoefficient(_)))
        ));

        config.control.position_filter = 1.5;
        assert!(validate_motor(&config).is_err());
    }

    #[test]
    fn test_motor_id_out_of_range() {
        let config = motor(MAX_MOTORS as u8);
        assert!(matches!(
            validate_motor(&config),
            Err(Error::Config(ConfigError::InvalidMotorId(_)))
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut system = SystemConfig::default();
        assert!(system.insert_motor("a", motor(0)).is_ok());
        assert!(system.insert_motor("b", motor(0)).is_ok());

        assert!(matches!(
            validate_config(&system),
            Err(Error::Config(ConfigError::DuplicateMotorId(0)))
        ));
    }

    #[test]
    fn test_homing_timeout_must_be_positive() {
        let mut config = motor(0);
        let mut homing = HomingConfig::new(HomingMethod::LimitSwitch);
        homing.timeout_ms = 0;
        config.homing = Some(homing);

        assert!(matches!(
            validate_motor(&config),
            Err(Error::Config(ConfigError::InvalidHoming(_)))
        ));
    }

    #[test]
    fn test_safety_limits_checked() {
        let mut config = motor(0);
        config.safety.soft_max = Degrees(250.0);

        assert!(matches!(
            validate_motor(&config),
            Err(Error::Config(ConfigError::InvalidSafetyLimits { .. }))
        ));
    }
}
