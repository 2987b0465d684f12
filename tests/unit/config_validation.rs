//! Unit tests for configuration validation.

use stepper_servo::config::{
    validate_config, validate_motor, Degrees, DegreesPerSec, DegreesPerSecSquared, MotorConfig,
    SystemConfig, TravelRange,
};
use stepper_servo::error::{ConfigError, Error};
use stepper_servo::parse_config;

fn motor(id: u8) -> MotorConfig {
    MotorConfig::new(id, "axis", DegreesPerSec(90.0), DegreesPerSecSquared(180.0))
}

/// Test a default motor passes validation.
#[test]
fn test_default_motor_is_valid() {
    assert!(validate_motor(&motor(0)).is_ok());
}

/// Test inverted travel ranges are rejected.
#[test]
fn test_inverted_travel_rejected() {
    let mut m = motor(0);
    m.travel = TravelRange::new(Degrees(10.0), Degrees(-10.0));

    assert!(matches!(
        validate_motor(&m),
        Err(Error::Config(ConfigError::InvalidTravelRange { .. }))
    ));
}

/// Test negative gains are rejected by name.
#[test]
fn test_negative_gain_rejected() {
    let mut m = motor(0);
    m.control.kd = -0.1;

    assert_eq!(
        validate_motor(&m),
        Err(Error::Config(ConfigError::NegativeParameter("kd")))
    );
}

/// Test soft limits must lie strictly inside hard limits.
#[test]
fn test_soft_limits_touching_hard_rejected() {
    let mut m = motor(0);
    m.safety.soft_max = Degrees(200.0);

    assert!(matches!(
        validate_motor(&m),
        Err(Error::Config(ConfigError::InvalidSafetyLimits { .. }))
    ));
}

/// Test too many motors for the system.
#[test]
fn test_motor_id_limit() {
    let mut config = SystemConfig::default();
    config.insert_motor("far", motor(7)).unwrap();

    assert_eq!(
        validate_config(&config),
        Err(Error::Config(ConfigError::InvalidMotorId(7)))
    );
}

/// Test zero scheduler periods are rejected from TOML.
#[test]
fn test_zero_control_period_rejected() {
    let toml_str = r#"
[motors.a]
id = 0
name = "A"
max_velocity_deg_per_sec = 90.0
max_acceleration_deg_per_sec2 = 180.0

[scheduler]
control_period_us = 0
"#;

    assert!(matches!(
        parse_config(toml_str),
        Err(Error::Config(ConfigError::InvalidSchedulerTiming { .. }))
    ));
}
