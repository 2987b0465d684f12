//! Unit tests for TOML configuration parsing.

use stepper_servo::config::{HomingDirection, HomingMethod, SystemConfig};
use stepper_servo::parse_config;

/// Test parsing a complete motor with control, safety and homing sections.
#[test]
fn test_parse_full_motor() {
    let toml_str = r#"
[motors.pan]
id = 0
name = "Pan Axis"
max_velocity_deg_per_sec = 180.0
max_acceleration_deg_per_sec2 = 360.0

[motors.pan.travel]
min_degrees = -170.0
max_degrees = 170.0

[motors.pan.control]
kp = 12.0
ki = 1.0
kd = 0.05
integral_limit = 15.0
output_limit_deg_per_sec = 200.0
position_filter = 0.8
velocity_filter = 0.2
velocity_feedforward = 1.0
acceleration_feedforward = 0.01
static_friction = 0.5
max_position_error_degrees = 10.0
settle_position_degrees = 0.05
settle_velocity_deg_per_sec = 0.5

[motors.pan.safety]
soft_min_degrees = -160.0
soft_max_degrees = 160.0
hard_min_degrees = -175.0
hard_max_degrees = 175.0
max_velocity_deg_per_sec = 250.0
runaway_threshold_degrees = 15.0
runaway_timeout_ms = 25
warning_margin_degrees = 5.0
enforce_soft_limits = false

[motors.pan.homing]
method = "limit_switch"
direction = "negative"
search_velocity_deg_per_sec = 20.0
backoff_degrees = 3.0
timeout_ms = 8000
home_offset_degrees = -150.0
"#;

    let config: SystemConfig = parse_config(toml_str).expect("Failed to parse TOML");
    let motor = config.motor("pan").expect("Motor not found");

    assert_eq!(motor.name.as_str(), "Pan Axis");
    assert_eq!(motor.max_velocity.0, 180.0);
    assert_eq!(motor.travel.min.0, -170.0);

    assert_eq!(motor.control.kp, 12.0);
    assert_eq!(motor.control.output_limit.0, 200.0);
    assert_eq!(motor.control.position_filter, 0.8);
    assert_eq!(motor.control.settle_position_tolerance.0, 0.05);

    assert_eq!(motor.safety.hard_max.0, 175.0);
    assert_eq!(motor.safety.runaway_threshold.0, 15.0);
    assert!(!motor.safety.enforce_soft_limits);
    assert!(motor.safety.enforce_hard_limits);

    let homing = motor.homing.expect("homing section");
    assert_eq!(homing.method, HomingMethod::LimitSwitch);
    assert_eq!(homing.direction, HomingDirection::Negative);
    assert_eq!(homing.backoff.0, 3.0);
    assert_eq!(homing.home_offset.0, -150.0);
    assert!(homing.required);
    assert!(motor.requires_homing());
}

/// Test that omitted sections take their defaults.
#[test]
fn test_parse_defaults() {
    let toml_str = r#"
[motors.tilt]
id = 1
name = "Tilt"
max_velocity_deg_per_sec = 90.0
max_acceleration_deg_per_sec2 = 180.0
"#;

    let config = parse_config(toml_str).unwrap();
    let motor = config.motor("tilt").unwrap();

    assert!(motor.homing.is_none());
    assert!(!motor.requires_homing());
    assert_eq!(motor.safety.soft_max.0, 180.0);
    assert_eq!(motor.safety.hard_max.0, 200.0);
    assert_eq!(config.scheduler.safety_period_us, 100);
    assert_eq!(config.coordination.load_balance_interval_ms, 10);
}

/// Test scheduler and coordination sections.
#[test]
fn test_parse_timing_sections() {
    let toml_str = r#"
[motors.a]
id = 0
name = "A"
max_velocity_deg_per_sec = 90.0
max_acceleration_deg_per_sec2 = 180.0

[motors.b]
id = 1
name = "B"
max_velocity_deg_per_sec = 90.0
max_acceleration_deg_per_sec2 = 180.0

[scheduler]
safety_period_us = 200
control_period_us = 2000
overrun_fault_threshold = 5

[coordination]
load_balance_threshold_degrees = 0.5
load_balance_interval_ms = 20
sync_tolerance = 0.1
"#;

    let config = parse_config(toml_str).unwrap();
    assert_eq!(config.scheduler.safety_period_us, 200);
    assert_eq!(config.scheduler.control_period_us, 2000);
    assert_eq!(config.scheduler.overrun_fault_threshold, 5);
    assert_eq!(config.scheduler.deadline_miss_fault_threshold, 100);
    assert_eq!(config.coordination.load_balance_threshold.0, 0.5);

    let names: Vec<&str> = config.motor_names().collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(config.motor_by_id(1).unwrap().name.as_str(), "B");
}

/// Test the three homing methods parse by name.
#[test]
fn test_parse_homing_methods() {
    for (name, method) in [
        ("limit_switch", HomingMethod::LimitSwitch),
        ("index_pulse", HomingMethod::IndexPulse),
        ("current_position", HomingMethod::CurrentPosition),
    ] {
        let toml_str = format!(
            r#"
[motors.m]
id = 0
name = "M"
max_velocity_deg_per_sec = 90.0
max_acceleration_deg_per_sec2 = 180.0

[motors.m.homing]
method = "{name}"
"#
        );
        let config = parse_config(&toml_str).unwrap();
        assert_eq!(config.motor("m").unwrap().homing.unwrap().method, method);
    }
}
