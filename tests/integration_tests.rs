//! Integration tests for stepper-servo.
//!
//! These tests drive the public API end to end on the simulated platform.

mod unit;

use stepper_servo::config::{PositionSafetyConfig, SchedulerConfig};
use stepper_servo::error::{Error, SafetyError};
use stepper_servo::hal::{FaultKind, SimulatedPlatform, StopSource};
use stepper_servo::motion::{MotionLimits, MotionRequest};
use stepper_servo::safety::{SafetyBand, SafetyContext, SafetyState};
use stepper_servo::{
    parse_config, CoordinatedMove, CoordinationMode, Degrees, MotionPhase, MotionSystem, MoveTarget,
    PositionSafetyMonitor, ProfileKind, Scheduler, SystemTasks, TaskPriority, Trajectory, ViolationKind,
};

const DT_US: u32 = 1_000;

const TWO_AXIS: &str = r#"
[motors.pan]
id = 0
name = "Pan"
max_velocity_deg_per_sec = 90.0
max_acceleration_deg_per_sec2 = 180.0

[motors.pan.control]
ki = 0.0

[motors.tilt]
id = 1
name = "Tilt"
max_velocity_deg_per_sec = 90.0
max_acceleration_deg_per_sec2 = 180.0

[motors.tilt.control]
ki = 0.0
"#;

fn two_axis<'s>(platform: SimulatedPlatform, band: &'s SafetyBand<'s>) -> MotionSystem<'s, SimulatedPlatform> {
    let config = parse_config(TWO_AXIS).expect("config");
    let mut system = MotionSystem::new(platform, config, band).expect("system");
    system.enable_motor(0, true).unwrap();
    system.enable_motor(1, true).unwrap();
    system
}

fn step(system: &mut MotionSystem<'_, SimulatedPlatform>, ticks: u32) {
    for _ in 0..ticks {
        system.safety_tick();
        system.control_tick(DT_US).unwrap();
        system.coordination_tick();
        system.platform_mut().advance(u64::from(DT_US));
    }
}

// =============================================================================
// Trajectory generation
// =============================================================================

#[test]
fn test_trapezoid_with_cruise() {
    let request = MotionRequest::trapezoidal(0.0, 10_000.0, 1_000.0, 500.0);
    let t = Trajectory::generate(&request, &MotionLimits::unbounded()).unwrap();

    let (accel, cruise, decel) = t.phase_durations();
    assert!((accel - 2.0).abs() < 1e-4);
    assert!((cruise - 8.0).abs() < 1e-3);
    assert!((decel - 2.0).abs() < 1e-4);
    assert!((t.total_time() - 12.0).abs() < 1e-3);
    assert_eq!(t.peak_velocity(), 1_000.0);

    let mid = t.sample(6.0);
    assert_eq!(mid.phase, MotionPhase::ConstantVelocity);
    assert!((mid.velocity - 1_000.0).abs() < 1e-3);
}

#[test]
fn test_triangular_peak_velocity() {
    // Too short to reach 1000: peak = sqrt(a * d)
    let request = MotionRequest::trapezoidal(0.0, 400.0, 1_000.0, 500.0);
    let t = Trajectory::generate(&request, &MotionLimits::unbounded()).unwrap();

    let expected = (500.0_f32 * 400.0).sqrt();
    assert!((t.peak_velocity() - expected).abs() < 1e-2);
    assert_eq!(t.phase_durations().1, 0.0);
}

#[test]
fn test_sample_at_end_is_exact() {
    let request = MotionRequest::s_curve(10.0, -35.5, 60.0, 240.0, 0.05);
    let t = Trajectory::generate(&request, &MotionLimits::new(90.0, 360.0)).unwrap();

    for time in [t.total_time(), t.total_time() + 0.001, t.total_time() * 3.0] {
        let s = t.sample(time);
        assert_eq!(s.position, -35.5);
        assert_eq!(s.velocity, 0.0);
        assert_eq!(s.phase, MotionPhase::Complete);
    }
}

#[test]
fn test_request_beyond_limits_rejected() {
    let request = MotionRequest::trapezoidal(0.0, 90.0, 200.0, 100.0);
    assert!(Trajectory::generate(&request, &MotionLimits::new(90.0, 180.0)).is_err());
}

// =============================================================================
// Position safety
// =============================================================================

#[test]
fn test_enforce_without_soft_limits_clamps_to_hard() {
    let config = PositionSafetyConfig {
        enforce_soft_limits: false,
        ..PositionSafetyConfig::default()
    };
    let monitor = PositionSafetyMonitor::new(0, config);

    let enforced = monitor.enforce_limits(210.0);
    assert_eq!(enforced.position, 200.0);
    assert!(enforced.limit_exceeded);

    let inside = monitor.enforce_limits(190.0);
    assert_eq!(inside.position, 190.0);
    assert!(!inside.limit_exceeded);
}

#[test]
fn test_position_jump_is_runaway() {
    let mut sim = SimulatedPlatform::new();
    let mut monitor = PositionSafetyMonitor::new(0, PositionSafetyConfig::default());

    monitor.update_position(0.0, 0, &mut sim).unwrap();
    let result = monitor.update_position(40.0, 1_000, &mut sim);

    assert_eq!(
        result,
        Err(Error::Safety(SafetyError::Violation {
            motor: 0,
            kind: ViolationKind::Runaway
        }))
    );
    assert_eq!(monitor.status().state, SafetyState::EmergencyStop);
    assert!(monitor.status().runaway_detected);
    assert_eq!(
        sim.emergency_stops(),
        [StopSource::Safety {
            motor: 0,
            violation: ViolationKind::Runaway
        }]
    );
}

#[test]
fn test_update_gap_is_runaway() {
    let mut sim = SimulatedPlatform::new();
    let mut monitor = PositionSafetyMonitor::new(2, PositionSafetyConfig::default());

    monitor.update_position(5.0, 0, &mut sim).unwrap();
    monitor.update_position(5.1, 10_000, &mut sim).unwrap();
    assert!(monitor.update_position(5.2, 70_000, &mut sim).is_err());
    assert_eq!(monitor.status().violation, Some(ViolationKind::Runaway));
    assert_eq!(sim.fault_count(FaultKind::SafetyViolation(ViolationKind::Runaway)), 1);

    // Latched until cleared
    assert_eq!(
        monitor.update_position(5.2, 71_000, &mut sim),
        Err(Error::Safety(SafetyError::ViolationLatched(2)))
    );
    monitor.clear_violation();
    monitor.update_position(5.2, 72_000, &mut sim).unwrap();
    monitor.update_position(5.3, 73_000, &mut sim).unwrap();
}

#[test]
fn test_soft_limit_stops_without_emergency() {
    let mut sim = SimulatedPlatform::new();
    let mut monitor = PositionSafetyMonitor::new(0, PositionSafetyConfig::default());

    monitor.update_position(179.0, 0, &mut sim).unwrap();
    assert!(monitor.status().in_warning_zone);
    assert!(monitor.update_position(181.0, 1_000, &mut sim).is_err());

    assert_eq!(monitor.status().state, SafetyState::ControlledStop);
    assert_eq!(sim.motor(0).soft_stops, 1);
    assert!(sim.emergency_stops().is_empty());
}

#[test]
fn test_disabled_monitor_still_enforces_hard_limits() {
    let mut sim = SimulatedPlatform::new();
    let config = PositionSafetyConfig {
        enabled: false,
        ..PositionSafetyConfig::default()
    };
    let mut monitor = PositionSafetyMonitor::new(0, config);

    monitor.update_position(195.0, 0, &mut sim).unwrap();
    assert_eq!(
        monitor.update_position(250.0, 1_000, &mut sim),
        Err(Error::Safety(SafetyError::Violation {
            motor: 0,
            kind: ViolationKind::HardLimit
        }))
    );
    assert_eq!(monitor.status().state, SafetyState::EmergencyStop);
    assert_eq!(sim.emergency_stops().len(), 1);
    assert_eq!(monitor.check_hard_limits(&sim), Err(Error::Safety(SafetyError::ViolationLatched(0))));
}

// =============================================================================
// Motion system
// =============================================================================

#[test]
fn test_master_slave_keeps_offset() {
    let mut platform = SimulatedPlatform::new();
    platform.set_position(1, -30.0);
    let line = platform.safety_line();
    let band = SafetyBand::new(&line);
    let mut system = two_axis(platform, &band);

    system
        .set_coordination_mode(CoordinationMode::MasterSlave { master: 0 })
        .unwrap();
    let cmd = CoordinatedMove::new(ProfileKind::Trapezoidal)
        .with(0, 90.0)
        .unwrap()
        .with(1, 60.0)
        .unwrap();
    system.coordinated_move(&cmd).unwrap();
    assert_eq!(system.coordinator().motor_state(1).unwrap().offset, -30.0);

    step(&mut system, 4_000);

    let status = system.system_status();
    assert!(!status.coordinated_move_active);
    assert_eq!(status.completed_moves, 1);
    assert!((status.motors[0].position - 90.0).abs() < 0.1);
    assert!((status.motors[1].position - 60.0).abs() < 0.2);
}

#[test]
fn test_master_slave_from_rest() {
    let platform = SimulatedPlatform::new();
    let line = platform.safety_line();
    let band = SafetyBand::new(&line);
    let mut system = two_axis(platform, &band);

    system
        .set_coordination_mode(CoordinationMode::MasterSlave { master: 0 })
        .unwrap();
    let cmd = CoordinatedMove::new(ProfileKind::SCurve)
        .with(0, 90.0)
        .unwrap()
        .with(1, 60.0)
        .unwrap();
    system.coordinated_move(&cmd).unwrap();

    let mut worst = 0.0f32;
    for _ in 0..4_000 {
        system.safety_tick();
        system.control_tick(DT_US).expect("slave tracks within the error limit");
        system.coordination_tick();
        system.platform_mut().advance(u64::from(DT_US));
        worst = worst.max(system.motor_status(1).unwrap().error.abs());
    }

    let status = system.system_status();
    assert!(status.emergency.is_none());
    assert_eq!(status.completed_moves, 1);
    assert_eq!(status.aborted_moves, 0);
    assert!(worst < 5.0, "slave error peaked at {}", worst);
    assert!((status.motors[1].position - 60.0).abs() < 0.2);
    assert!(system.platform().faults().is_empty());
}

#[test]
fn test_synchronized_move_finishes_together() {
    let platform = SimulatedPlatform::new();
    let line = platform.safety_line();
    let band = SafetyBand::new(&line);
    let mut system = two_axis(platform, &band);
    system
        .set_coordination_mode(CoordinationMode::Synchronized)
        .unwrap();

    let cmd = CoordinatedMove::new(ProfileKind::SCurve)
        .with(0, 90.0)
        .unwrap()
        .with(1, -20.0)
        .unwrap();
    system.coordinated_move(&cmd).unwrap();

    let coord = system.coordinator();
    let t0 = coord.executor(0).unwrap().trajectory().unwrap().total_time();
    let t1 = coord.executor(1).unwrap().trajectory().unwrap().total_time();
    assert!((t0 - t1).abs() < 0.02);

    step(&mut system, 4_000);
    let status = system.system_status();
    assert!(status.all_settled());
    assert!((status.motors[1].position + 20.0).abs() < 0.1);
}

#[test]
fn test_clamped_target_rejected() {
    let platform = SimulatedPlatform::new();
    let line = platform.safety_line();
    let band = SafetyBand::new(&line);
    let mut system = two_axis(platform, &band);
    let result = system.move_to(MoveTarget::new(1, Degrees(-185.0)), ProfileKind::SCurve);

    assert_eq!(
        result,
        Err(Error::Safety(SafetyError::LimitExceeded {
            requested: -185.0,
            clamped: -180.0
        }))
    );
    assert!(!system.coordinator().any_profile_active());
}

// =============================================================================
// Scheduler
// =============================================================================

fn idle(_: &mut SimulatedPlatform, _: u32) -> stepper_servo::Result<()> {
    Ok(())
}

#[test]
fn test_deadline_exceeded_by_one() {
    let mut sim = SimulatedPlatform::new();
    let mut body = idle;
    let mut sched: Scheduler<'_, SimulatedPlatform, 4> = Scheduler::new(SchedulerConfig::default()).unwrap();
    let id = sched
        .create_task("loop", TaskPriority::High, 1_000, 1_000, &mut body)
        .unwrap();
    sched.start(&sim);

    sched.on_control_tick(&mut sim);
    sim.advance_time(1_000);
    sched.on_control_tick(&mut sim);
    assert_eq!(sched.get_task_stats(id).unwrap().missed_deadlines, 0);

    sim.advance_time(1_001);
    sched.on_control_tick(&mut sim);
    let stats = sched.get_task_stats(id).unwrap();
    assert_eq!(stats.execution_count, 3);
    assert_eq!(stats.missed_deadlines, 1);
    assert_eq!(stats.max_jitter_us, 1);
}

#[test]
fn test_config_to_scheduled_move() {
    let platform = SimulatedPlatform::new();
    let line = platform.safety_line();
    let band = SafetyBand::new(&line);
    let mut system = two_axis(platform, &band);
    let mut tasks = SystemTasks::default();
    let timing = system.config().scheduler;
    let mut critical: Scheduler<'_, SafetyContext<'_>, 2> = Scheduler::new(timing).unwrap();
    let mut control: Scheduler<'_, MotionSystem<'_, SimulatedPlatform>, 4> = Scheduler::new(timing).unwrap();
    system.register_tasks(&mut critical, &mut control, &mut tasks).unwrap();

    let pan = system.motor_id("pan").unwrap();
    system
        .move_to(MoveTarget::new(pan, Degrees(-45.0)), ProfileKind::SCurve)
        .unwrap();
    let mut ctx = band.context();
    critical.start(&ctx);
    control.start(&system);

    let ratio = timing.control_period_us / timing.safety_period_us;
    for tick in 0..20_000u32 {
        critical.on_safety_tick(&mut ctx);
        if tick % ratio == 0 {
            control.on_control_tick(&mut system);
        }
        control.run_background(&mut system);
        system.platform_mut().advance(u64::from(timing.safety_period_us));
    }

    let sched = control.get_status().combined(&critical.get_status());
    let status = system.system_status().with_scheduler(sched);
    let sched = status.scheduler.unwrap();
    assert_eq!(sched.task_count, 3);
    assert_eq!(sched.cycle_count, 2_000);
    assert_eq!(sched.safety_ticks, 20_000);
    assert_eq!(sched.task_errors, 0);
    assert_eq!(sched.missed_deadlines, 0);
    assert!((status.motors[0].position + 45.0).abs() < 0.1);
    assert!(status.motors[0].settled);
    assert!(system.platform().faults().is_empty());
}
