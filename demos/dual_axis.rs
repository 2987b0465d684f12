//! Example: Two coordinated axes driven by the real-time scheduler.
//!
//! This example demonstrates how to:
//! - Register the safety task on a critical-tier scheduler and the control
//!   and coordination tasks on a control-tier scheduler
//! - Drive both schedulers from two simulated timers
//! - Run synchronized and master/slave moves
//! - Trigger and clear an emergency stop
//!
//! Run with: `cargo run --example dual_axis --features std`

use stepper_servo::{
    config::SchedulerConfig,
    hal::SimulatedPlatform,
    parse_config,
    safety::{SafetyBand, SafetyContext},
    CoordinatedMove, CoordinationMode, MotionSystem, ProfileKind, Result, Scheduler, SystemTasks,
};

type System<'s> = MotionSystem<'s, SimulatedPlatform>;
type Critical<'a, 's> = Scheduler<'a, SafetyContext<'s>, 1>;
type Control<'a, 's> = Scheduler<'a, System<'s>, 4>;

fn main() -> Result<()> {
    println!("=== Dual Axis Example ===\n");

    let toml_content = r#"
[motors.pan]
id = 0
name = "Pan"
max_velocity_deg_per_sec = 90.0
max_acceleration_deg_per_sec2 = 180.0

[motors.tilt]
id = 1
name = "Tilt"
max_velocity_deg_per_sec = 60.0
max_acceleration_deg_per_sec2 = 120.0

[motors.tilt.safety]
soft_min_degrees = -90.0
soft_max_degrees = 90.0
hard_min_degrees = -100.0
hard_max_degrees = 100.0

[scheduler]
safety_period_us = 100
control_period_us = 1000

[coordination]
sync_tolerance = 0.1
"#;

    let config = parse_config(toml_content)?;
    let timing = config.scheduler;

    let board = SimulatedPlatform::new();
    let line = board.safety_line();
    let band = SafetyBand::new(&line);
    let mut system = MotionSystem::new(board, config, &band)?;
    system.enable_motor(0, true)?;
    system.enable_motor(1, true)?;

    let mut tasks = SystemTasks::default();
    let mut critical: Critical<'_, '_> = Scheduler::new(timing)?;
    let mut control: Control<'_, '_> = Scheduler::new(timing)?;
    system.register_tasks(&mut critical, &mut control, &mut tasks)?;
    let mut ctx = band.context();
    critical.start(&ctx);
    control.start(&system);

    // Synchronized: both axes arrive together
    system.set_coordination_mode(CoordinationMode::Synchronized)?;
    let cmd = CoordinatedMove::new(ProfileKind::SCurve).with(0, 90.0)?.with(1, 30.0)?;
    system.coordinated_move(&cmd)?;
    for axis in [0, 1] {
        if let Some(t) = system.coordinator().executor(axis).and_then(|e| e.trajectory()) {
            println!("Axis {}: {:.1}° in {:.3}s (peak {:.1}°/s)", axis, t.distance(), t.total_time(), t.peak_velocity());
        }
    }
    run(&mut system, &mut ctx, &mut critical, &mut control, timing, 3_000);
    print_status(&system, &critical, &control);

    // Master/slave: tilt follows pan, keeping the offset between the targets
    system.set_coordination_mode(CoordinationMode::MasterSlave { master: 0 })?;
    let cmd = CoordinatedMove::new(ProfileKind::Trapezoidal).with(0, 30.0)?.with(1, -30.0)?;
    system.coordinated_move(&cmd)?;
    println!(
        "\nSlave offset: {:.1}°",
        system.coordinator().motor_state(1).map(|s| s.offset).unwrap_or(0.0)
    );
    run(&mut system, &mut ctx, &mut critical, &mut control, timing, 3_000);
    print_status(&system, &critical, &control);

    // Emergency stop halts everything until cleared
    system.set_coordination_mode(CoordinationMode::Independent)?;
    let cmd = CoordinatedMove::new(ProfileKind::Trapezoidal).with(0, 60.0)?.with(1, 10.0)?;
    system.coordinated_move(&cmd)?;
    run(&mut system, &mut ctx, &mut critical, &mut control, timing, 300);
    system.emergency_stop();
    println!("\nEmergency stop: {:?}", system.system_status().emergency);
    if let Err(e) = system.coordinated_move(&cmd) {
        println!("  move while stopped: {}", e);
    }
    system.clear_emergency()?;
    println!("  cleared: {}", !system.is_emergency_stopped());

    println!("\n=== Example Complete ===");
    Ok(())
}

/// Drive both timers for `ms` milliseconds of simulated time.
fn run<'s>(
    system: &mut System<'s>,
    ctx: &mut SafetyContext<'s>,
    critical: &mut Critical<'_, 's>,
    control: &mut Control<'_, 's>,
    timing: SchedulerConfig,
    ms: u32,
) {
    let ratio = timing.control_period_us / timing.safety_period_us;
    for tick in 0..ms * ratio {
        critical.on_safety_tick(ctx);
        if tick % ratio == 0 {
            control.on_control_tick(system);
        }
        control.run_background(system);
        system.platform_mut().advance(u64::from(timing.safety_period_us));
    }
}

fn print_status(system: &System<'_>, critical: &Critical<'_, '_>, control: &Control<'_, '_>) {
    let scheduler = control.get_status().combined(&critical.get_status());
    let status = system.system_status().with_scheduler(scheduler);
    println!(
        "Mode {:?}, completed moves: {}, aborted: {}",
        status.mode, status.completed_moves, status.aborted_moves
    );
    for motor in &status.motors {
        println!(
            "  motor {}: {:>8.3}° settled={} safety={:?}",
            motor.id, motor.position, motor.settled, motor.safety_state
        );
    }
    if let Some(sched) = status.scheduler {
        println!(
            "  scheduler: {} cycles, {} safety ticks, {} missed, {} overruns, jitter {} us",
            sched.cycle_count, sched.safety_ticks, sched.missed_deadlines, sched.overrun_count, sched.max_jitter_us
        );
    }
}
