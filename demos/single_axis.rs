//! Example: One axis from TOML configuration to a finished move.
//!
//! This example demonstrates how to:
//! - Parse a motor configuration from TOML
//! - Home an axis and run an S-curve move on the simulated platform
//! - Watch the trajectory phases and the tracking error
//! - See a target beyond the soft limits being rejected
//!
//! Run with: `cargo run --example single_axis --features std`

use stepper_servo::{
    hal::SimulatedPlatform, parse_config, safety::SafetyBand, Degrees, MotionPhase, MotionSystem, MoveTarget,
    ProfileKind, Result,
};

const TICK_US: u32 = 1_000;

fn main() -> Result<()> {
    println!("=== Single Axis Example ===\n");

    let toml_content = r#"
[motors.pan]
id = 0
name = "Pan Axis"
max_velocity_deg_per_sec = 120.0
max_acceleration_deg_per_sec2 = 480.0

[motors.pan.control]
kp = 10.0
ki = 0.2
velocity_filter = 0.5

[motors.pan.safety]
soft_min_degrees = -150.0
soft_max_degrees = 150.0
hard_min_degrees = -170.0
hard_max_degrees = 170.0

[motors.pan.homing]
method = "current_position"
home_offset_degrees = 0.0
"#;

    let config = parse_config(toml_content)?;
    let motor = config.motor("pan").map(|m| m.name.clone()).unwrap_or_default();
    println!("Motor: {}", motor);

    let board = SimulatedPlatform::new();
    let line = board.safety_line();
    let band = SafetyBand::new(&line);
    let mut system = MotionSystem::new(board, config, &band)?;
    let pan = system.motor_id("pan").unwrap_or(0);
    system.enable_motor(pan, true)?;

    // Homing is required before any move
    match system.move_to(MoveTarget::new(pan, Degrees(10.0)), ProfileKind::SCurve) {
        Ok(()) => println!("Unexpected: move accepted before homing"),
        Err(e) => println!("Before homing: {}", e),
    }
    system.home(pan)?;
    run(&mut system, 5);
    println!("Homed: {}\n", system.motor_status(pan)?.homed);

    system.move_to(MoveTarget::new(pan, Degrees(120.0)), ProfileKind::SCurve)?;

    println!("{:>8} {:>10} {:>10} {:>8}  phase", "t (ms)", "pos (°)", "vel (°/s)", "err");
    println!("{}", "-".repeat(52));

    let mut last_phase = MotionPhase::Idle;
    let mut elapsed_ms = 0u32;
    loop {
        run(&mut system, 1);
        elapsed_ms += TICK_US / 1_000;

        let status = system.motor_status(pan)?;
        if status.phase != last_phase || elapsed_ms % 250 == 0 {
            println!(
                "{:>8} {:>10.2} {:>10.2} {:>8.3}  {:?}",
                elapsed_ms, status.position, status.velocity, status.error, status.phase
            );
            last_phase = status.phase;
        }
        if (status.settled && !status.profile_active) || elapsed_ms > 5_000 {
            break;
        }
    }

    let status = system.motor_status(pan)?;
    println!("\nSettled at {:.3}° after {} ms", status.position, elapsed_ms);

    // Beyond the soft limit: rejected, nothing moves
    match system.move_to(MoveTarget::new(pan, Degrees(160.0)), ProfileKind::Trapezoidal) {
        Ok(()) => println!("Unexpected: move accepted"),
        Err(e) => println!("Move to 160°: {}", e),
    }
    let validation = system.validate_target(pan, Degrees(160.0))?;
    println!(
        "  soft ok: {}, hard ok: {}, {:.1}° from {:?}",
        validation.soft_limit_ok,
        validation.hard_limit_ok,
        validation.distance_to_limit,
        validation.nearest
    );

    println!("\n=== Example Complete ===");
    Ok(())
}

/// Run safety, control and coordination for `ticks` control periods.
fn run(system: &mut MotionSystem<'_, SimulatedPlatform>, ticks: u32) {
    for _ in 0..ticks {
        system.safety_tick();
        if let Err(e) = system.control_tick(TICK_US) {
            println!("control: {}", e);
        }
        system.coordination_tick();
        system.platform_mut().advance(u64::from(TICK_US));
    }
}
