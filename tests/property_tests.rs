//! Property-based tests for trajectory generation and safety limits.

use proptest::prelude::*;

use stepper_servo::config::PositionSafetyConfig;
use stepper_servo::motion::{MotionLimits, MotionRequest};
use stepper_servo::{MotionPhase, PositionSafetyMonitor, Trajectory};

const LIMITS: MotionLimits = MotionLimits::new(2_000.0, 10_000.0);

fn trapezoid() -> impl Strategy<Value = MotionRequest> {
    (-1_000.0f32..1_000.0, -1_000.0f32..1_000.0, 1.0f32..2_000.0, 1.0f32..10_000.0)
        .prop_map(|(start, end, v, a)| MotionRequest::trapezoidal(start, end, v, a))
}

fn s_curve() -> impl Strategy<Value = MotionRequest> {
    (
        -1_000.0f32..1_000.0,
        -1_000.0f32..1_000.0,
        1.0f32..2_000.0,
        1.0f32..10_000.0,
        0.0f32..0.2,
    )
        .prop_map(|(start, end, v, a, jt)| MotionRequest::s_curve(start, end, v, a, jt))
}

fn request() -> impl Strategy<Value = MotionRequest> {
    prop_oneof![trapezoid(), s_curve()]
}

proptest! {
    #[test]
    fn phase_distances_sum_to_distance(req in request()) {
        let t = Trajectory::generate(&req, &LIMITS).unwrap();
        let (accel, cruise, decel) = t.phase_distances();

        prop_assert!(accel >= 0.0 && cruise >= 0.0 && decel >= -1e-3);
        let sum = accel + cruise + decel;
        prop_assert!((sum - t.distance()).abs() <= 1e-3 * t.distance().max(1.0));
    }

    #[test]
    fn peak_never_exceeds_max_velocity(req in request()) {
        let t = Trajectory::generate(&req, &LIMITS).unwrap();
        prop_assert!(t.peak_velocity() <= req.max_velocity * (1.0 + 1e-5));
    }

    #[test]
    fn sample_after_end_is_exact(req in request(), extra in 0.0f32..10.0) {
        let t = Trajectory::generate(&req, &LIMITS).unwrap();
        let s = t.sample(t.total_time() + extra);

        prop_assert_eq!(s.position, req.end);
        prop_assert_eq!(s.velocity, 0.0);
        prop_assert_eq!(s.phase, MotionPhase::Complete);
    }

    #[test]
    fn symmetric_ramps_with_cruise(req in trapezoid()) {
        let t = Trajectory::generate(&req, &LIMITS).unwrap();
        let (accel, cruise, decel) = t.phase_durations();

        if cruise > 0.0 {
            prop_assert!((accel - decel).abs() <= 1e-4 * accel.max(1.0));
            prop_assert_eq!(t.peak_velocity(), req.max_velocity);
        }
    }

    #[test]
    fn enforced_target_within_hard_limits(requested in -1_000.0f32..1_000.0, soft in any::<bool>()) {
        let config = PositionSafetyConfig {
            enforce_soft_limits: soft,
            ..PositionSafetyConfig::default()
        };
        let monitor = PositionSafetyMonitor::new(0, config);
        let enforced = monitor.enforce_limits(requested);

        prop_assert!(config.within_hard(enforced.position));
        if soft {
            prop_assert!(config.within_soft(enforced.position));
        }
        if config.within_soft(requested) {
            prop_assert!(!enforced.limit_exceeded);
            prop_assert_eq!(enforced.position, requested);
        }
    }

    #[test]
    fn targets_inside_soft_limits_validate(position in -180.0f32..=180.0) {
        let monitor = PositionSafetyMonitor::new(0, PositionSafetyConfig::default());
        let v = monitor.validate_target(position);

        prop_assert!(v.soft_limit_ok);
        prop_assert!(v.hard_limit_ok);
        prop_assert!(v.distance_to_limit >= 0.0);
    }
}
