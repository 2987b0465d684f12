//! Trajectory generation.
//!
//! Provides asymmetric trapezoidal and seven-phase S-curve trajectories.
//! A [`Trajectory`] is computed once per move and then sampled by elapsed
//! time; sampling is pure and may be repeated or restarted freely.

use libm::{fabsf, sqrtf};

use super::ramp::Ramp;
use crate::error::{MotionError, Result};

/// Shape of the velocity profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProfileKind {
    /// Constant acceleration, optional cruise, constant deceleration.
    #[default]
    Trapezoidal,
    /// Jerk-limited acceleration and deceleration.
    SCurve,
}

/// Direction of motor motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Increasing angle.
    Positive,
    /// Decreasing angle.
    Negative,
}

impl Direction {
    /// Direction of a signed displacement. Zero counts as positive.
    #[inline]
    pub fn of(displacement: f32) -> Self {
        if displacement >= 0.0 {
            Direction::Positive
        } else {
            Direction::Negative
        }
    }

    /// Get the sign multiplier.
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            Direction::Positive => 1.0,
            Direction::Negative => -1.0,
        }
    }
}

/// Current phase of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotionPhase {
    /// Not started.
    #[default]
    Idle,
    /// Accelerating from rest toward cruise velocity.
    Accelerating,
    /// Moving at constant cruise velocity.
    ConstantVelocity,
    /// Decelerating to rest.
    Decelerating,
    /// Motion complete.
    Complete,
}

/// Motor maxima that every request is checked against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionLimits {
    /// Maximum velocity (units/s).
    pub max_velocity: f32,
    /// Maximum acceleration and deceleration (units/s²).
    pub max_acceleration: f32,
}

impl MotionLimits {
    /// Create motion limits.
    pub const fn new(max_velocity: f32, max_acceleration: f32) -> Self {
        Self {
            max_velocity,
            max_acceleration,
        }
    }

    /// Limits that accept any finite request.
    pub const fn unbounded() -> Self {
        Self::new(f32::MAX, f32::MAX)
    }
}

/// A requested move.
///
/// Units are whatever the caller uses consistently (degrees in this crate,
/// steps in some tests).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionRequest {
    /// Profile shape.
    pub kind: ProfileKind,
    /// Start position.
    pub start: f32,
    /// End position.
    pub end: f32,
    /// Cruise velocity (magnitude).
    pub max_velocity: f32,
    /// Acceleration (magnitude).
    pub acceleration: f32,
    /// Deceleration (magnitude). Defaults to `acceleration`.
    pub deceleration: Option<f32>,
    /// S-curve jerk time in seconds. Defaults to a quarter of the time to
    /// reach cruise velocity.
    pub jerk_time: Option<f32>,
}

impl MotionRequest {
    /// Symmetric trapezoidal move.
    pub fn trapezoidal(start: f32, end: f32, max_velocity: f32, acceleration: f32) -> Self {
        Self {
            kind: ProfileKind::Trapezoidal,
            start,
            end,
            max_velocity,
            acceleration,
            deceleration: None,
            jerk_time: None,
        }
    }

    /// Symmetric S-curve move.
    pub fn s_curve(start: f32, end: f32, max_velocity: f32, acceleration: f32, jerk_time: f32) -> Self {
        Self {
            kind: ProfileKind::SCurve,
            jerk_time: Some(jerk_time),
            ..Self::trapezoidal(start, end, max_velocity, acceleration)
        }
    }

    /// Use a different deceleration rate.
    pub fn with_deceleration(mut self, deceleration: f32) -> Self {
        self.deceleration = Some(deceleration);
        self
    }

    /// Distance of the move (always non-negative).
    #[inline]
    pub fn distance(&self) -> f32 {
        fabsf(self.end - self.start)
    }
}

/// Target state at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Target position.
    pub position: f32,
    /// Target velocity (signed).
    pub velocity: f32,
    /// Target acceleration (signed).
    pub acceleration: f32,
    /// Phase at this instant.
    pub phase: MotionPhase,
}

const SCURVE_BISECTION_STEPS: u32 = 40;
const DEFAULT_JERK_FRACTION: f32 = 0.25;

/// A computed trajectory.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    kind: ProfileKind,
    start: f32,
    end: f32,
    direction: Direction,
    distance: f32,
    max_velocity: f32,
    peak_velocity: f32,
    acceleration: f32,
    deceleration: f32,
    accel: Ramp,
    decel: Ramp,
    cruise_time: f32,
    cruise_distance: f32,
    total_time: f32,
    phase: MotionPhase,
}

impl Trajectory {
    /// Compute a trajectory for `request`.
    ///
    /// Fails without side effects if the request exceeds `limits` or has
    /// non-positive rates.
    pub fn generate(request: &MotionRequest, limits: &MotionLimits) -> Result<Self> {
        let deceleration = request.deceleration.unwrap_or(request.acceleration);
        validate_request(request, deceleration, limits)?;

        let distance = request.distance();
        let mut trajectory = Self {
            kind: request.kind,
            start: request.start,
            end: request.end,
            direction: Direction::of(request.end - request.start),
            distance,
            max_velocity: request.max_velocity,
            peak_velocity: 0.0,
            acceleration: request.acceleration,
            deceleration,
            accel: Ramp::zero(),
            decel: Ramp::zero(),
            cruise_time: 0.0,
            cruise_distance: 0.0,
            total_time: 0.0,
            phase: MotionPhase::Idle,
        };

        if distance <= 0.0 {
            trajectory.phase = MotionPhase::Complete;
            return Ok(trajectory);
        }

        let jerk_time = match request.kind {
            ProfileKind::Trapezoidal => 0.0,
            ProfileKind::SCurve => request
                .jerk_time
                .unwrap_or(DEFAULT_JERK_FRACTION * request.max_velocity / request.acceleration),
        };

        let v_max = request.max_velocity;
        let a = request.acceleration;
        let d = deceleration;

        let full_accel = Ramp::new(v_max, a, jerk_time);
        let full_decel = Ramp::new(v_max, d, jerk_time);

        let mut triangular = false;
        let (peak, accel, decel) = if full_accel.distance() + full_decel.distance() <= distance {
            (v_max, full_accel, full_decel)
        } else if jerk_time <= 0.0 {
            // Triangular: both ramps meet at the peak.
            triangular = true;
            let peak = sqrtf(2.0 * distance * a * d / (a + d)).min(v_max);
            (peak, Ramp::new(peak, a, 0.0), Ramp::new(peak, d, 0.0))
        } else {
            // Ramp distance grows monotonically with the peak velocity; keep
            // the low bracket so the residual goes to a short cruise.
            let mut low = 0.0_f32;
            let mut high = v_max;
            for _ in 0..SCURVE_BISECTION_STEPS {
                let mid = 0.5 * (low + high);
                let span =
                    Ramp::new(mid, a, jerk_time).distance() + Ramp::new(mid, d, jerk_time).distance();
                if span <= distance {
                    low = mid;
                } else {
                    high = mid;
                }
            }
            (low, Ramp::new(low, a, jerk_time), Ramp::new(low, d, jerk_time))
        };

        trajectory.peak_velocity = peak;
        trajectory.accel = accel;
        trajectory.decel = decel;
        let residual = distance - accel.distance() - decel.distance();
        if !triangular && residual > 0.0 && peak > 0.0 {
            trajectory.cruise_distance = residual;
            trajectory.cruise_time = residual / peak;
        }
        trajectory.total_time = accel.duration() + trajectory.cruise_time + decel.duration();

        debug!(
            "trajectory: distance={=f32} peak={=f32} total={=f32}s",
            distance,
            peak,
            trajectory.total_time
        );

        Ok(trajectory)
    }

    /// Trajectory that brings a moving axis to rest at `deceleration`.
    ///
    /// Used for controlled stops; there is no acceleration or cruise phase.
    pub fn decelerate_from(
        kind: ProfileKind,
        position: f32,
        velocity: f32,
        deceleration: f32,
        jerk_time: Option<f32>,
    ) -> Result<Self> {
        if !position.is_finite() || !velocity.is_finite() {
            return Err(MotionError::NonFinitePosition.into());
        }
        if deceleration <= 0.0 {
            return Err(MotionError::NonPositiveAcceleration(deceleration).into());
        }

        let speed = fabsf(velocity);
        let jerk_time = match kind {
            ProfileKind::Trapezoidal => 0.0,
            ProfileKind::SCurve => jerk_time.unwrap_or(DEFAULT_JERK_FRACTION * speed / deceleration),
        };
        let decel = Ramp::new(speed, deceleration, jerk_time);
        let direction = Direction::of(velocity);
        let end = position + direction.sign() * decel.distance();

        Ok(Self {
            kind,
            start: position,
            end,
            direction,
            distance: decel.distance(),
            max_velocity: speed,
            peak_velocity: speed,
            acceleration: deceleration,
            deceleration,
            accel: Ramp::zero(),
            decel,
            cruise_time: 0.0,
            cruise_distance: 0.0,
            total_time: decel.duration(),
            phase: if decel.duration() > 0.0 {
                MotionPhase::Decelerating
            } else {
                MotionPhase::Complete
            },
        })
    }

    /// Sample the trajectory `t` seconds after its start.
    ///
    /// For `t >= total_time` this returns exactly the end position with zero
    /// velocity and [`MotionPhase::Complete`].
    pub fn sample(&self, t: f32) -> Sample {
        if t >= self.total_time || self.distance <= 0.0 {
            return Sample {
                position: self.end,
                velocity: 0.0,
                acceleration: 0.0,
                phase: MotionPhase::Complete,
            };
        }

        let t = t.max(0.0);
        let sign = self.direction.sign();
        let t_accel = self.accel.duration();
        let t_cruise_end = t_accel + self.cruise_time;

        let (offset, velocity, acceleration, phase) = if t < t_accel {
            let p = self.accel.at(t);
            (p.distance, p.velocity, p.acceleration, MotionPhase::Accelerating)
        } else if t < t_cruise_end {
            let offset = self.accel.distance() + self.peak_velocity * (t - t_accel);
            (offset, self.peak_velocity, 0.0, MotionPhase::ConstantVelocity)
        } else {
            let remaining = self.total_time - t;
            let p = self.decel.at(remaining);
            (
                self.distance - p.distance,
                p.velocity,
                -p.acceleration,
                MotionPhase::Decelerating,
            )
        };

        Sample {
            position: self.start + sign * offset,
            velocity: sign * velocity,
            acceleration: sign * acceleration,
            phase,
        }
    }

    /// Sample and record the phase reached at `t`.
    pub fn advance(&mut self, t: f32) -> Sample {
        let sample = self.sample(t);
        self.phase = sample.phase;
        sample
    }

    /// Fraction of the total time elapsed at `t`, in `[0, 1]`.
    pub fn progress(&self, t: f32) -> f32 {
        if self.total_time <= 0.0 {
            1.0
        } else {
            (t / self.total_time).clamp(0.0, 1.0)
        }
    }

    /// Distances of the acceleration, cruise and deceleration phases.
    ///
    /// Their sum is the total distance of the move.
    pub fn phase_distances(&self) -> (f32, f32, f32) {
        let accel = self.accel.distance().min(self.distance);
        let cruise = self.cruise_distance.min(self.distance - accel);
        (accel, cruise, self.distance - accel - cruise)
    }

    /// Durations of the acceleration, cruise and deceleration phases.
    pub fn phase_durations(&self) -> (f32, f32, f32) {
        (self.accel.duration(), self.cruise_time, self.decel.duration())
    }

    /// Profile shape.
    #[inline]
    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    /// Start position.
    #[inline]
    pub fn start(&self) -> f32 {
        self.start
    }

    /// End position.
    #[inline]
    pub fn end(&self) -> f32 {
        self.end
    }

    /// Direction of travel.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Distance of the move.
    #[inline]
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Requested cruise velocity.
    #[inline]
    pub fn max_velocity(&self) -> f32 {
        self.max_velocity
    }

    /// Velocity actually reached. Never above [`Self::max_velocity`].
    #[inline]
    pub fn peak_velocity(&self) -> f32 {
        self.peak_velocity
    }

    /// Acceleration rate.
    #[inline]
    pub fn acceleration(&self) -> f32 {
        self.acceleration
    }

    /// Deceleration rate.
    #[inline]
    pub fn deceleration(&self) -> f32 {
        self.deceleration
    }

    /// Effective jerk time of the acceleration segment (zero for trapezoids).
    #[inline]
    pub fn jerk_time(&self) -> f32 {
        self.accel.jerk_time()
    }

    /// Total duration in seconds.
    #[inline]
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Phase recorded by the last [`Self::advance`].
    #[inline]
    pub fn phase(&self) -> MotionPhase {
        self.phase
    }

    /// Whether the move has zero length.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.distance <= 0.0
    }
}

fn validate_request(request: &MotionRequest, deceleration: f32, limits: &MotionLimits) -> Result<()> {
    if !request.start.is_finite() || !request.end.is_finite() {
        return Err(MotionError::NonFinitePosition.into());
    }
    if !(request.max_velocity > 0.0) {
        return Err(MotionError::NonPositiveVelocity(request.max_velocity).into());
    }
    if request.max_velocity > limits.max_velocity {
        return Err(MotionError::VelocityExceedsLimit {
            requested: request.max_velocity,
            max: limits.max_velocity,
        }
        .into());
    }
    for rate in [request.acceleration, deceleration] {
        if !(rate > 0.0) {
            return Err(MotionError::NonPositiveAcceleration(rate).into());
        }
        if rate > limits.max_acceleration {
            return Err(MotionError::AccelerationExceedsLimit {
                requested: rate,
                max: limits.max_acceleration,
            }
            .into());
        }
    }
    if let Some(jerk_time) = request.jerk_time {
        if !jerk_time.is_finite() || jerk_time < 0.0 {
            return Err(MotionError::InvalidJerkTime(jerk_time).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const UNBOUNDED: MotionLimits = MotionLimits::unbounded();

    #[test]
    fn test_trapezoid_with_cruise() {
        let request = MotionRequest::trapezoidal(0.0, 10_000.0, 1_000.0, 500.0);
        let traj = Trajectory::generate(&request, &UNBOUNDED).unwrap();

        let (t_a, t_c, t_d) = traj.phase_durations();
        assert!((t_a - 2.0).abs() < 1e-4);
        assert!((t_c - 8.0).abs() < 1e-3);
        assert!((t_d - 2.0).abs() < 1e-4);
        assert!((traj.total_time() - 12.0).abs() < 1e-3);

        let (d_a, d_c, d_d) = traj.phase_distances();
        assert!((d_a - 1_000.0).abs() < 1e-2);
        assert!((d_a + d_c + d_d - 10_000.0).abs() < 1e-2);
        assert_eq!(traj.peak_velocity(), 1_000.0);
    }

    #[test]
    fn test_triangular_profile() {
        let request = MotionRequest::trapezoidal(0.0, 100.0, 1_000.0, 100.0);
        let traj = Trajectory::generate(&request, &UNBOUNDED).unwrap();

        let (_, cruise, _) = traj.phase_durations();
        assert_eq!(cruise, 0.0);
        assert!((traj.peak_velocity() - sqrtf(100.0 * 100.0)).abs() < 1e-3);
    }

    #[test]
    fn test_asymmetric_deceleration() {
        let request = MotionRequest::trapezoidal(0.0, 1_000.0, 100.0, 200.0).with_deceleration(50.0);
        let traj = Trajectory::generate(&request, &UNBOUNDED).unwrap();

        let (t_a, _, t_d) = traj.phase_durations();
        assert!((t_a - 0.5).abs() < 1e-4);
        assert!((t_d - 2.0).abs() < 1e-4);
        assert!(traj.sample(traj.total_time() - 1.0).phase == MotionPhase::Decelerating);
    }

    #[test]
    fn test_negative_direction() {
        let request = MotionRequest::trapezoidal(90.0, -90.0, 90.0, 180.0);
        let traj = Trajectory::generate(&request, &UNBOUNDED).unwrap();

        assert_eq!(traj.direction(), Direction::Negative);
        let mid = traj.sample(traj.total_time() / 2.0);
        assert!(mid.velocity < 0.0);
        assert!(mid.position < 90.0 && mid.position > -90.0);
    }

    #[test]
    fn test_sample_after_completion_is_exact() {
        let request = MotionRequest::s_curve(-12.5, 47.25, 30.0, 60.0, 0.1);
        let traj = Trajectory::generate(&request, &UNBOUNDED).unwrap();

        for t in [traj.total_time(), traj.total_time() + 0.001, 1e6] {
            let s = traj.sample(t);
            assert_eq!(s.position, 47.25);
            assert_eq!(s.velocity, 0.0);
            assert_eq!(s.phase, MotionPhase::Complete);
        }
    }

    #[test]
    fn test_s_curve_seven_phases() {
        let request = MotionRequest::s_curve(0.0, 100.0, 20.0, 40.0, 0.1);
        let traj = Trajectory::generate(&request, &UNBOUNDED).unwrap();

        // 0.5 s to cruise velocity plus 0.1 s jerk time on each ramp
        let (t_a, t_c, t_d) = traj.phase_durations();
        assert!((t_a - 0.6).abs() < 1e-4);
        assert!((t_d - 0.6).abs() < 1e-4);
        assert!(t_c > 0.0);

        // jerk-in: acceleration still rising
        let early = traj.sample(0.05);
        assert!(early.acceleration > 0.0 && early.acceleration < 40.0);
        // linear acceleration
        assert!((traj.sample(0.3).acceleration - 40.0).abs() < 1e-3);
        // jerk-out to cruise
        let late = traj.sample(0.55);
        assert!(late.acceleration > 0.0 && late.acceleration < 40.0);
        // cruise
        assert_eq!(traj.sample(t_a + t_c / 2.0).velocity, 20.0);
        // deceleration tail is jerk limited too
        let tail = traj.sample(traj.total_time() - 0.05);
        assert!(tail.acceleration < 0.0 && tail.acceleration > -40.0);
        assert!(tail.velocity > 0.0);
    }

    #[test]
    fn test_short_s_curve_never_exceeds_distance() {
        let request = MotionRequest::s_curve(0.0, 2.0, 100.0, 100.0, 0.2);
        let traj = Trajectory::generate(&request, &UNBOUNDED).unwrap();

        assert!(traj.peak_velocity() < 100.0);
        let (d_a, d_c, d_d) = traj.phase_distances();
        assert!((d_a + d_c + d_d - 2.0).abs() < 1e-4);

        let mut last = 0.0;
        let steps = 200;
        for i in 0..=steps {
            let s = traj.sample(traj.total_time() * i as f32 / steps as f32);
            assert!(s.position >= last - 1e-4);
            assert!(s.position <= 2.0 + 1e-4);
            last = s.position;
        }
    }

    #[test]
    fn test_zero_length_move() {
        let request = MotionRequest::trapezoidal(5.0, 5.0, 10.0, 10.0);
        let traj = Trajectory::generate(&request, &UNBOUNDED).unwrap();

        assert!(traj.is_zero());
        assert_eq!(traj.total_time(), 0.0);
        assert_eq!(traj.phase(), MotionPhase::Complete);
        assert_eq!(traj.sample(0.0).position, 5.0);
    }

    #[test]
    fn test_limits_enforced() {
        let limits = MotionLimits::new(100.0, 200.0);

        let fast = MotionRequest::trapezoidal(0.0, 10.0, 150.0, 100.0);
        assert!(matches!(
            Trajectory::generate(&fast, &limits),
            Err(Error::Motion(MotionError::VelocityExceedsLimit { .. }))
        ));

        let hard_decel = MotionRequest::trapezoidal(0.0, 10.0, 50.0, 100.0).with_deceleration(300.0);
        assert!(matches!(
            Trajectory::generate(&hard_decel, &limits),
            Err(Error::Motion(MotionError::AccelerationExceedsLimit { .. }))
        ));

        let stalled = MotionRequest::trapezoidal(0.0, 10.0, 0.0, 100.0);
        assert!(matches!(
            Trajectory::generate(&stalled, &limits),
            Err(Error::Motion(MotionError::NonPositiveVelocity(_)))
        ));
    }

    #[test]
    fn test_decelerate_from() {
        let traj = Trajectory::decelerate_from(ProfileKind::Trapezoidal, 10.0, -20.0, 40.0, None).unwrap();

        assert!((traj.total_time() - 0.5).abs() < 1e-5);
        assert!((traj.end() - 5.0).abs() < 1e-4);
        let start = traj.sample(0.0);
        assert!((start.velocity + 20.0).abs() < 1e-3);
        assert_eq!(start.phase, MotionPhase::Decelerating);
    }

    #[test]
    fn test_advance_tracks_phase() {
        let request = MotionRequest::trapezoidal(0.0, 100.0, 10.0, 10.0);
        let mut traj = Trajectory::generate(&request, &UNBOUNDED).unwrap();

        assert_eq!(traj.phase(), MotionPhase::Idle);
        traj.advance(0.5);
        assert_eq!(traj.phase(), MotionPhase::Accelerating);
        traj.advance(5.0);
        assert_eq!(traj.phase(), MotionPhase::ConstantVelocity);
        traj.advance(100.0);
        assert_eq!(traj.phase(), MotionPhase::Complete);
    }
}
