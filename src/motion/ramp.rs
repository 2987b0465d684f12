//! Velocity ramps from rest to a target velocity.
//!
//! A ramp is the building block of both profile shapes. With a zero jerk time
//! it is a constant-acceleration ramp; otherwise acceleration rises linearly
//! for `jerk_time`, holds, then falls linearly back to zero, which gives the
//! jerk-in / linear / jerk-out sub-phases of an S-curve segment.

/// Kinematic state inside a ramp, measured from the ramp start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RampPoint {
    pub distance: f32,
    pub velocity: f32,
    pub acceleration: f32,
}

/// A rest-to-`velocity` ramp limited by `acceleration` and `jerk_time`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Ramp {
    velocity: f32,
    acceleration: f32,
    jerk_time: f32,
    jerk: f32,
    duration: f32,
    distance: f32,
}

impl Ramp {
    /// Build a ramp. `jerk_time` is clamped so the linear sub-phase never
    /// has negative length.
    pub fn new(velocity: f32, acceleration: f32, jerk_time: f32) -> Self {
        if velocity <= 0.0 || acceleration <= 0.0 {
            return Self::zero();
        }

        let t_v = velocity / acceleration;
        let jerk_time = jerk_time.clamp(0.0, t_v);
        let duration = t_v + jerk_time;
        let jerk = if jerk_time > 0.0 {
            acceleration / jerk_time
        } else {
            0.0
        };

        Self {
            velocity,
            acceleration,
            jerk_time,
            jerk,
            duration,
            // Velocity is point-symmetric about the ramp midpoint.
            distance: 0.5 * velocity * duration,
        }
    }

    /// An empty ramp.
    pub const fn zero() -> Self {
        Self {
            velocity: 0.0,
            acceleration: 0.0,
            jerk_time: 0.0,
            jerk: 0.0,
            duration: 0.0,
            distance: 0.0,
        }
    }

    #[inline]
    pub fn duration(&self) -> f32 {
        self.duration
    }

    #[inline]
    pub fn distance(&self) -> f32 {
        self.distance
    }

    #[inline]
    pub fn jerk_time(&self) -> f32 {
        self.jerk_time
    }

    /// State `t` seconds after the ramp start, clamped to `[0, duration]`.
    pub fn at(&self, t: f32) -> RampPoint {
        if self.duration <= 0.0 {
            return RampPoint {
                distance: 0.0,
                velocity: 0.0,
                acceleration: 0.0,
            };
        }
        let t = t.clamp(0.0, self.duration);
        let a = self.acceleration;

        if self.jerk_time <= 0.0 {
            return RampPoint {
                distance: 0.5 * a * t * t,
                velocity: a * t,
                acceleration: a,
            };
        }

        let j = self.jerk;
        let tj = self.jerk_time;
        let linear_end = self.duration - tj;

        if t < tj {
            RampPoint {
                distance: j * t * t * t / 6.0,
                velocity: 0.5 * j * t * t,
                acceleration: j * t,
            }
        } else if t < linear_end {
            let u = t - tj;
            let v1 = 0.5 * j * tj * tj;
            let s1 = j * tj * tj * tj / 6.0;
            RampPoint {
                distance: s1 + v1 * u + 0.5 * a * u * u,
                velocity: v1 + a * u,
                acceleration: a,
            }
        } else {
            let w = self.duration - t;
            RampPoint {
                distance: self.distance - (self.velocity * w - j * w * w * w / 6.0),
                velocity: self.velocity - 0.5 * j * w * w,
                acceleration: j * w,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_acceleration_ramp() {
        let ramp = Ramp::new(1000.0, 500.0, 0.0);
        assert!((ramp.duration() - 2.0).abs() < 1e-6);
        assert!((ramp.distance() - 1000.0).abs() < 1e-3);

        let mid = ramp.at(1.0);
        assert!((mid.velocity - 500.0).abs() < 1e-3);
        assert!((mid.distance - 250.0).abs() < 1e-3);
    }

    #[test]
    fn test_jerk_limited_ramp_is_continuous() {
        let ramp = Ramp::new(100.0, 200.0, 0.1);
        // t_v = 0.5, duration = 0.6
        assert!((ramp.duration() - 0.6).abs() < 1e-6);

        let eps = 1e-4;
        for &boundary in &[0.1_f32, 0.5] {
            let before = ramp.at(boundary - eps);
            let after = ramp.at(boundary + eps);
            assert!((before.velocity - after.velocity).abs() < 0.1);
            // Distance moves by about v * 2 * eps across the window
            let travel = after.velocity.abs() * 2.0 * eps;
            assert!((after.distance - before.distance - travel).abs() < 1e-3);
        }

        let end = ramp.at(ramp.duration());
        assert!((end.velocity - 100.0).abs() < 1e-3);
        assert!((end.distance - ramp.distance()).abs() < 1e-3);
        assert!(end.acceleration.abs() < 1e-3);
    }

    #[test]
    fn test_jerk_time_clamped() {
        // v/a = 0.1, so a jerk time of 1.0 collapses to 0.1
        let ramp = Ramp::new(10.0, 100.0, 1.0);
        assert!((ramp.jerk_time() - 0.1).abs() < 1e-6);
        assert!((ramp.duration() - 0.2).abs() < 1e-6);
        assert!((ramp.at(0.2).velocity - 10.0).abs() < 1e-3);
    }
}
