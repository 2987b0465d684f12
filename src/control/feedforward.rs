//! Feedforward from the target trajectory.
//!
//! Velocity FF (`kv × v_target`), acceleration FF (`ka × dv_target/dt`),
//! static friction compensation (`friction × sign(v_target)`).
//! Zero gains disable each component.

/// Feedforward gains for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedforwardGains {
    /// Velocity feedforward gain.
    pub kv: f32,
    /// Acceleration feedforward gain (s).
    pub ka: f32,
    /// Static friction offset (deg/s), applied in the direction of motion.
    pub friction: f32,
}

/// Compute the feedforward contribution in deg/s.
#[inline]
pub fn feedforward_compute(gains: &FeedforwardGains, target_velocity: f32, target_acceleration: f32) -> f32 {
    let mut output = 0.0;

    if gains.kv != 0.0 {
        output += gains.kv * target_velocity;
    }

    if gains.ka != 0.0 {
        output += gains.ka * target_acceleration;
    }

    if gains.friction != 0.0 && target_velocity != 0.0 {
        output += if target_velocity > 0.0 {
            gains.friction
        } else {
            -gains.friction
        };
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_only() {
        let g = FeedforwardGains {
            kv: 1.0,
            ka: 0.0,
            friction: 0.0,
        };
        assert_eq!(feedforward_compute(&g, 42.0, 1000.0), 42.0);
    }

    #[test]
    fn friction_follows_direction() {
        let g = FeedforwardGains {
            kv: 0.0,
            ka: 0.0,
            friction: 2.0,
        };
        assert_eq!(feedforward_compute(&g, 10.0, 0.0), 2.0);
        assert_eq!(feedforward_compute(&g, -10.0, 0.0), -2.0);
        assert_eq!(feedforward_compute(&g, 0.0, 0.0), 0.0);
    }

    #[test]
    fn all_terms_sum() {
        let g = FeedforwardGains {
            kv: 0.5,
            ka: 0.01,
            friction: 1.0,
        };
        // 0.5*20 + 0.01*100 + 1
        assert!((feedforward_compute(&g, 20.0, 100.0) - 12.0).abs() < 1e-5);
    }
}
