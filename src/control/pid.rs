//! PID term with integral clamp and derivative on the filtered error.
//!
//! Zero `ki` disables the integral; zero `kd` disables the derivative.

use libm::fabsf;

/// PID gains for one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    /// Proportional gain (1/s).
    pub kp: f32,
    /// Integral gain (1/s²).
    pub ki: f32,
    /// Derivative gain (dimensionless).
    pub kd: f32,
    /// Bound on the integral contribution (deg/s).
    pub integral_limit: f32,
}

/// Internal state of the PID term.
///
/// Must be reset whenever the loop is (re-)closed so a stale integral or a
/// stale previous error does not kick the output.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidState {
    /// Integral contribution, already multiplied by `ki`.
    integral: f32,
    /// Previous error (for derivative).
    prev_error: f32,
    /// `prev_error` holds a real sample.
    primed: bool,
}

impl PidState {
    /// Reset all internal state to zero.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Current integral contribution.
    #[inline]
    pub fn integral(&self) -> f32 {
        self.integral
    }

    /// Error seen on the previous cycle.
    #[inline]
    pub fn prev_error(&self) -> f32 {
        self.prev_error
    }
}

/// Compute one PID cycle.
///
/// `error` is the filtered position error (target − filtered position) and
/// `dt` the cycle period in seconds. The output is unsaturated; clamping is
/// done by the caller after feedforward is added.
pub fn pid_compute(state: &mut PidState, gains: &PidGains, error: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return 0.0;
    }

    let p_term = gains.kp * error;

    let i_term = if gains.ki != 0.0 {
        let limit = fabsf(gains.integral_limit);
        state.integral = (state.integral + gains.ki * error * dt).clamp(-limit, limit);
        state.integral
    } else {
        state.integral = 0.0;
        0.0
    };

    // No derivative on the first cycle after a reset.
    let d_term = if gains.kd != 0.0 && state.primed {
        gains.kd * (error - state.prev_error) / dt
    } else {
        0.0
    };

    state.prev_error = error;
    state.primed = true;

    p_term + i_term + d_term
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.001;

    fn gains(kp: f32, ki: f32, kd: f32) -> PidGains {
        PidGains {
            kp,
            ki,
            kd,
            integral_limit: 5.0,
        }
    }

    #[test]
    fn pure_proportional() {
        let mut s = PidState::default();
        let out = pid_compute(&mut s, &gains(10.0, 0.0, 0.0), 1.5, DT);
        assert!((out - 15.0).abs() < 1e-6);
    }

    #[test]
    fn integral_accumulates_and_clamps() {
        let mut s = PidState::default();
        let g = gains(0.0, 100.0, 0.0);
        for _ in 0..10 {
            pid_compute(&mut s, &g, 1.0, DT);
        }
        // 100 * 1.0 * 0.001 * 10
        assert!((s.integral() - 1.0).abs() < 1e-4);

        for _ in 0..1_000 {
            pid_compute(&mut s, &g, 1.0, DT);
        }
        assert_eq!(s.integral(), 5.0);

        for _ in 0..2_000 {
            pid_compute(&mut s, &g, -1.0, DT);
        }
        assert_eq!(s.integral(), -5.0);
    }

    #[test]
    fn derivative_skips_first_cycle() {
        let mut s = PidState::default();
        let g = gains(0.0, 0.0, 0.01);

        assert_eq!(pid_compute(&mut s, &g, 3.0, DT), 0.0);
        // (3.5 - 3.0) / 0.001 * 0.01
        let out = pid_compute(&mut s, &g, 3.5, DT);
        assert!((out - 5.0).abs() < 1e-3);
    }

    #[test]
    fn reset_clears_state() {
        let mut s = PidState::default();
        pid_compute(&mut s, &gains(1.0, 10.0, 0.0), 2.0, DT);
        s.reset();
        assert_eq!(s.integral(), 0.0);
        assert_eq!(s.prev_error(), 0.0);
    }

    #[test]
    fn zero_dt_produces_zero() {
        let mut s = PidState::default();
        assert_eq!(pid_compute(&mut s, &gains(10.0, 1.0, 1.0), 1.0, 0.0), 0.0);
    }
}
