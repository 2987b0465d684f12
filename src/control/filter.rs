//! Single-pole IIR low-pass filter.

/// `y[n] = y[n-1] + alpha · (x[n] − y[n-1])`.
///
/// `alpha = 1` passes the input through unchanged. The first sample seeds the
/// output so there is no start-up transient.
#[derive(Debug, Clone, Copy)]
pub struct LowPass {
    alpha: f32,
    output: f32,
    primed: bool,
}

impl LowPass {
    /// Create a filter with coefficient `alpha` in (0, 1].
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(f32::MIN_POSITIVE, 1.0),
            output: 0.0,
            primed: false,
        }
    }

    /// Feed one sample and return the filtered value.
    pub fn update(&mut self, input: f32) -> f32 {
        if self.primed {
            self.output += self.alpha * (input - self.output);
        } else {
            self.output = input;
            self.primed = true;
        }
        self.output
    }

    /// Force the output to a value.
    pub fn seed(&mut self, value: f32) {
        self.output = value;
        self.primed = true;
    }

    /// Last output.
    #[inline]
    pub fn output(&self) -> f32 {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_seeds() {
        let mut f = LowPass::new(0.1);
        assert_eq!(f.update(50.0), 50.0);
        assert!((f.update(60.0) - 51.0).abs() < 1e-5);
    }

    #[test]
    fn unity_alpha_passes_through() {
        let mut f = LowPass::new(1.0);
        f.update(1.0);
        assert_eq!(f.update(-7.0), -7.0);
    }

    #[test]
    fn converges() {
        let mut f = LowPass::new(0.3);
        f.seed(0.0);
        for _ in 0..100 {
            f.update(10.0);
        }
        assert!((f.output() - 10.0).abs() < 1e-3);
    }
}
