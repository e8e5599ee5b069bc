//! Linear gain smoothing ahead of the VCA multiply

use crate::{Processor, coefficient_from_ms};

/// Smoothing window for the applied gain
pub const GAIN_SMOOTHING_MS: f64 = 2.0;

/// One-pole smoother over linear gain
///
/// Removes the residual stepping left by per-sample recomputation of the
/// reduction target. Starts (and resets) at unity.
#[derive(Debug, Clone)]
pub struct GainSmoother {
    gain: f64,
    coeff: f64,
}

impl GainSmoother {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            gain: 1.0,
            coeff: coefficient_from_ms(GAIN_SMOOTHING_MS, sample_rate),
        }
    }

    pub fn set_coefficient(&mut self, coeff: f64) {
        self.coeff = coeff;
    }

    /// Smooth toward the linear gain for `reduction_db` of reduction
    #[inline]
    pub fn process(&mut self, reduction_db: f64) -> f64 {
        let target = 10.0_f64.powf(-reduction_db / 20.0);
        self.gain = self.coeff * self.gain + (1.0 - self.coeff) * target;
        self.gain
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }
}

impl Processor for GainSmoother {
    fn reset(&mut self) {
        self.gain = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_starts_at_unity() {
        let mut smoother = GainSmoother::new(48000.0);
        assert_eq!(smoother.gain(), 1.0);
        assert_eq!(smoother.process(0.0), 1.0);
    }

    #[test]
    fn test_converges_to_linear_gain() {
        let mut smoother = GainSmoother::new(48000.0);
        let first = smoother.process(6.0);
        assert!(first < 1.0 && first > 0.99, "no jump on the first sample");

        for _ in 0..4800 {
            smoother.process(6.0);
        }
        assert_abs_diff_eq!(smoother.gain(), 0.501_187_233_627_272_2, epsilon = 1e-9);

        smoother.reset();
        assert_eq!(smoother.gain(), 1.0);
    }
}
