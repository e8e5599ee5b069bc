//! Static gain computer
//!
//! Maps a detector level in dB to a gain reduction in dB using
//! threshold, ratio and a quadratic soft knee. Pure and stateless.

use tc_core::Parameters;

/// Threshold / ratio / knee transfer curve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainComputer {
    threshold_db: f64,
    ratio: f64,
    knee_db: f64,
}

impl GainComputer {
    pub fn new(threshold_db: f64, ratio: f64, knee_db: f64) -> Self {
        Self {
            threshold_db,
            ratio: ratio.max(1.0),
            knee_db: knee_db.max(0.0),
        }
    }

    pub fn from_params(params: &Parameters) -> Self {
        Self::new(params.threshold_db, params.ratio, params.knee_db)
    }

    pub fn threshold_db(&self) -> f64 {
        self.threshold_db
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn knee_db(&self) -> f64 {
        self.knee_db
    }

    /// Knee boundaries (lower, upper) in dB
    pub fn knee_bounds(&self) -> (f64, f64) {
        let half_knee = 0.5 * self.knee_db;
        (self.threshold_db - half_knee, self.threshold_db + half_knee)
    }

    /// Static output level for an input level
    #[inline]
    pub fn output_db(&self, input_db: f64) -> f64 {
        let compressed = self.threshold_db + (input_db - self.threshold_db) / self.ratio;

        if self.knee_db <= 0.0 {
            return if input_db > self.threshold_db {
                compressed
            } else {
                input_db
            };
        }

        let (lower, upper) = self.knee_bounds();
        if input_db < lower {
            input_db
        } else if input_db > upper {
            compressed
        } else {
            // Quadratic knee, C1-continuous with both neighbours
            let x = input_db - lower;
            let slope_delta = 1.0 / self.ratio - 1.0;
            input_db + slope_delta * (x * x) / (2.0 * self.knee_db)
        }
    }

    /// Gain reduction in dB, never negative
    #[inline]
    pub fn reduction_db(&self, input_db: f64) -> f64 {
        (input_db - self.output_db(input_db)).max(0.0)
    }
}

impl Default for GainComputer {
    fn default() -> Self {
        Self::new(-18.0, 4.0, 6.0)
    }
}
