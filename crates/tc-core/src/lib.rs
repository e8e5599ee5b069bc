//! tc-core: Shared types for the TwoC compressor
//!
//! Parameter snapshot and layout, lock-free parameter/meter exchange,
//! meter display policy and the crate-wide error type. No DSP lives here.

mod error;
mod layout;
mod meter;
mod params;
mod store;

pub use error::*;
pub use layout::*;
pub use meter::*;
pub use params::*;
pub use store::*;

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Maximum number of channels the compressor links and processes
pub const MAX_CHANNELS: usize = 2;

/// Decibel value wrapper
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Decibels(pub f64);

impl Decibels {
    pub const ZERO: Self = Self(0.0);
    pub const NEG_INF: Self = Self(f64::NEG_INFINITY);

    #[inline]
    pub fn from_gain(gain: f64) -> Self {
        if gain <= 0.0 {
            Self::NEG_INF
        } else {
            Self(20.0 * gain.log10())
        }
    }

    /// Convert a linear gain, flooring silence and tiny values at `floor_db`
    #[inline]
    pub fn from_gain_floored(gain: f64, floor_db: f64) -> Self {
        if gain > 0.0 {
            Self((20.0 * gain.log10()).max(floor_db))
        } else {
            Self(floor_db)
        }
    }

    #[inline]
    pub fn to_gain(self) -> f64 {
        10.0_f64.powf(self.0 / 20.0)
    }

    #[inline]
    pub fn db(self) -> f64 {
        self.0
    }
}

impl Default for Decibels {
    fn default() -> Self {
        Self::ZERO
    }
}

/// dB to linear gain
#[inline]
pub fn db_to_gain(db: f64) -> f64 {
    Decibels(db).to_gain()
}

/// Linear gain to dB with a floor for silence
#[inline]
pub fn gain_to_db(gain: f64, floor_db: f64) -> f64 {
    Decibels::from_gain_floored(gain, floor_db).0
}
