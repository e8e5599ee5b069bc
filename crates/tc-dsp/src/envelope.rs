//! Program-dependent gain-reduction envelope
//!
//! Reduction rising toward a deeper target uses the attack coefficient.
//! Releasing blends between a slow and a fast release depending on how
//! deep the current reduction is: shallow, steady reduction recovers
//! slowly, deep transient reduction recovers quickly.

use crate::detector::{HPF_COEFF_SMOOTHING_MS, RMS_WINDOW_MS};
use crate::smoothing::GAIN_SMOOTHING_MS;
use crate::{Processor, coefficient_from_ms, flush_denormal};

/// Reduction depth where the release starts leaving the slow coefficient
pub const SMALL_GR_DB: f64 = 3.0;

/// Reduction depth where the release is fully fast
pub const LARGE_GR_DB: f64 = 10.0;

/// Release time divisor/multiplier for the fast/slow coefficients
const RELEASE_SPREAD: f64 = 4.0;

/// Bounds for the derived fast/slow release times
const RELEASE_MIN_MS: f64 = 5.0;
const RELEASE_MAX_MS: f64 = 2000.0;

// ═══════════════════════════════════════════════════════════════════════════════
// TIME CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-block derived smoothing coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeConstants {
    pub attack: f64,
    pub release_fast: f64,
    pub release_slow: f64,
    pub rms: f64,
    pub gain_smoothing: f64,
    pub hpf_smoothing: f64,
}

impl TimeConstants {
    pub fn derive(sample_rate: f64, attack_ms: f64, release_ms: f64) -> Self {
        let fast_ms = (release_ms / RELEASE_SPREAD).clamp(RELEASE_MIN_MS, RELEASE_MAX_MS);
        let slow_ms = (release_ms * RELEASE_SPREAD).clamp(RELEASE_MIN_MS, RELEASE_MAX_MS);

        Self {
            attack: coefficient_from_ms(attack_ms, sample_rate),
            release_fast: coefficient_from_ms(fast_ms, sample_rate),
            release_slow: coefficient_from_ms(slow_ms, sample_rate),
            rms: coefficient_from_ms(RMS_WINDOW_MS, sample_rate),
            gain_smoothing: coefficient_from_ms(GAIN_SMOOTHING_MS, sample_rate),
            hpf_smoothing: coefficient_from_ms(HPF_COEFF_SMOOTHING_MS, sample_rate),
        }
    }
}

/// Smoothstep ease `t²(3 - 2t)` over a clamped `t`
#[inline]
fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENVELOPE FOLLOWER
// ═══════════════════════════════════════════════════════════════════════════════

/// One-pole follower over gain reduction in dB
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    envelope_db: f64,
    attack: f64,
    release_fast: f64,
    release_slow: f64,
}

impl EnvelopeFollower {
    pub fn new(sample_rate: f64, attack_ms: f64, release_ms: f64) -> Self {
        let mut follower = Self {
            envelope_db: 0.0,
            attack: 0.0,
            release_fast: 0.0,
            release_slow: 0.0,
        };
        follower.set_coefficients(&TimeConstants::derive(sample_rate, attack_ms, release_ms));
        follower
    }

    pub fn set_coefficients(&mut self, constants: &TimeConstants) {
        self.attack = constants.attack;
        self.release_fast = constants.release_fast;
        self.release_slow = constants.release_slow;
    }

    pub fn set_times(&mut self, sample_rate: f64, attack_ms: f64, release_ms: f64) {
        self.set_coefficients(&TimeConstants::derive(sample_rate, attack_ms, release_ms));
    }

    /// Release coefficient for the current depth
    #[inline]
    fn release_coeff(&self) -> f64 {
        let t = smoothstep((self.envelope_db - SMALL_GR_DB) / (LARGE_GR_DB - SMALL_GR_DB));
        self.release_slow + (self.release_fast - self.release_slow) * t
    }

    /// Step toward `target_db` (gain reduction, ≥ 0); returns the envelope
    #[inline]
    pub fn process(&mut self, target_db: f64) -> f64 {
        let coeff = if target_db <= self.envelope_db {
            self.release_coeff()
        } else {
            self.attack
        };
        self.envelope_db =
            flush_denormal(coeff * self.envelope_db + (1.0 - coeff) * target_db).max(0.0);
        self.envelope_db
    }

    pub fn envelope_db(&self) -> f64 {
        self.envelope_db
    }
}

impl Processor for EnvelopeFollower {
    fn reset(&mut self) {
        self.envelope_db = 0.0;
    }
}
