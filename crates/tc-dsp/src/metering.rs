//! Meter ballistics and block peak measurement
//!
//! Display-only smoothing, independent of the gain-reduction envelope.

use tc_core::{METER_FLOOR_DB, Sample, gain_to_db};

use crate::ProcessorConfig;

/// Default meter rise time
pub const METER_ATTACK_MS: f64 = 10.0;

/// Default meter fall time
pub const METER_RELEASE_MS: f64 = 300.0;

/// Shortest accepted meter time
const MIN_METER_TIME_MS: f64 = 0.1;

// ═══════════════════════════════════════════════════════════════════════════════
// METER BALLISTICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Attack/release smoother over a dB value
#[derive(Debug, Clone)]
pub struct MeterBallistics {
    sample_rate: f64,
    attack_ms: f64,
    release_ms: f64,
    attack_coeff: f64,
    release_coeff: f64,
    state_db: f64,
}

impl MeterBallistics {
    pub fn new(sample_rate: f64) -> Self {
        let mut meter = Self {
            sample_rate: sample_rate.max(1.0),
            attack_ms: METER_ATTACK_MS,
            release_ms: METER_RELEASE_MS,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            state_db: METER_FLOOR_DB,
        };
        meter.set_times(METER_ATTACK_MS, METER_RELEASE_MS);
        meter
    }

    /// Set rise/fall times (clamped to ≥ 0.1 ms)
    pub fn set_times(&mut self, attack_ms: f64, release_ms: f64) {
        self.attack_ms = attack_ms.max(MIN_METER_TIME_MS);
        self.release_ms = release_ms.max(MIN_METER_TIME_MS);
        self.attack_coeff = crate::coefficient_from_ms(self.attack_ms, self.sample_rate);
        self.release_coeff = crate::coefficient_from_ms(self.release_ms, self.sample_rate);
    }

    #[inline]
    fn coeff_for(&self, target_db: f64) -> f64 {
        if target_db > self.state_db {
            self.attack_coeff
        } else {
            self.release_coeff
        }
    }

    /// Advance one sample toward `target_db`
    #[inline]
    pub fn process(&mut self, target_db: f64) -> f64 {
        let coeff = self.coeff_for(target_db);
        self.state_db = coeff * self.state_db + (1.0 - coeff) * target_db;
        self.state_db
    }

    /// Advance `samples` samples toward a constant `target_db` in one step
    #[inline]
    pub fn process_block(&mut self, target_db: f64, samples: usize) -> f64 {
        if samples == 0 {
            return self.state_db;
        }
        let decay = self.coeff_for(target_db).powi(samples.min(i32::MAX as usize) as i32);
        self.state_db = decay * self.state_db + (1.0 - decay) * target_db;
        self.state_db
    }

    pub fn current_db(&self) -> f64 {
        self.state_db
    }

    pub fn reset(&mut self, initial_db: f64) {
        self.state_db = initial_db;
    }
}

impl ProcessorConfig for MeterBallistics {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate.max(1.0);
        self.set_times(self.attack_ms, self.release_ms);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PEAK
// ═══════════════════════════════════════════════════════════════════════════════

/// Largest absolute sample across channels, in dB floored at -100
pub fn block_peak_db(channels: &[&mut [Sample]]) -> f64 {
    let peak = channels
        .iter()
        .flat_map(|channel| channel.iter())
        .fold(0.0_f64, |peak, &x| peak.max(x.abs()));
    gain_to_db(peak, METER_FLOOR_DB)
}
