//! Level detection path
//!
//! - `DetectorFilter`: one-pole high-pass on the sidechain only, with a
//!   coefficient that glides toward its target instead of jumping
//! - `LevelDetector`: per-channel one-pole RMS, linked by maximum

use std::f64::consts::PI;

use tc_core::{MAX_CHANNELS, SIDECHAIN_HPF_MAX_HZ, SIDECHAIN_HPF_MIN_HZ, Sample};

use crate::{Processor, ProcessorConfig, coefficient_from_ms, flush_denormal};

/// Glide time for high-pass coefficient changes
pub const HPF_COEFF_SMOOTHING_MS: f64 = 20.0;

/// RMS averaging window
pub const RMS_WINDOW_MS: f64 = 10.0;

/// One-pole high-pass coefficient for a cutoff (clamped to 20..250 Hz)
#[inline]
pub fn hpf_alpha(cutoff_hz: f64, sample_rate: f64) -> f64 {
    let cutoff = cutoff_hz.clamp(SIDECHAIN_HPF_MIN_HZ, SIDECHAIN_HPF_MAX_HZ);
    let rc = 1.0 / (2.0 * PI * cutoff);
    let dt = 1.0 / sample_rate;
    rc / (rc + dt)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SIDECHAIN HIGH-PASS
// ═══════════════════════════════════════════════════════════════════════════════

/// Sidechain high-pass: `y[n] = a * (y[n-1] + x[n] - x[n-1])`
#[derive(Debug, Clone)]
pub struct DetectorFilter {
    prev_input: [f64; MAX_CHANNELS],
    prev_output: [f64; MAX_CHANNELS],
    alpha: f64,
    target_alpha: f64,
    smoothing_coeff: f64,
    cutoff_hz: f64,
    enabled: bool,
    sample_rate: f64,
}

impl DetectorFilter {
    pub fn new(sample_rate: f64) -> Self {
        let alpha = hpf_alpha(SIDECHAIN_HPF_MIN_HZ, sample_rate);
        Self {
            prev_input: [0.0; MAX_CHANNELS],
            prev_output: [0.0; MAX_CHANNELS],
            alpha,
            target_alpha: alpha,
            smoothing_coeff: coefficient_from_ms(HPF_COEFF_SMOOTHING_MS, sample_rate),
            cutoff_hz: SIDECHAIN_HPF_MIN_HZ,
            enabled: false,
            sample_rate,
        }
    }

    /// Enable at `cutoff_hz`, or disable (and clear memory) when
    /// `enabled` is false or the cutoff is not positive.
    pub fn set_cutoff(&mut self, enabled: bool, cutoff_hz: f64) {
        if !enabled || cutoff_hz <= 0.0 {
            self.enabled = false;
            self.clear_memory();
            return;
        }

        self.cutoff_hz = cutoff_hz.clamp(SIDECHAIN_HPF_MIN_HZ, SIDECHAIN_HPF_MAX_HZ);
        self.target_alpha = hpf_alpha(self.cutoff_hz, self.sample_rate);

        if !self.enabled {
            // Filter memory is empty; nothing to glide from
            self.alpha = self.target_alpha;
            self.enabled = true;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    /// Current (possibly mid-glide) coefficient
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn target_alpha(&self) -> f64 {
        self.target_alpha
    }

    /// Override the coefficient glide (precomputed per block)
    pub fn set_glide_coefficient(&mut self, coeff: f64) {
        self.smoothing_coeff = coeff;
    }

    /// Filter one frame in place (one sample per channel)
    ///
    /// Advances the coefficient glide once, then filters every channel.
    #[inline]
    pub fn process_frame(&mut self, frame: &mut [Sample]) {
        if !self.enabled {
            return;
        }

        self.alpha = self.smoothing_coeff * self.alpha
            + (1.0 - self.smoothing_coeff) * self.target_alpha;

        for (channel, sample) in frame.iter_mut().enumerate().take(MAX_CHANNELS) {
            let input = *sample;
            let output = flush_denormal(
                self.alpha * (self.prev_output[channel] + input - self.prev_input[channel]),
            );
            self.prev_input[channel] = input;
            self.prev_output[channel] = output;
            *sample = output;
        }
    }

    fn clear_memory(&mut self) {
        self.prev_input = [0.0; MAX_CHANNELS];
        self.prev_output = [0.0; MAX_CHANNELS];
    }
}

impl Processor for DetectorFilter {
    fn reset(&mut self) {
        self.clear_memory();
        self.alpha = self.target_alpha;
    }
}

impl ProcessorConfig for DetectorFilter {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.smoothing_coeff = coefficient_from_ms(HPF_COEFF_SMOOTHING_MS, sample_rate);
        self.target_alpha = hpf_alpha(self.cutoff_hz, sample_rate);
        self.alpha = self.target_alpha;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RMS DETECTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-channel mean-square estimator, linked by maximum
#[derive(Debug, Clone)]
pub struct LevelDetector {
    power: [f64; MAX_CHANNELS],
    coeff: f64,
}

impl LevelDetector {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            power: [0.0; MAX_CHANNELS],
            coeff: coefficient_from_ms(RMS_WINDOW_MS, sample_rate),
        }
    }

    /// Override the averaging coefficient (precomputed per block)
    pub fn set_coefficient(&mut self, coeff: f64) {
        self.coeff = coeff;
    }

    /// Feed one frame; returns the linked (maximum) RMS magnitude
    #[inline]
    pub fn process_frame(&mut self, frame: &[Sample]) -> f64 {
        let mut linked = 0.0_f64;
        for (power, &sample) in self.power.iter_mut().zip(frame) {
            *power = flush_denormal(self.coeff * *power + (1.0 - self.coeff) * sample * sample);
            linked = linked.max(power.sqrt());
        }
        linked
    }

    /// Current RMS of one channel
    pub fn rms(&self, channel: usize) -> f64 {
        self.power.get(channel).map_or(0.0, |p| p.sqrt())
    }
}

impl Processor for LevelDetector {
    fn reset(&mut self) {
        self.power = [0.0; MAX_CHANNELS];
    }
}

impl ProcessorConfig for LevelDetector {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.coeff = coefficient_from_ms(RMS_WINDOW_MS, sample_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SAMPLE_RATE: f64 = 48000.0;

    #[test]
    fn test_hpf_alpha_range() {
        let low = hpf_alpha(20.0, SAMPLE_RATE);
        let high = hpf_alpha(250.0, SAMPLE_RATE);
        assert!(low > high);
        assert!(low < 1.0 && high > 0.9);
        assert_eq!(hpf_alpha(5.0, SAMPLE_RATE), low);
        assert_eq!(hpf_alpha(1000.0, SAMPLE_RATE), high);
    }

    #[test]
    fn test_hpf_removes_dc() {
        let mut filter = DetectorFilter::new(SAMPLE_RATE);
        filter.set_cutoff(true, 100.0);

        let mut frame = [0.0; 2];
        for _ in 0..48000 {
            frame = [0.8, -0.5];
            filter.process_frame(&mut frame);
        }
        assert!(frame[0].abs() < 1e-6, "left DC leaked: {}", frame[0]);
        assert!(frame[1].abs() < 1e-6, "right DC leaked: {}", frame[1]);
    }

    #[test]
    fn test_hpf_coefficient_glides() {
        let mut filter = DetectorFilter::new(SAMPLE_RATE);
        filter.set_cutoff(true, 20.0);
        let start = filter.alpha();

        filter.set_cutoff(true, 250.0);
        let mut frame = [0.0; 2];
        filter.process_frame(&mut frame);
        let after_one = filter.alpha();

        // One sample moves only a small fraction toward the new target
        assert!(after_one < start);
        assert!((start - after_one) < 0.01 * (start - filter.target_alpha()));

        for _ in 0..48000 {
            filter.process_frame(&mut frame);
        }
        assert_abs_diff_eq!(filter.alpha(), filter.target_alpha(), epsilon = 1e-12);
    }

    #[test]
    fn test_disabled_filter_is_transparent() {
        let mut filter = DetectorFilter::new(SAMPLE_RATE);
        filter.set_cutoff(true, 100.0);
        let mut frame = [0.3, 0.3];
        filter.process_frame(&mut frame);

        filter.set_cutoff(false, 100.0);
        assert!(!filter.is_enabled());
        let mut frame = [0.7, -0.2];
        filter.process_frame(&mut frame);
        assert_eq!(frame, [0.7, -0.2]);

        // Zero cutoff also disables
        filter.set_cutoff(true, 0.0);
        assert!(!filter.is_enabled());
    }

    #[test]
    fn test_rms_converges_for_dc() {
        let mut detector = LevelDetector::new(SAMPLE_RATE);
        let mut level = 0.0;
        for _ in 0..4800 {
            level = detector.process_frame(&[0.5]);
        }
        assert_abs_diff_eq!(level, 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_rms_of_sine() {
        let mut detector = LevelDetector::new(SAMPLE_RATE);
        let amplitude = 0.8;
        for i in 0..48000 {
            let x = amplitude * (2.0 * PI * 1000.0 * i as f64 / SAMPLE_RATE).sin();
            detector.process_frame(&[x]);
        }
        assert_abs_diff_eq!(detector.rms(0), amplitude / 2.0_f64.sqrt(), epsilon = 0.01);
    }

    #[test]
    fn test_linking_takes_maximum() {
        let mut detector = LevelDetector::new(SAMPLE_RATE);
        let mut linked = 0.0;
        for _ in 0..4800 {
            linked = detector.process_frame(&[0.1, 0.6]);
        }
        assert_abs_diff_eq!(linked, detector.rms(1), epsilon = 1e-12);
        assert!(detector.rms(0) < linked);
    }
}
