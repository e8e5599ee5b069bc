//! Stereo-linked compressor
//!
//! Per sample: sidechain high-pass → linked RMS → static curve →
//! program-dependent envelope → linear gain smoothing → shared gain
//! applied to every channel. The high-pass only ever sees a copy of the
//! signal; the audible path is untouched by it.

use tc_core::{MAX_CHANNELS, Parameters, Sample, gain_to_db};

use crate::detector::{DetectorFilter, LevelDetector};
use crate::envelope::{EnvelopeFollower, TimeConstants};
use crate::gain_computer::GainComputer;
use crate::smoothing::GainSmoother;
use crate::{Processor, ProcessorConfig};

/// Detector level floor for silence
pub const DETECTOR_FLOOR_DB: f64 = -120.0;

/// Linked feed-forward RMS compressor for up to two channels
#[derive(Debug, Clone)]
pub struct LinkedCompressor {
    sample_rate: f64,
    computer: GainComputer,
    filter: DetectorFilter,
    detector: LevelDetector,
    envelope: EnvelopeFollower,
    smoother: GainSmoother,
    /// (attack_ms, release_ms) the cached constants were derived from
    times: (f64, f64),
    constants: TimeConstants,
    last_gain_reduction_db: f64,
}

impl LinkedCompressor {
    pub fn new(sample_rate: f64) -> Self {
        let defaults = Parameters::default();
        let times = (defaults.attack_ms, defaults.release_ms);
        let mut compressor = Self {
            sample_rate,
            computer: GainComputer::from_params(&defaults),
            filter: DetectorFilter::new(sample_rate),
            detector: LevelDetector::new(sample_rate),
            envelope: EnvelopeFollower::new(sample_rate, times.0, times.1),
            smoother: GainSmoother::new(sample_rate),
            times,
            constants: TimeConstants::derive(sample_rate, times.0, times.1),
            last_gain_reduction_db: 0.0,
        };
        compressor.set_parameters(&defaults);
        compressor
    }

    /// Apply a sanitized parameter snapshot (once per block)
    ///
    /// Time constants are only rederived when attack or release moved.
    pub fn set_parameters(&mut self, params: &Parameters) {
        self.computer = GainComputer::from_params(params);

        let times = (params.attack_ms, params.release_ms);
        if times != self.times {
            self.times = times;
            self.constants = TimeConstants::derive(self.sample_rate, times.0, times.1);
        }
        self.apply_constants();

        self.filter
            .set_cutoff(params.sidechain_hpf_enabled, params.sidechain_hpf_hz);
    }

    fn apply_constants(&mut self) {
        self.envelope.set_coefficients(&self.constants);
        self.detector.set_coefficient(self.constants.rms);
        self.smoother.set_coefficient(self.constants.gain_smoothing);
        self.filter.set_glide_coefficient(self.constants.hpf_smoothing);
    }

    pub fn gain_computer(&self) -> &GainComputer {
        &self.computer
    }

    /// Compress up to [`MAX_CHANNELS`] channels in place
    ///
    /// Returns the block's peak gain reduction in dB (≥ 0). Channels past
    /// the second are ignored.
    pub fn process(&mut self, channels: &mut [&mut [Sample]]) -> f64 {
        let active = channels.len().min(MAX_CHANNELS);
        let len = channels[..active]
            .iter()
            .map(|channel| channel.len())
            .min()
            .unwrap_or(0);

        if len == 0 {
            self.last_gain_reduction_db = 0.0;
            return 0.0;
        }

        let mut peak_reduction = 0.0_f64;
        let mut frame = [0.0; MAX_CHANNELS];

        for i in 0..len {
            for (slot, channel) in frame.iter_mut().zip(channels[..active].iter()) {
                *slot = channel[i];
            }

            self.filter.process_frame(&mut frame[..active]);
            let level = self.detector.process_frame(&frame[..active]);
            let target_db = self.computer.reduction_db(gain_to_db(level, DETECTOR_FLOOR_DB));

            let envelope_db = self.envelope.process(target_db);
            peak_reduction = peak_reduction.max(envelope_db);

            let gain = self.smoother.process(envelope_db);
            for channel in channels[..active].iter_mut() {
                channel[i] *= gain;
            }
        }

        self.last_gain_reduction_db = peak_reduction.max(0.0);
        self.last_gain_reduction_db
    }

    /// Peak gain reduction of the last processed block
    pub fn last_gain_reduction_db(&self) -> f64 {
        self.last_gain_reduction_db
    }

    /// Current envelope depth in dB
    pub fn envelope_db(&self) -> f64 {
        self.envelope.envelope_db()
    }
}

impl Processor for LinkedCompressor {
    fn reset(&mut self) {
        self.filter.reset();
        self.detector.reset();
        self.envelope.reset();
        self.smoother.reset();
        self.last_gain_reduction_db = 0.0;
    }
}

impl ProcessorConfig for LinkedCompressor {
    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.constants = TimeConstants::derive(sample_rate, self.times.0, self.times.1);
        self.filter.set_sample_rate(sample_rate);
        self.detector.set_sample_rate(sample_rate);
        self.apply_constants();
        self.reset();
    }
}
