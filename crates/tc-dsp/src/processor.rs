//! Block orchestrator
//!
//! Fixed per-block pipeline:
//! input meter → dry snapshot → input trim → compressor → makeup →
//! saturation (optionally oversampled) → wet/dry mix → output trim →
//! output meter and gain-reduction publish.
//!
//! Scratch buffers are sized in [`CompressorProcessor::initialize`] and
//! never resized while processing. A block longer than the configured
//! maximum is still processed, with the dry blends dropped (full wet).

use std::sync::Arc;

use tc_core::{
    MAX_CHANNELS, MeterBridge, OversamplingMode, ParamStore, Parameters, Sample, TcError,
    TcResult, db_to_gain,
};

use crate::compressor::LinkedCompressor;
use crate::metering::{MeterBallistics, block_peak_db};
use crate::oversampling::{OversamplingContext, OversamplingState};
use crate::saturation::Saturator;
use crate::{Processor, ProcessorConfig};

const DEFAULT_SAMPLE_RATE: f64 = 48000.0;
const DEFAULT_MAX_BLOCK: usize = 512;

/// Saturation mix at or above this skips the post-oversampling blend
const FULL_WET_SATURATION: f64 = 0.999;

/// Complete compressor: owns every piece of processing state
#[derive(Debug)]
pub struct CompressorProcessor {
    sample_rate: f64,
    max_block_size: usize,
    params: Parameters,
    compressor: LinkedCompressor,
    oversampling: OversamplingContext,
    dry: [Vec<Sample>; MAX_CHANNELS],
    saturation_dry: [Vec<Sample>; MAX_CHANNELS],
    input_meter: MeterBallistics,
    output_meter: MeterBallistics,
    meters: Arc<MeterBridge>,
}

impl CompressorProcessor {
    /// Processor at 48 kHz / 512 samples; call [`Self::initialize`] before
    /// streaming at any other configuration.
    pub fn new() -> Self {
        let params = Parameters::default();
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            max_block_size: DEFAULT_MAX_BLOCK,
            params,
            compressor: LinkedCompressor::new(DEFAULT_SAMPLE_RATE),
            oversampling: OversamplingContext::new(
                params.oversampling_mode,
                MAX_CHANNELS,
                DEFAULT_MAX_BLOCK,
            ),
            dry: std::array::from_fn(|_| vec![0.0; DEFAULT_MAX_BLOCK]),
            saturation_dry: std::array::from_fn(|_| vec![0.0; DEFAULT_MAX_BLOCK]),
            input_meter: MeterBallistics::new(DEFAULT_SAMPLE_RATE),
            output_meter: MeterBallistics::new(DEFAULT_SAMPLE_RATE),
            meters: Arc::new(MeterBridge::new()),
        }
    }

    /// Stream (re)initialization: allocate scratch, apply a latched
    /// oversampling mode, reset all state.
    pub fn initialize(&mut self, sample_rate: f64, max_block_size: usize) -> TcResult<()> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(TcError::InvalidSampleRate(sample_rate));
        }
        if max_block_size == 0 {
            return Err(TcError::InvalidBlockSize(max_block_size));
        }

        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;

        for buffer in self.dry.iter_mut().chain(self.saturation_dry.iter_mut()) {
            *buffer = vec![0.0; max_block_size];
        }

        self.oversampling.configure(MAX_CHANNELS, max_block_size);
        self.compressor.set_sample_rate(sample_rate);
        self.compressor.set_parameters(&self.params);
        self.input_meter.set_sample_rate(sample_rate);
        self.output_meter.set_sample_rate(sample_rate);
        self.reset();

        log::info!(
            "Compressor initialized: {} Hz, max block {}, oversampling {}",
            sample_rate,
            max_block_size,
            self.oversampling.active_mode().label()
        );
        Ok(())
    }

    /// Take a new parameter snapshot (once per block, before processing)
    ///
    /// Values are sanitized here. An oversampling mode change is latched
    /// and only applied by the next [`Self::initialize`].
    pub fn update_parameters(&mut self, params: &Parameters) {
        self.params = params.sanitized();
        self.compressor.set_parameters(&self.params);
        self.oversampling.request_mode(self.params.oversampling_mode);
    }

    /// Snapshot a shared store and apply it
    pub fn update_from_store(&mut self, store: &ParamStore) {
        self.update_parameters(&store.snapshot());
    }

    /// Process a block where every channel carries input
    pub fn process_block(&mut self, buffer: &mut [&mut [Sample]]) {
        let inputs = buffer.len();
        self.process_block_with_inputs(buffer, inputs);
    }

    /// Process a block whose first `input_channels` channels carry input
    ///
    /// Output channels past the input count are cleared before processing.
    /// Only the first [`MAX_CHANNELS`] channels are touched.
    pub fn process_block_with_inputs(&mut self, buffer: &mut [&mut [Sample]], input_channels: usize) {
        let channels = buffer.len().min(MAX_CHANNELS);
        let inputs = input_channels.min(channels);
        let work = &mut buffer[..channels];
        let len = work.iter().map(|channel| channel.len()).min().unwrap_or(0);

        if len == 0 {
            self.meters.publish_gain_reduction(0.0);
            return;
        }

        let params = self.params;
        let fits = len <= self.max_block_size;

        // 1. Input meter
        let input_peak = block_peak_db(&work[..inputs]);
        let input_level = self.input_meter.process_block(input_peak, len);
        self.meters.publish_input(input_peak, input_level);

        // 2. Dry snapshot
        let use_dry_mix = params.wet_dry_mix < 1.0 && fits;
        if use_dry_mix {
            for (ch, dry) in self.dry.iter_mut().enumerate().take(channels) {
                let dry = &mut dry[..len];
                if ch < inputs {
                    dry.copy_from_slice(&work[ch][..len]);
                } else {
                    dry.fill(0.0);
                }
            }
        }

        for channel in work[inputs..].iter_mut() {
            channel.fill(0.0);
        }

        // 3-6. Trim, compress, makeup
        apply_gain(work, db_to_gain(params.input_db));
        let gain_reduction = self.compressor.process(work);
        apply_gain(work, db_to_gain(params.makeup_db));

        // 7. Saturation
        if Saturator::is_active(params.saturation_drive, params.saturation_mix) {
            let saturator = Saturator::new(params.saturation_drive);

            match self.oversampling.active_mut() {
                Some(oversampler) => {
                    let mut mix = params.saturation_mix;
                    if mix < FULL_WET_SATURATION {
                        if fits {
                            for (dry, channel) in self.saturation_dry.iter_mut().zip(work.iter()) {
                                dry[..len].copy_from_slice(&channel[..len]);
                            }
                        } else {
                            mix = 1.0;
                        }
                    }

                    oversampler.process(work, |block| saturator.process(block, 1.0));

                    if mix < FULL_WET_SATURATION {
                        blend(work, &self.saturation_dry, mix, len);
                    }
                }
                None => saturator.process_channels(work, params.saturation_mix),
            }
        }

        // 8. Wet/dry
        if use_dry_mix {
            blend(work, &self.dry, params.wet_dry_mix, len);
        }

        // 9. Output trim
        apply_gain(work, db_to_gain(params.output_db));

        // 10. Output meter and gain reduction
        let output_peak = block_peak_db(work);
        let output_level = self.output_meter.process_block(output_peak, len);
        self.meters.publish_output(output_peak, output_level);
        self.meters.publish_gain_reduction(gain_reduction);
    }

    /// Shared meter values for a display thread
    pub fn meters(&self) -> Arc<MeterBridge> {
        Arc::clone(&self.meters)
    }

    pub fn last_gain_reduction_db(&self) -> f64 {
        self.compressor.last_gain_reduction_db()
    }

    /// Sanitized parameters in effect
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    pub fn oversampling_state(&self) -> OversamplingState {
        self.oversampling.state()
    }

    pub fn oversampling_mode(&self) -> OversamplingMode {
        self.oversampling.active_mode()
    }
}

impl Default for CompressorProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for CompressorProcessor {
    fn reset(&mut self) {
        self.compressor.reset();
        self.oversampling.reset();
        self.input_meter.reset(tc_core::METER_FLOOR_DB);
        self.output_meter.reset(tc_core::METER_FLOOR_DB);
        self.meters.clear();
        log::debug!("Compressor state reset");
    }
}

#[inline]
fn apply_gain(channels: &mut [&mut [Sample]], gain: f64) {
    if gain == 1.0 {
        return;
    }
    for channel in channels.iter_mut() {
        channel.iter_mut().for_each(|x| *x *= gain);
    }
}

/// `x = x * wet + dry * (1 - wet)` over the first `len` samples
#[inline]
fn blend(channels: &mut [&mut [Sample]], dry: &[Vec<Sample>], wet: f64, len: usize) {
    let dry_gain = 1.0 - wet;
    for (channel, dry) in channels.iter_mut().zip(dry) {
        for (x, &d) in channel[..len].iter_mut().zip(&dry[..len]) {
            *x = *x * wet + d * dry_gain;
        }
    }
}
