//! tc-dsp: DSP core of the TwoC compressor
//!
//! Real-time safe: nothing reachable from `process_block` allocates,
//! locks or logs.
//!
//! ## Modules
//! - `gain_computer` - static threshold/ratio/soft-knee curve
//! - `detector` - sidechain high-pass and linked RMS level detection
//! - `envelope` - program-dependent gain-reduction envelope
//! - `smoothing` - linear gain smoothing ahead of the VCA multiply
//! - `saturation` - tanh saturation with loudness compensation
//! - `oversampling` - polyphase IIR half-band up/downsampling
//! - `metering` - meter ballistics and block peak measurement
//! - `compressor` - the linked per-sample compression loop
//! - `processor` - block orchestrator and host lifecycle

pub mod compressor;
pub mod detector;
pub mod envelope;
pub mod gain_computer;
pub mod metering;
pub mod oversampling;
pub mod processor;
pub mod saturation;
pub mod smoothing;

pub use compressor::LinkedCompressor;
pub use processor::CompressorProcessor;

/// Tiny value for denormal prevention
pub(crate) const DENORMAL_PREVENTION: f64 = 1e-25;

/// Trait for all DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}

/// Processor configuration for sample rate changes
pub trait ProcessorConfig {
    fn set_sample_rate(&mut self, sample_rate: f64);
}

/// One-pole smoothing coefficient for a time constant in milliseconds
///
/// `y = c * y + (1 - c) * x` reaches ~63% of a step after `time_ms`.
#[inline]
pub fn coefficient_from_ms(time_ms: f64, sample_rate: f64) -> f64 {
    let seconds = (time_ms * 0.001).max(1e-5);
    (-1.0 / (seconds * sample_rate)).exp()
}

/// Zero out values small enough to go denormal
#[inline(always)]
pub(crate) fn flush_denormal(value: f64) -> f64 {
    if value.abs() < DENORMAL_PREVENTION {
        0.0
    } else {
        value
    }
}
