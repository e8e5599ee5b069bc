//! Tanh saturation with partial loudness compensation
//!
//! Drive maps quadratically to input gain (finer control at low drive).
//! Output is pulled back by 70% of the drive so the tonal change stays
//! audible without a large level jump.

use tc_core::{Sample, db_to_gain};

/// Drive (0-1) to dB law: `MAX_DRIVE_DB * drive²`
pub const MAX_DRIVE_DB: f64 = 12.0;

/// Fraction of the drive gain removed at the output
pub const LOUDNESS_COMPENSATION: f64 = 0.70;

/// Drive/mix below this is treated as bypass
pub const ACTIVITY_THRESHOLD: f64 = 1e-4;

/// Stateless waveshaper; gains are derived once per block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Saturator {
    drive: f64,
    input_gain: f64,
    output_gain: f64,
}

impl Saturator {
    pub fn new(drive: f64) -> Self {
        let drive = drive.clamp(0.0, 1.0);
        let drive_db = MAX_DRIVE_DB * drive * drive;
        Self {
            drive,
            input_gain: db_to_gain(drive_db),
            output_gain: db_to_gain(-drive_db * LOUDNESS_COMPENSATION),
        }
    }

    /// Whether a drive/mix pair does anything audible
    #[inline]
    pub fn is_active(drive: f64, mix: f64) -> bool {
        drive > ACTIVITY_THRESHOLD && mix > ACTIVITY_THRESHOLD
    }

    pub fn drive(&self) -> f64 {
        self.drive
    }

    pub fn input_gain(&self) -> f64 {
        self.input_gain
    }

    pub fn output_gain(&self) -> f64 {
        self.output_gain
    }

    /// Fully wet transfer function
    #[inline(always)]
    pub fn shape(&self, sample: Sample) -> Sample {
        (sample * self.input_gain).tanh() * self.output_gain
    }

    /// Saturate in place, blending `wet * mix + dry * (1 - mix)`
    pub fn process(&self, buffer: &mut [Sample], mix: f64) {
        if !Self::is_active(self.drive, mix) {
            return;
        }

        if mix >= 1.0 {
            for sample in buffer.iter_mut() {
                *sample = self.shape(*sample);
            }
        } else {
            let dry_gain = 1.0 - mix;
            for sample in buffer.iter_mut() {
                *sample = self.shape(*sample) * mix + *sample * dry_gain;
            }
        }
    }

    /// Saturate every channel of a block
    pub fn process_channels(&self, channels: &mut [&mut [Sample]], mix: f64) {
        for channel in channels.iter_mut() {
            self.process(channel, mix);
        }
    }
}

impl Default for Saturator {
    fn default() -> Self {
        Self::new(0.0)
    }
}
