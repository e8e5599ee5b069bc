//! Dry/wet comparison: alignment, null residual and level metrics

use std::path::Path;

use serde::{Deserialize, Serialize};
use tc_core::{Sample, gain_to_db};

use crate::error::{OfflineError, OfflineResult};
use crate::wav::AudioData;

/// Lag search range in samples (both directions)
pub const MAX_LAG_SAMPLES: usize = 4096;

/// Lags with this many overlapping samples or fewer are skipped
const MIN_LAG_OVERLAP: usize = 32;

/// Signals with less energy than this are treated as silent
const MIN_ENERGY: f64 = 1e-15;

/// Floor for reported dB values
pub const METRICS_FLOOR_DB: f64 = -300.0;

/// Contents of `metrics.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetrics {
    pub sample_rate: u32,
    pub channels: usize,
    pub dry_samples: usize,
    pub wet_samples: usize,
    pub overlap_samples: usize,
    /// Positive when the wet signal is late
    pub lag_samples: isize,
    pub auto_align: bool,
    pub null_requested: bool,
    pub rms_dry_db: f64,
    pub rms_wet_db: f64,
    pub rms_delta_db: f64,
    pub peak_delta_db: f64,
    pub nan_or_inf: bool,
}

/// Metrics plus the `wet - dry` residual over the overlap
#[derive(Debug, Clone)]
pub struct Analysis {
    pub metrics: AnalysisMetrics,
    pub delta: AudioData,
}

impl Analysis {
    /// Write `delta.wav` and `metrics.json` into `outdir`
    pub fn write(&self, outdir: &Path) -> OfflineResult<()> {
        std::fs::create_dir_all(outdir)?;
        self.delta.write_24bit(outdir.join("delta.wav"))?;
        let json = serde_json::to_string_pretty(&self.metrics)?;
        std::fs::write(outdir.join("metrics.json"), json)?;
        Ok(())
    }
}

/// Channel average
pub fn mono_mix(audio: &AudioData) -> Vec<Sample> {
    let num_channels = audio.num_channels();
    if num_channels == 0 {
        return Vec::new();
    }

    let scale = 1.0 / num_channels as f64;
    (0..audio.num_samples())
        .map(|i| audio.channels.iter().map(|ch| ch[i]).sum::<f64>() * scale)
        .collect()
}

/// Overlap start offsets `(dry, wet)` and length for a lag
fn overlap(dry_len: usize, wet_len: usize, lag: isize) -> (usize, usize, usize) {
    let dry_start = (-lag).max(0) as usize;
    let wet_start = lag.max(0) as usize;
    let count = dry_len
        .saturating_sub(dry_start)
        .min(wet_len.saturating_sub(wet_start));
    (dry_start, wet_start, count)
}

/// Lag in `-max_lag..=max_lag` maximising the normalised cross-correlation
///
/// Returns 0 when no lag has enough overlap or energy.
pub fn find_best_lag(dry: &[Sample], wet: &[Sample], max_lag: usize) -> isize {
    let max_lag = max_lag as isize;
    let mut best_lag = 0;
    let mut best_score = f64::NEG_INFINITY;

    for lag in -max_lag..=max_lag {
        let (dry_start, wet_start, count) = overlap(dry.len(), wet.len(), lag);
        if count <= MIN_LAG_OVERLAP {
            continue;
        }

        let d = &dry[dry_start..dry_start + count];
        let w = &wet[wet_start..wet_start + count];

        let (mut cross, mut dry_energy, mut wet_energy) = (0.0, 0.0, 0.0);
        for (&x, &y) in d.iter().zip(w) {
            cross += x * y;
            dry_energy += x * x;
            wet_energy += y * y;
        }
        if dry_energy <= MIN_ENERGY || wet_energy <= MIN_ENERGY {
            continue;
        }

        let score = cross / (dry_energy * wet_energy).sqrt();
        if score > best_score {
            best_score = score;
            best_lag = lag;
        }
    }

    best_lag
}

fn rms_db(sum_squares: f64, count: usize) -> f64 {
    if count == 0 {
        return METRICS_FLOOR_DB;
    }
    gain_to_db((sum_squares / count as f64).sqrt(), METRICS_FLOOR_DB)
}

/// Compare `dry` and `wet` over their common channels
///
/// With `auto_align` the wet signal is shifted by the best lag first. A
/// non-finite sample anywhere in either file sets `nan_or_inf`, including
/// samples outside the compared overlap.
pub fn analyze(
    dry: &AudioData,
    wet: &AudioData,
    auto_align: bool,
    null_requested: bool,
) -> OfflineResult<Analysis> {
    let channels = dry.num_channels().min(wet.num_channels());
    if channels == 0 {
        return Err(OfflineError::ChannelMismatch {
            expected: dry.num_channels().max(1),
            actual: wet.num_channels(),
        });
    }
    if dry.num_channels() != wet.num_channels() {
        log::warn!(
            "Channel count differs (dry {}, wet {}), comparing first {}",
            dry.num_channels(),
            wet.num_channels(),
            channels
        );
    }
    if dry.sample_rate != wet.sample_rate {
        log::warn!(
            "Sample rate differs (dry {} Hz, wet {} Hz), using dry rate",
            dry.sample_rate,
            wet.sample_rate
        );
    }

    let dry_samples = dry.num_samples();
    let wet_samples = wet.num_samples();

    let lag = if auto_align {
        find_best_lag(&mono_mix(dry), &mono_mix(wet), MAX_LAG_SAMPLES)
    } else {
        0
    };

    let (dry_start, wet_start, count) = overlap(dry_samples, wet_samples, lag);
    if count == 0 {
        return Err(OfflineError::NoOverlap);
    }

    let mut delta = AudioData::silence(channels, count, dry.sample_rate);
    let (mut dry_sq, mut wet_sq, mut delta_sq, mut delta_peak) = (0.0, 0.0, 0.0, 0.0_f64);
    let mut nan_or_inf = dry.has_non_finite() || wet.has_non_finite();

    for ch in 0..channels {
        let d = &dry.channels[ch][dry_start..dry_start + count];
        let w = &wet.channels[ch][wet_start..wet_start + count];

        for ((out, &x), &y) in delta.channels[ch].iter_mut().zip(d).zip(w) {
            let diff = y - x;
            if !x.is_finite() || !y.is_finite() || !diff.is_finite() {
                nan_or_inf = true;
                continue;
            }
            *out = diff;
            dry_sq += x * x;
            wet_sq += y * y;
            delta_sq += diff * diff;
            delta_peak = delta_peak.max(diff.abs());
        }
    }

    let total = count * channels;
    let metrics = AnalysisMetrics {
        sample_rate: dry.sample_rate,
        channels,
        dry_samples,
        wet_samples,
        overlap_samples: count,
        lag_samples: lag,
        auto_align,
        null_requested,
        rms_dry_db: rms_db(dry_sq, total),
        rms_wet_db: rms_db(wet_sq, total),
        rms_delta_db: rms_db(delta_sq, total),
        peak_delta_db: gain_to_db(delta_peak, METRICS_FLOOR_DB),
        nan_or_inf,
    };

    log::info!(
        "Analyzed {} samples x {} ch, lag {}, delta RMS {:.2} dB",
        count,
        channels,
        lag,
        metrics.rms_delta_db
    );
    if nan_or_inf {
        log::warn!("Non-finite samples found in the compared signals");
    }

    Ok(Analysis { metrics, delta })
}
