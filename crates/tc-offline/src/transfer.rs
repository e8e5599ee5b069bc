//! Static transfer-curve calibration
//!
//! Renders a stepped 1 kHz sine through the compressor with near-instant
//! attack and a slow release, measures the settled output level of each
//! step and compares it with the gain computer's static curve.

use std::f64::consts::TAU;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tc_core::{OversamplingMode, Parameters, Sample, gain_to_db};
use tc_dsp::gain_computer::GainComputer;

use crate::config::RenderConfig;
use crate::error::{OfflineError, OfflineResult};
use crate::render::render;
use crate::wav::AudioData;

const TONE_HZ: f64 = 1000.0;
const FIRST_LEVEL_DB: f64 = -48.0;
const LAST_LEVEL_DB: f64 = -6.0;
const LEVEL_STEP_DB: f64 = 3.0;
const TONE_SECONDS: f64 = 0.25;
const GAP_SECONDS: f64 = 0.05;
const MEASURE_OFFSET_SECONDS: f64 = 0.12;
const MEASURE_SECONDS: f64 = 0.10;
const MAX_PEAK: f64 = 0.999;
const WARMUP_BLOCKS: usize = 10;

/// Calibration run settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub sample_rate: f64,
    pub block_size: usize,
    pub channels: usize,
    /// The run fails when the worst step error reaches this
    pub max_error_db: f64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            block_size: 512,
            channels: 2,
            max_error_db: 0.75,
        }
    }
}

impl TransferConfig {
    /// Compressor settings the curve is measured with
    pub fn params() -> Parameters {
        Parameters::default()
            .with_threshold(-18.0)
            .with_ratio(4.0)
            .with_knee(6.0)
            .with_times(0.1, 2000.0)
            .with_sidechain_hpf(0.0)
            .with_makeup(0.0)
            .with_saturation(0.0, 0.0)
            .with_mix(1.0)
            .with_oversampling(OversamplingMode::Off)
    }

    /// Input RMS levels of the steps, in dB
    pub fn levels() -> Vec<f64> {
        let steps = ((LAST_LEVEL_DB - FIRST_LEVEL_DB) / LEVEL_STEP_DB).round() as usize;
        (0..=steps)
            .map(|i| FIRST_LEVEL_DB + i as f64 * LEVEL_STEP_DB)
            .collect()
    }
}

/// One measured step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRow {
    pub input_db: f64,
    pub expected_db: f64,
    pub measured_db: f64,
    pub error_db: f64,
}

/// Contents of `transfer_metrics.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReport {
    pub max_error_db: f64,
    pub threshold_db: f64,
    pub ratio: f64,
    pub knee_db: f64,
    pub passed: bool,
    pub rows: Vec<TransferRow>,
}

impl TransferReport {
    pub fn write(&self, outdir: &Path) -> OfflineResult<()> {
        std::fs::create_dir_all(outdir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(outdir.join("transfer_metrics.json"), json)?;
        Ok(())
    }
}

/// Sample positions of one step's measurement window
struct Step {
    level_db: f64,
    measure_start: usize,
    measure_len: usize,
}

/// Build the stepped sine for all levels plus each step's window
fn stepped_sine(sample_rate: f64, channels: usize) -> (AudioData, Vec<Step>) {
    let tone_len = (TONE_SECONDS * sample_rate).round() as usize;
    let gap_len = (GAP_SECONDS * sample_rate).round() as usize;
    let offset = (MEASURE_OFFSET_SECONDS * sample_rate).round() as usize;
    let measure_len = (MEASURE_SECONDS * sample_rate).round() as usize;
    let increment = TAU * TONE_HZ / sample_rate;

    let levels = TransferConfig::levels();
    let mut signal: Vec<Sample> = Vec::with_capacity(levels.len() * (tone_len + gap_len));
    let mut steps = Vec::with_capacity(levels.len());
    let mut phase = 0.0_f64;

    for level_db in levels {
        let amplitude = (10.0_f64.powf(level_db / 20.0) * std::f64::consts::SQRT_2).min(MAX_PEAK);

        steps.push(Step {
            level_db,
            measure_start: signal.len() + offset,
            measure_len,
        });

        for _ in 0..tone_len {
            signal.push(amplitude * phase.sin());
            phase += increment;
            if phase >= TAU {
                phase -= TAU;
            }
        }
        signal.resize(signal.len() + gap_len, 0.0);
    }

    let audio = AudioData::new(vec![signal; channels], sample_rate.round() as u32);
    (audio, steps)
}

/// Render the stepped sine and compare each step with the static curve
pub fn run_transfer_curve(config: &TransferConfig) -> OfflineResult<TransferReport> {
    if !config.max_error_db.is_finite() || config.max_error_db <= 0.0 {
        return Err(OfflineError::InvalidConfig(format!(
            "max error must be positive, got {}",
            config.max_error_db
        )));
    }

    let params = TransferConfig::params();
    let render_config = RenderConfig::default()
        .with_sample_rate(config.sample_rate)
        .with_block_size(config.block_size)
        .with_channels(config.channels)
        .with_warmup(WARMUP_BLOCKS)
        .with_params(params);
    render_config.validate()?;

    let (input, steps) = stepped_sine(config.sample_rate, config.channels);
    let output = render(&input, &render_config)?.audio;

    let computer = GainComputer::from_params(&params);
    let mut rows = Vec::with_capacity(steps.len());

    for step in &steps {
        let range = step.measure_start..step.measure_start + step.measure_len;
        let mut sum = 0.0;
        for channel in &output.channels {
            sum += channel[range.clone()].iter().map(|x| x * x).sum::<f64>();
        }
        let count = (step.measure_len * output.num_channels()).max(1);
        let measured_db = gain_to_db((sum / count as f64).sqrt(), -300.0);
        let expected_db = computer.output_db(step.level_db);

        rows.push(TransferRow {
            input_db: step.level_db,
            expected_db,
            measured_db,
            error_db: (measured_db - expected_db).abs(),
        });
    }

    let max_error_db = rows.iter().map(|r| r.error_db).fold(0.0, f64::max);
    let passed = max_error_db < config.max_error_db;

    log::info!(
        "Transfer curve: {} steps, max error {:.3} dB ({})",
        rows.len(),
        max_error_db,
        if passed { "pass" } else { "fail" }
    );

    Ok(TransferReport {
        max_error_db,
        threshold_db: computer.threshold_db(),
        ratio: computer.ratio(),
        knee_db: computer.knee_db(),
        passed,
        rows,
    })
}
