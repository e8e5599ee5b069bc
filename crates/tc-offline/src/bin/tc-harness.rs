//! TwoC offline harness
//!
//! Usage:
//!   tc-harness dump-params                        - List parameter layout
//!   tc-harness render --in a.wav --outdir out     - Render a file to out/wet.wav
//!   tc-harness analyze --dry a.wav --wet b.wav --outdir out
//!   tc-harness transfer-curve --outdir out        - Static curve calibration
//!
//! Exit codes: 0 success, 1 usage/IO error or failed calibration,
//! 2 non-finite samples found by `analyze`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tc_core::{ParamId, Parameters};
use tc_offline::{
    AudioData, RenderConfig, TransferConfig, analyze, apply_overrides, load_preset,
    parse_overrides, render, run_transfer_curve,
};

#[derive(Parser)]
#[command(name = "tc-harness", about = "TwoC compressor offline harness")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print index, name and default normalized value of every parameter
    DumpParams,
    /// Render a WAV file through the compressor
    Render {
        /// Input WAV file
        #[arg(long = "in")]
        input: PathBuf,
        /// Output directory (wet.wav is written here)
        #[arg(long)]
        outdir: PathBuf,
        /// Processing sample rate (defaults to the file's rate)
        #[arg(long)]
        sr: Option<f64>,
        /// Block size
        #[arg(long, default_value_t = 256)]
        bs: usize,
        /// Channel count
        #[arg(long, default_value_t = 2)]
        ch: usize,
        /// Blocks of silence processed first
        #[arg(long, default_value_t = 0)]
        warmup: usize,
        /// Normalized overrides, e.g. "1=0.5,10=0"
        #[arg(long)]
        set_params: Option<String>,
        /// JSON parameter preset applied before overrides
        #[arg(long)]
        preset: Option<PathBuf>,
    },
    /// Compare dry and wet files
    Analyze {
        #[arg(long)]
        dry: PathBuf,
        #[arg(long)]
        wet: PathBuf,
        /// Output directory (delta.wav and metrics.json)
        #[arg(long)]
        outdir: PathBuf,
        /// Align wet to dry by cross-correlation
        #[arg(long)]
        auto_align: bool,
        /// Mark the comparison as a null test
        #[arg(long)]
        null: bool,
    },
    /// Measure the static transfer curve with a stepped sine
    TransferCurve {
        #[arg(long)]
        outdir: PathBuf,
        #[arg(long, default_value_t = 48000.0)]
        sr: f64,
        #[arg(long, default_value_t = 512)]
        bs: usize,
        #[arg(long, default_value_t = 2)]
        ch: usize,
        /// Fail when the worst error reaches this
        #[arg(long, default_value_t = 0.75)]
        max_error_db: f64,
    },
}

/// Non-error command results that still map to a non-zero exit code
enum Outcome {
    Success,
    CalibrationFailed,
    NonFinite,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::CalibrationFailed => ExitCode::from(1),
            Outcome::NonFinite => ExitCode::from(2),
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            if let Err(io_err) = e.print() {
                log::error!("Failed to print usage: {}", io_err);
            }
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let result = match cli.command {
        Commands::DumpParams => dump_params(),
        Commands::Render {
            input,
            outdir,
            sr,
            bs,
            ch,
            warmup,
            set_params,
            preset,
        } => {
            let config = RenderConfig {
                sample_rate: sr,
                block_size: bs,
                channels: ch,
                warmup_blocks: warmup,
                params: Parameters::default(),
            };
            run_render(&input, &outdir, config, preset.as_deref(), set_params.as_deref())
        }
        Commands::Analyze {
            dry,
            wet,
            outdir,
            auto_align,
            null,
        } => run_analyze(&dry, &wet, &outdir, auto_align, null),
        Commands::TransferCurve {
            outdir,
            sr,
            bs,
            ch,
            max_error_db,
        } => {
            let config = TransferConfig {
                sample_rate: sr,
                block_size: bs,
                channels: ch,
                max_error_db,
            };
            run_transfer(&outdir, &config)
        }
    };

    match result {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn dump_params() -> Result<Outcome> {
    for id in ParamId::ALL {
        println!("{}\t{}\t{:.6}", id.index(), id.name(), id.default_normalized());
    }
    Ok(Outcome::Success)
}

fn run_render(
    input: &Path,
    outdir: &Path,
    mut config: RenderConfig,
    preset: Option<&Path>,
    overrides: Option<&str>,
) -> Result<Outcome> {
    let mut params = match preset {
        Some(path) => load_preset(path)
            .with_context(|| format!("Failed to load preset {}", path.display()))?,
        None => Parameters::default(),
    };
    if let Some(text) = overrides {
        params = apply_overrides(params, &parse_overrides(text)?);
    }
    config.params = params;

    let audio = AudioData::load(input)?;
    let output = render(&audio, &config)?;

    std::fs::create_dir_all(outdir)
        .with_context(|| format!("Failed to create {}", outdir.display()))?;
    let wet_path = outdir.join("wet.wav");
    output.audio.write_24bit(&wet_path)?;

    println!(
        "Wrote {} ({:.2} s), final GR {:.2} dB",
        wet_path.display(),
        output.audio.duration(),
        output.final_gain_reduction_db
    );
    Ok(Outcome::Success)
}

fn run_analyze(
    dry: &Path,
    wet: &Path,
    outdir: &Path,
    auto_align: bool,
    null: bool,
) -> Result<Outcome> {
    let dry = AudioData::load(dry)?;
    let wet = AudioData::load(wet)?;

    let analysis = analyze(&dry, &wet, auto_align, null)?;
    analysis
        .write(outdir)
        .with_context(|| format!("Failed to write results to {}", outdir.display()))?;

    let m = &analysis.metrics;
    println!(
        "lag={} overlap={} rms_dry={:.2} rms_wet={:.2} rms_delta={:.2} peak_delta={:.2}",
        m.lag_samples, m.overlap_samples, m.rms_dry_db, m.rms_wet_db, m.rms_delta_db, m.peak_delta_db
    );

    if m.nan_or_inf {
        eprintln!("Non-finite samples detected");
        return Ok(Outcome::NonFinite);
    }
    Ok(Outcome::Success)
}

fn run_transfer(outdir: &Path, config: &TransferConfig) -> Result<Outcome> {
    let report = run_transfer_curve(config)?;
    report
        .write(outdir)
        .with_context(|| format!("Failed to write results to {}", outdir.display()))?;

    for row in &report.rows {
        println!(
            "in={:.1} expected={:.2} measured={:.2} err={:.3}",
            row.input_db, row.expected_db, row.measured_db, row.error_db
        );
    }
    println!("MAX_ERROR_DB={:.4}", report.max_error_db);

    if report.passed {
        Ok(Outcome::Success)
    } else {
        Ok(Outcome::CalibrationFailed)
    }
}
