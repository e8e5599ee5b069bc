//! tc-offline: Offline harness for the TwoC compressor
//!
//! File-based glue around the processor lifecycle:
//!
//! ```text
//! WAV in ─→ channel match ─→ warmup ─→ block render ─→ wet.wav
//! dry.wav + wet.wav ─→ lag search ─→ delta.wav + metrics.json
//! stepped sine ─→ render ─→ per-step RMS vs static curve ─→ transfer_metrics.json
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tc_offline::{AudioData, RenderConfig, render};
//!
//! let input = AudioData::load("drums.wav")?;
//! let config = RenderConfig::default().with_block_size(128).with_warmup(4);
//! let output = render(&input, &config)?;
//! output.audio.write_24bit("out/wet.wav")?;
//! ```

pub mod analyze;
pub mod config;
mod error;
pub mod render;
pub mod transfer;
pub mod wav;

pub use analyze::{Analysis, AnalysisMetrics, analyze, find_best_lag};
pub use config::{ParamOverride, RenderConfig, apply_overrides, load_preset, parse_overrides};
pub use error::*;
pub use render::{RenderOutput, render};
pub use transfer::{TransferConfig, TransferReport, TransferRow, run_transfer_curve};
pub use wav::AudioData;
