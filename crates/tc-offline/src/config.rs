//! Configuration types for offline processing

use std::path::Path;

use serde::{Deserialize, Serialize};
use tc_core::{MAX_CHANNELS, ParamId, Parameters};

use crate::error::{OfflineError, OfflineResult};

/// Offline render configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Processing rate; `None` uses the input file's rate
    pub sample_rate: Option<f64>,

    /// Samples per processing block
    pub block_size: usize,

    /// Channels to render (input is channel-matched to this)
    pub channels: usize,

    /// Blocks of silence processed before the input
    pub warmup_blocks: usize,

    /// Parameter snapshot applied before rendering
    pub params: Parameters,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            block_size: 256,
            channels: 2,
            warmup_blocks: 0,
            params: Parameters::default(),
        }
    }
}

impl RenderConfig {
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = Some(sample_rate);
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_warmup(mut self, blocks: usize) -> Self {
        self.warmup_blocks = blocks;
        self
    }

    pub fn with_params(mut self, params: Parameters) -> Self {
        self.params = params;
        self
    }

    /// Reject configurations the processor cannot run
    pub fn validate(&self) -> OfflineResult<()> {
        if self.block_size == 0 {
            return Err(OfflineError::InvalidConfig(
                "block size must be positive".into(),
            ));
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(OfflineError::InvalidConfig(format!(
                "channels must be 1..={}, got {}",
                MAX_CHANNELS, self.channels
            )));
        }
        if let Some(rate) = self.sample_rate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(OfflineError::InvalidConfig(format!(
                    "invalid sample rate: {}",
                    rate
                )));
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRESETS AND OVERRIDES
// ═══════════════════════════════════════════════════════════════════════════════

/// Load a JSON parameter preset; missing fields keep their defaults
pub fn load_preset(path: &Path) -> OfflineResult<Parameters> {
    if !path.exists() {
        return Err(OfflineError::InputNotFound(path.display().to_string()));
    }
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// One `index=normalized` override
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamOverride {
    pub id: ParamId,
    pub normalized: f64,
}

/// Parse `"idx=norm,idx=norm,..."`
///
/// Empty tokens are skipped. Indices must be plain non-negative integers
/// naming a layout parameter; values must be finite and within 0..1.
pub fn parse_overrides(text: &str) -> OfflineResult<Vec<ParamOverride>> {
    let mut overrides = Vec::new();

    for token in text.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (index_text, value_text) = token
            .split_once('=')
            .map(|(i, v)| (i.trim(), v.trim()))
            .filter(|(i, v)| !i.is_empty() && !v.is_empty())
            .ok_or_else(|| {
                OfflineError::InvalidOverride(format!("{} (expected index=value)", token))
            })?;

        let id = index_text
            .parse::<usize>()
            .ok()
            .and_then(ParamId::from_index)
            .ok_or_else(|| {
                OfflineError::InvalidOverride(format!("unknown parameter index {}", index_text))
            })?;

        let normalized = value_text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && (0.0..=1.0).contains(v))
            .ok_or_else(|| {
                OfflineError::InvalidOverride(format!(
                    "normalized value {} for {} (expected 0..1)",
                    value_text,
                    id.name()
                ))
            })?;

        overrides.push(ParamOverride { id, normalized });
    }

    Ok(overrides)
}

/// Apply overrides in order on top of `params`
pub fn apply_overrides(mut params: Parameters, overrides: &[ParamOverride]) -> Parameters {
    for o in overrides {
        params.set_normalized(o.id, o.normalized);
    }
    params
}
