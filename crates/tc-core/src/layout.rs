//! Host-visible parameter layout
//!
//! Stable indices, display names, ranges, normalisation curves and
//! value/text conversion for every automatable parameter.

use serde::{Deserialize, Serialize};

use crate::{
    OversamplingMode, SIDECHAIN_HPF_MAX_HZ, SIDECHAIN_HPF_MIN_HZ, TcError, TcResult,
};

/// Normalized span reserved for the sidechain filter "Off" position
const SIDECHAIN_OFF_ZONE: f64 = 0.08;

/// Sidechain cutoffs at or below this snap to "Off"
const SIDECHAIN_SNAP_OFF_HZ: f64 = 10.0;

/// Parameter identifier, in host index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamId {
    Input,
    Threshold,
    Ratio,
    Attack,
    Release,
    SidechainHpf,
    Knee,
    Makeup,
    Drive,
    SaturationMix,
    Oversampling,
    Mix,
    Output,
}

impl ParamId {
    pub const COUNT: usize = 13;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Input,
        Self::Threshold,
        Self::Ratio,
        Self::Attack,
        Self::Release,
        Self::SidechainHpf,
        Self::Knee,
        Self::Makeup,
        Self::Drive,
        Self::SaturationMix,
        Self::Oversampling,
        Self::Mix,
        Self::Output,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Stable identifier used in presets and automation
    pub fn key(self) -> &'static str {
        match self {
            Self::Input => "inputDb",
            Self::Threshold => "thresholdDb",
            Self::Ratio => "ratio",
            Self::Attack => "attackMs",
            Self::Release => "releaseMs",
            Self::SidechainHpf => "scHpfHz",
            Self::Knee => "kneeDb",
            Self::Makeup => "makeupDb",
            Self::Drive => "satDrive",
            Self::SaturationMix => "satMix",
            Self::Oversampling => "osMode",
            Self::Mix => "mix",
            Self::Output => "outputDb",
        }
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            Self::Input => "Input",
            Self::Threshold => "Threshold",
            Self::Ratio => "Ratio",
            Self::Attack => "Attack",
            Self::Release => "Release",
            Self::SidechainHpf => "SC HPF",
            Self::Knee => "Knee",
            Self::Makeup => "Makeup",
            Self::Drive => "Drive",
            Self::SaturationMix => "Sat Mix",
            Self::Oversampling => "Oversampling",
            Self::Mix => "Mix",
            Self::Output => "Output",
        }
    }

    /// Look up by key or display name (case-insensitive)
    pub fn from_key(text: &str) -> TcResult<Self> {
        let wanted = text.trim();
        Self::ALL
            .into_iter()
            .find(|id| id.key().eq_ignore_ascii_case(wanted) || id.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| TcError::UnknownParam(wanted.to_string()))
    }

    pub fn range(self) -> ParamRange {
        match self {
            Self::Input => ParamRange::linear(-24.0, 24.0, 0.0),
            Self::Threshold => ParamRange::linear(-60.0, 0.0, -18.0),
            Self::Ratio => ParamRange::new(1.0, 20.0, 4.0, ParamSkew::RatioSegments),
            Self::Attack => ParamRange::centred(0.1, 100.0, 10.0, 10.0),
            Self::Release => ParamRange::centred(5.0, 2000.0, 100.0, 100.0),
            Self::SidechainHpf => {
                ParamRange::new(0.0, SIDECHAIN_HPF_MAX_HZ, 100.0, ParamSkew::SidechainHpf)
            }
            Self::Knee => ParamRange::linear(0.0, 12.0, 6.0),
            Self::Makeup => ParamRange::linear(-12.0, 24.0, 0.0),
            Self::Drive => ParamRange::centred(0.0, 1.0, 0.0, 0.2),
            Self::SaturationMix => ParamRange::linear(0.0, 1.0, 0.0),
            Self::Oversampling => ParamRange::new(
                0.0,
                2.0,
                OversamplingMode::X2.index() as f64,
                ParamSkew::Choice(OversamplingMode::ALL.len()),
            ),
            Self::Mix => ParamRange::linear(0.0, 1.0, 1.0),
            Self::Output => ParamRange::linear(-12.0, 12.0, 0.0),
        }
    }

    pub fn default_value(self) -> f64 {
        self.range().default
    }

    pub fn default_normalized(self) -> f64 {
        self.normalize(self.default_value())
    }

    pub fn normalize(self, value: f64) -> f64 {
        self.range().normalize(value)
    }

    pub fn denormalize(self, normalized: f64) -> f64 {
        self.range().denormalize(normalized)
    }

    /// Value to display text
    pub fn format(self, value: f64) -> String {
        match self {
            Self::Input | Self::Threshold | Self::Knee | Self::Makeup | Self::Output => {
                format!("{:.1} dB", value)
            }
            Self::Ratio => format!("{:.2}:1", value),
            Self::Attack => format!("{:.2} ms", value),
            Self::Release => format!("{:.1} ms", value),
            Self::SidechainHpf => {
                if value <= 0.0 {
                    "Off".to_string()
                } else {
                    format!("{} Hz", value.round() as i64)
                }
            }
            Self::Drive | Self::SaturationMix | Self::Mix => format!("{:.0} %", value * 100.0),
            Self::Oversampling => OversamplingMode::from_index(value).label().to_string(),
        }
    }

    /// Display text to value, snapped into the legal range
    pub fn parse(self, text: &str) -> TcResult<f64> {
        let trimmed = text.trim();
        let invalid = || TcError::InvalidParam(format!("{}: '{}'", self.name(), text));

        match self {
            Self::SidechainHpf => {
                if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("off") {
                    return Ok(0.0);
                }
                let hz = leading_number(trimmed).ok_or_else(invalid)?;
                if hz <= 0.0 {
                    Ok(0.0)
                } else {
                    Ok(hz.clamp(SIDECHAIN_HPF_MIN_HZ, SIDECHAIN_HPF_MAX_HZ))
                }
            }
            Self::Oversampling => OversamplingMode::ALL
                .into_iter()
                .find(|mode| mode.label().eq_ignore_ascii_case(trimmed))
                .map(|mode| mode.index() as f64)
                .or_else(|| leading_number(trimmed).map(|index| self.range().snap(index)))
                .ok_or_else(invalid),
            Self::Drive | Self::SaturationMix | Self::Mix => {
                let percent = leading_number(trimmed).ok_or_else(invalid)?;
                Ok(self.range().snap(percent / 100.0))
            }
            _ => {
                let value = leading_number(trimmed).ok_or_else(invalid)?;
                Ok(self.range().snap(value))
            }
        }
    }
}

/// Parse the numeric prefix of "12.5 dB", "4.00:1", "-inf" style text
fn leading_number(text: &str) -> Option<f64> {
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || ((c == '-' || c == '+') && i == 0)))
        .map_or(text.len(), |(i, _)| i);
    text[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Value range, default and normalisation curve of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub skew: ParamSkew,
}

/// Normalisation curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamSkew {
    Linear,
    /// Power curve placing the given value at normalized 0.5
    Centre(f64),
    /// 1..4 on the lower half, 4..20 on the upper half
    RatioSegments,
    /// Off zone near zero, then logarithmic 20..250 Hz
    SidechainHpf,
    /// Discrete choice with the given number of entries
    Choice(usize),
}

impl ParamRange {
    pub fn new(min: f64, max: f64, default: f64, skew: ParamSkew) -> Self {
        Self {
            min,
            max,
            default,
            skew,
        }
    }

    pub fn linear(min: f64, max: f64, default: f64) -> Self {
        Self::new(min, max, default, ParamSkew::Linear)
    }

    pub fn centred(min: f64, max: f64, default: f64, centre: f64) -> Self {
        Self::new(min, max, default, ParamSkew::Centre(centre))
    }

    #[inline]
    fn centre_exponent(&self, centre: f64) -> f64 {
        0.5_f64.ln() / ((centre - self.min) / (self.max - self.min)).ln()
    }

    /// Denormalize a 0-1 value to actual value
    pub fn denormalize(&self, normalized: f64) -> f64 {
        let t = if normalized.is_finite() {
            normalized.clamp(0.0, 1.0)
        } else {
            0.0
        };

        match self.skew {
            ParamSkew::Linear => self.min + t * (self.max - self.min),
            ParamSkew::Centre(centre) => {
                let proportion = if t > 0.0 {
                    (t.ln() / self.centre_exponent(centre)).exp()
                } else {
                    0.0
                };
                self.min + (self.max - self.min) * proportion
            }
            ParamSkew::RatioSegments => {
                if t <= 0.5 {
                    1.0 + (t / 0.5) * 3.0
                } else {
                    4.0 + ((t - 0.5) / 0.5) * 16.0
                }
            }
            ParamSkew::SidechainHpf => {
                if t <= SIDECHAIN_OFF_ZONE {
                    0.0
                } else {
                    let mapped = (t - SIDECHAIN_OFF_ZONE) / (1.0 - SIDECHAIN_OFF_ZONE);
                    SIDECHAIN_HPF_MIN_HZ
                        * (SIDECHAIN_HPF_MAX_HZ / SIDECHAIN_HPF_MIN_HZ).powf(mapped)
                }
            }
            ParamSkew::Choice(count) => {
                let last = count.saturating_sub(1) as f64;
                (t * last).round()
            }
        }
    }

    /// Normalize an actual value to 0-1
    pub fn normalize(&self, value: f64) -> f64 {
        match self.skew {
            ParamSkew::Linear => {
                let clamped = value.clamp(self.min, self.max);
                (clamped - self.min) / (self.max - self.min)
            }
            ParamSkew::Centre(centre) => {
                let clamped = value.clamp(self.min, self.max);
                let proportion = (clamped - self.min) / (self.max - self.min);
                if proportion > 0.0 {
                    proportion.powf(self.centre_exponent(centre))
                } else {
                    0.0
                }
            }
            ParamSkew::RatioSegments => {
                let v = value.clamp(1.0, 20.0);
                if v <= 4.0 {
                    ((v - 1.0) / 3.0) * 0.5
                } else {
                    0.5 + ((v - 4.0) / 16.0) * 0.5
                }
            }
            ParamSkew::SidechainHpf => {
                if value <= 0.0 {
                    return 0.0;
                }
                let v = value.clamp(SIDECHAIN_HPF_MIN_HZ, SIDECHAIN_HPF_MAX_HZ);
                let mapped = (v / SIDECHAIN_HPF_MIN_HZ).ln()
                    / (SIDECHAIN_HPF_MAX_HZ / SIDECHAIN_HPF_MIN_HZ).ln();
                SIDECHAIN_OFF_ZONE + mapped * (1.0 - SIDECHAIN_OFF_ZONE)
            }
            ParamSkew::Choice(count) => {
                let last = count.saturating_sub(1) as f64;
                if last <= 0.0 {
                    0.0
                } else {
                    value.round().clamp(0.0, last) / last
                }
            }
        }
    }

    /// Snap an arbitrary value to the nearest legal one
    pub fn snap(&self, value: f64) -> f64 {
        match self.skew {
            ParamSkew::SidechainHpf => {
                if value <= SIDECHAIN_SNAP_OFF_HZ {
                    0.0
                } else {
                    value.clamp(SIDECHAIN_HPF_MIN_HZ, SIDECHAIN_HPF_MAX_HZ)
                }
            }
            ParamSkew::Choice(_) => value.round().clamp(self.min, self.max),
            _ => value.clamp(self.min, self.max),
        }
    }
}
