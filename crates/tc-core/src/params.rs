//! Parameter snapshot consumed by the audio thread once per block

use serde::{Deserialize, Serialize};

use crate::ParamId;

/// Shortest attack/release time the envelope will accept
pub const MIN_TIME_MS: f64 = 0.01;

/// Sidechain high-pass cutoff limits (0 Hz disables the filter)
pub const SIDECHAIN_HPF_MIN_HZ: f64 = 20.0;
pub const SIDECHAIN_HPF_MAX_HZ: f64 = 250.0;

/// Oversampling around the saturation stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversamplingMode {
    Off,
    #[default]
    X2,
    X4,
}

impl OversamplingMode {
    pub const ALL: [Self; 3] = [Self::Off, Self::X2, Self::X4];

    pub fn factor(self) -> usize {
        match self {
            Self::Off => 1,
            Self::X2 => 2,
            Self::X4 => 4,
        }
    }

    /// Number of cascaded half-band stages
    pub fn stages(self) -> usize {
        match self {
            Self::Off => 0,
            Self::X2 => 1,
            Self::X4 => 2,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Off => 0,
            Self::X2 => 1,
            Self::X4 => 2,
        }
    }

    /// Choice index to mode, rounding and clamping out-of-range values
    pub fn from_index(index: f64) -> Self {
        if !index.is_finite() {
            return Self::default();
        }
        match index.round().clamp(0.0, 2.0) as usize {
            0 => Self::Off,
            1 => Self::X2,
            _ => Self::X4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::X2 => "2x",
            Self::X4 => "4x",
        }
    }
}

/// Compressor parameters
///
/// A plain value passed into the processor before each block. All
/// clamping happens in [`Parameters::sanitized`]; the DSP never sees an
/// out-of-range value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub input_db: f64,
    pub threshold_db: f64,
    pub ratio: f64,
    pub attack_ms: f64,
    pub release_ms: f64,
    pub knee_db: f64,
    pub sidechain_hpf_hz: f64,
    pub sidechain_hpf_enabled: bool,
    pub makeup_db: f64,
    pub saturation_drive: f64,
    pub saturation_mix: f64,
    pub oversampling_mode: OversamplingMode,
    pub wet_dry_mix: f64,
    pub output_db: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            input_db: 0.0,
            threshold_db: -18.0,
            ratio: 4.0,
            attack_ms: 10.0,
            release_ms: 100.0,
            knee_db: 6.0,
            sidechain_hpf_hz: 100.0,
            sidechain_hpf_enabled: true,
            makeup_db: 0.0,
            saturation_drive: 0.0,
            saturation_mix: 0.0,
            oversampling_mode: OversamplingMode::X2,
            wet_dry_mix: 1.0,
            output_db: 0.0,
        }
    }
}

#[inline]
fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

impl Parameters {
    /// Clamp every field into its legal range
    ///
    /// Non-finite values fall back to the field's default.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let hpf_hz = finite_or(self.sidechain_hpf_hz, defaults.sidechain_hpf_hz);

        Self {
            input_db: finite_or(self.input_db, defaults.input_db),
            threshold_db: finite_or(self.threshold_db, defaults.threshold_db),
            ratio: finite_or(self.ratio, defaults.ratio).max(1.0),
            attack_ms: finite_or(self.attack_ms, defaults.attack_ms).max(MIN_TIME_MS),
            release_ms: finite_or(self.release_ms, defaults.release_ms).max(MIN_TIME_MS),
            knee_db: finite_or(self.knee_db, defaults.knee_db).max(0.0),
            sidechain_hpf_hz: if hpf_hz <= 0.0 {
                0.0
            } else {
                hpf_hz.clamp(SIDECHAIN_HPF_MIN_HZ, SIDECHAIN_HPF_MAX_HZ)
            },
            sidechain_hpf_enabled: self.sidechain_hpf_enabled,
            makeup_db: finite_or(self.makeup_db, defaults.makeup_db),
            saturation_drive: finite_or(self.saturation_drive, defaults.saturation_drive)
                .clamp(0.0, 1.0),
            saturation_mix: finite_or(self.saturation_mix, defaults.saturation_mix).clamp(0.0, 1.0),
            oversampling_mode: self.oversampling_mode,
            wet_dry_mix: finite_or(self.wet_dry_mix, defaults.wet_dry_mix).clamp(0.0, 1.0),
            output_db: finite_or(self.output_db, defaults.output_db),
        }
    }

    /// Whether the detector high-pass is actually in the signal path
    pub fn sidechain_hpf_active(&self) -> bool {
        self.sidechain_hpf_enabled && self.sidechain_hpf_hz > 0.0
    }

    /// Plain (denormalized) value of a layout parameter
    pub fn get(&self, id: ParamId) -> f64 {
        match id {
            ParamId::Input => self.input_db,
            ParamId::Threshold => self.threshold_db,
            ParamId::Ratio => self.ratio,
            ParamId::Attack => self.attack_ms,
            ParamId::Release => self.release_ms,
            ParamId::SidechainHpf => self.sidechain_hpf_hz,
            ParamId::Knee => self.knee_db,
            ParamId::Makeup => self.makeup_db,
            ParamId::Drive => self.saturation_drive,
            ParamId::SaturationMix => self.saturation_mix,
            ParamId::Oversampling => self.oversampling_mode.index() as f64,
            ParamId::Mix => self.wet_dry_mix,
            ParamId::Output => self.output_db,
        }
    }

    /// Set a layout parameter from its plain value
    ///
    /// Setting the sidechain cutoff also toggles the filter: the layout's
    /// "Off" position is 0 Hz.
    pub fn set(&mut self, id: ParamId, value: f64) {
        match id {
            ParamId::Input => self.input_db = value,
            ParamId::Threshold => self.threshold_db = value,
            ParamId::Ratio => self.ratio = value,
            ParamId::Attack => self.attack_ms = value,
            ParamId::Release => self.release_ms = value,
            ParamId::SidechainHpf => {
                self.sidechain_hpf_hz = value;
                self.sidechain_hpf_enabled = value > 0.0;
            }
            ParamId::Knee => self.knee_db = value,
            ParamId::Makeup => self.makeup_db = value,
            ParamId::Drive => self.saturation_drive = value,
            ParamId::SaturationMix => self.saturation_mix = value,
            ParamId::Oversampling => self.oversampling_mode = OversamplingMode::from_index(value),
            ParamId::Mix => self.wet_dry_mix = value,
            ParamId::Output => self.output_db = value,
        }
    }

    /// Set a layout parameter from a normalized 0-1 value
    pub fn set_normalized(&mut self, id: ParamId, normalized: f64) {
        self.set(id, id.denormalize(normalized));
    }

    pub fn with_input(mut self, db: f64) -> Self {
        self.input_db = db;
        self
    }

    pub fn with_threshold(mut self, db: f64) -> Self {
        self.threshold_db = db;
        self
    }

    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn with_knee(mut self, db: f64) -> Self {
        self.knee_db = db;
        self
    }

    pub fn with_times(mut self, attack_ms: f64, release_ms: f64) -> Self {
        self.attack_ms = attack_ms;
        self.release_ms = release_ms;
        self
    }

    /// Enable the detector high-pass at `hz`, or disable it with 0
    pub fn with_sidechain_hpf(mut self, hz: f64) -> Self {
        self.sidechain_hpf_hz = hz;
        self.sidechain_hpf_enabled = hz > 0.0;
        self
    }

    pub fn with_makeup(mut self, db: f64) -> Self {
        self.makeup_db = db;
        self
    }

    pub fn with_saturation(mut self, drive: f64, mix: f64) -> Self {
        self.saturation_drive = drive;
        self.saturation_mix = mix;
        self
    }

    pub fn with_oversampling(mut self, mode: OversamplingMode) -> Self {
        self.oversampling_mode = mode;
        self
    }

    pub fn with_mix(mut self, mix: f64) -> Self {
        self.wet_dry_mix = mix;
        self
    }

    pub fn with_output(mut self, db: f64) -> Self {
        self.output_db = db;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_layout() {
        let params = Parameters::default();
        for id in ParamId::ALL {
            assert_eq!(params.get(id), id.default_value(), "{:?}", id);
        }
        assert!(params.sidechain_hpf_active());
    }

    #[test]
    fn test_sanitized_clamps_bounds() {
        let params = Parameters {
            ratio: 0.5,
            attack_ms: 0.0,
            release_ms: -3.0,
            knee_db: -2.0,
            sidechain_hpf_hz: 5.0,
            saturation_drive: 1.7,
            saturation_mix: -0.2,
            wet_dry_mix: 4.0,
            ..Default::default()
        }
        .sanitized();

        assert_eq!(params.ratio, 1.0);
        assert_eq!(params.attack_ms, MIN_TIME_MS);
        assert_eq!(params.release_ms, MIN_TIME_MS);
        assert_eq!(params.knee_db, 0.0);
        assert_eq!(params.sidechain_hpf_hz, SIDECHAIN_HPF_MIN_HZ);
        assert_eq!(params.saturation_drive, 1.0);
        assert_eq!(params.saturation_mix, 0.0);
        assert_eq!(params.wet_dry_mix, 1.0);

        let high = Parameters::default().with_sidechain_hpf(900.0).sanitized();
        assert_eq!(high.sidechain_hpf_hz, SIDECHAIN_HPF_MAX_HZ);

        let off = Parameters::default().with_sidechain_hpf(-10.0).sanitized();
        assert_eq!(off.sidechain_hpf_hz, 0.0);
        assert!(!off.sidechain_hpf_active());
    }

    #[test]
    fn test_sanitized_replaces_non_finite() {
        let params = Parameters {
            threshold_db: f64::NAN,
            ratio: f64::INFINITY,
            makeup_db: f64::NEG_INFINITY,
            sidechain_hpf_hz: f64::NAN,
            ..Default::default()
        }
        .sanitized();

        let defaults = Parameters::default();
        assert_eq!(params.threshold_db, defaults.threshold_db);
        assert_eq!(params.ratio, defaults.ratio);
        assert_eq!(params.makeup_db, defaults.makeup_db);
        assert_eq!(params.sidechain_hpf_hz, defaults.sidechain_hpf_hz);
    }

    #[test]
    fn test_oversampling_mode_index() {
        assert_eq!(OversamplingMode::from_index(0.4), OversamplingMode::Off);
        assert_eq!(OversamplingMode::from_index(1.0), OversamplingMode::X2);
        assert_eq!(OversamplingMode::from_index(7.0), OversamplingMode::X4);
        assert_eq!(OversamplingMode::from_index(f64::NAN), OversamplingMode::X2);
        for mode in OversamplingMode::ALL {
            assert_eq!(OversamplingMode::from_index(mode.index() as f64), mode);
            assert_eq!(mode.factor(), 1 << mode.stages());
        }
    }

    #[test]
    fn test_partial_json_preset_fills_defaults() {
        let json = r#"{ "threshold_db": -30.0, "oversampling_mode": "x4" }"#;
        let params: Parameters = serde_json::from_str(json).unwrap();

        assert_eq!(params.threshold_db, -30.0);
        assert_eq!(params.oversampling_mode, OversamplingMode::X4);
        assert_eq!(params.ratio, 4.0);
        assert_eq!(params.wet_dry_mix, 1.0);
    }

    #[test]
    fn test_set_sidechain_toggles_enable() {
        let mut params = Parameters::default();
        params.set(ParamId::SidechainHpf, 0.0);
        assert!(!params.sidechain_hpf_enabled);
        params.set(ParamId::SidechainHpf, 120.0);
        assert!(params.sidechain_hpf_enabled);
        assert_eq!(params.sidechain_hpf_hz, 120.0);
    }
}
