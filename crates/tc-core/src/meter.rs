//! Metering exchange and display policy
//!
//! The audio thread publishes levels into a [`MeterBridge`] with relaxed
//! stores; a display thread reads them at its own cadence. Values are
//! advisory and never feed back into processing.

use portable_atomic::{AtomicF64, Ordering};
use serde::{Deserialize, Serialize};

/// Floor for level meters (silence)
pub const METER_FLOOR_DB: f64 = -100.0;

/// Minimum movement before a meter widget repaints
const REPAINT_THRESHOLD_DB: f64 = 0.05;

// ═══════════════════════════════════════════════════════════════════════════════
// METER BRIDGE
// ═══════════════════════════════════════════════════════════════════════════════

/// Meter values shared between audio and GUI threads
#[derive(Debug)]
pub struct MeterBridge {
    gain_reduction_db: AtomicF64,
    input_peak_db: AtomicF64,
    output_peak_db: AtomicF64,
    input_level_db: AtomicF64,
    output_level_db: AtomicF64,
}

/// Plain copy of the bridge contents
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeterSnapshot {
    pub gain_reduction_db: f64,
    pub input_peak_db: f64,
    pub output_peak_db: f64,
    pub input_level_db: f64,
    pub output_level_db: f64,
}

impl MeterBridge {
    pub fn new() -> Self {
        Self {
            gain_reduction_db: AtomicF64::new(0.0),
            input_peak_db: AtomicF64::new(METER_FLOOR_DB),
            output_peak_db: AtomicF64::new(METER_FLOOR_DB),
            input_level_db: AtomicF64::new(METER_FLOOR_DB),
            output_level_db: AtomicF64::new(METER_FLOOR_DB),
        }
    }

    #[inline]
    pub fn publish_gain_reduction(&self, db: f64) {
        self.gain_reduction_db.store(db, Ordering::Relaxed);
    }

    /// Raw block peak and ballistics-smoothed level for the input
    #[inline]
    pub fn publish_input(&self, peak_db: f64, level_db: f64) {
        self.input_peak_db.store(peak_db, Ordering::Relaxed);
        self.input_level_db.store(level_db, Ordering::Relaxed);
    }

    /// Raw block peak and ballistics-smoothed level for the output
    #[inline]
    pub fn publish_output(&self, peak_db: f64, level_db: f64) {
        self.output_peak_db.store(peak_db, Ordering::Relaxed);
        self.output_level_db.store(level_db, Ordering::Relaxed);
    }

    pub fn gain_reduction_db(&self) -> f64 {
        self.gain_reduction_db.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            gain_reduction_db: self.gain_reduction_db.load(Ordering::Relaxed),
            input_peak_db: self.input_peak_db.load(Ordering::Relaxed),
            output_peak_db: self.output_peak_db.load(Ordering::Relaxed),
            input_level_db: self.input_level_db.load(Ordering::Relaxed),
            output_level_db: self.output_level_db.load(Ordering::Relaxed),
        }
    }

    /// Back to silence
    pub fn clear(&self) {
        self.publish_gain_reduction(0.0);
        self.publish_input(METER_FLOOR_DB, METER_FLOOR_DB);
        self.publish_output(METER_FLOOR_DB, METER_FLOOR_DB);
    }
}

impl Default for MeterBridge {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISPLAY POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// What a meter widget shows; each kind owns its range and text format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeterKind {
    /// Signal level, -60..0 dBFS
    InputOutput,
    /// Gain reduction, 0..30 dB
    GainReduction,
}

impl MeterKind {
    pub fn range_db(self) -> (f64, f64) {
        match self {
            Self::InputOutput => (-60.0, 0.0),
            Self::GainReduction => (0.0, 30.0),
        }
    }

    /// Value shown with no signal
    pub fn rest_db(self) -> f64 {
        self.range_db().0
    }

    pub fn clamp(self, db: f64) -> f64 {
        let (min, max) = self.range_db();
        if db.is_nan() { min } else { db.clamp(min, max) }
    }

    /// Fill fraction 0-1
    pub fn normalize(self, db: f64) -> f64 {
        let (min, max) = self.range_db();
        ((db - min) / (max - min).max(1e-4)).clamp(0.0, 1.0)
    }

    pub fn format(self, db: f64) -> String {
        match self {
            Self::GainReduction => format!("{:.1} dB", db.clamp(0.0, 99.9)),
            Self::InputOutput => {
                if db <= self.range_db().0 + 0.01 {
                    "-inf".to_string()
                } else {
                    format!("{:.1} dB", db)
                }
            }
        }
    }
}

/// Display-side state of one meter widget
#[derive(Debug, Clone)]
pub struct MeterDisplay {
    kind: MeterKind,
    displayed_db: f64,
    last_painted_db: f64,
}

impl MeterDisplay {
    pub fn new(kind: MeterKind) -> Self {
        let rest = kind.rest_db();
        Self {
            kind,
            displayed_db: rest,
            last_painted_db: rest,
        }
    }

    /// Update the value; returns true when the change warrants a repaint
    pub fn set_db(&mut self, db: f64) -> bool {
        self.displayed_db = self.kind.clamp(db);
        if (self.displayed_db - self.last_painted_db).abs() >= REPAINT_THRESHOLD_DB {
            self.last_painted_db = self.displayed_db;
            true
        } else {
            false
        }
    }

    pub fn kind(&self) -> MeterKind {
        self.kind
    }

    pub fn db(&self) -> f64 {
        self.displayed_db
    }

    pub fn fill(&self) -> f64 {
        self.kind.normalize(self.displayed_db)
    }

    pub fn text(&self) -> String {
        self.kind.format(self.displayed_db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_meter_policy() {
        let kind = MeterKind::InputOutput;
        assert_eq!(kind.format(-60.0), "-inf");
        assert_eq!(kind.format(-12.34), "-12.3 dB");
        assert_eq!(kind.normalize(-30.0), 0.5);
        assert_eq!(kind.normalize(6.0), 1.0);
        assert_eq!(kind.clamp(-120.0), -60.0);
    }

    #[test]
    fn test_gain_reduction_meter_policy() {
        let kind = MeterKind::GainReduction;
        assert_eq!(kind.format(4.56), "4.6 dB");
        assert_eq!(kind.format(150.0), "99.9 dB");
        assert_eq!(kind.format(-1.0), "0.0 dB");
        assert_eq!(kind.normalize(15.0), 0.5);
        assert_eq!(kind.rest_db(), 0.0);
    }

    #[test]
    fn test_display_repaint_throttle() {
        let mut display = MeterDisplay::new(MeterKind::GainReduction);
        assert!(!display.set_db(0.01));
        assert!(display.set_db(3.0));
        assert!(!display.set_db(3.04));
        assert!(display.set_db(3.1));
        assert_eq!(display.text(), "3.1 dB");
        assert!(display.set_db(45.0));
        assert_eq!(display.db(), 30.0);
        assert_eq!(display.fill(), 1.0);
    }

    #[test]
    fn test_bridge_publish_and_clear() {
        let bridge = MeterBridge::new();
        bridge.publish_gain_reduction(6.5);
        bridge.publish_input(-3.0, -4.0);
        bridge.publish_output(-9.0, -10.0);

        let snapshot = bridge.snapshot();
        assert_eq!(snapshot.gain_reduction_db, 6.5);
        assert_eq!(snapshot.input_peak_db, -3.0);
        assert_eq!(snapshot.output_level_db, -10.0);

        bridge.clear();
        assert_eq!(bridge.gain_reduction_db(), 0.0);
        assert_eq!(bridge.snapshot().input_level_db, METER_FLOOR_DB);
    }
}
