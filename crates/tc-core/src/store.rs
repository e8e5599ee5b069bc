//! Lock-free parameter store shared between control and audio threads
//!
//! The control thread writes individual values; the audio thread takes a
//! [`Parameters`] snapshot at the top of each block with one relaxed load
//! per field. Cross-parameter tearing between adjacent blocks is accepted.

use portable_atomic::{AtomicBool, AtomicF64, Ordering};

use crate::{ParamId, Parameters};

/// Atomic parameter values indexed by [`ParamId`]
#[derive(Debug)]
pub struct ParamStore {
    values: [AtomicF64; ParamId::COUNT],
    sidechain_hpf_enabled: AtomicBool,
}

impl ParamStore {
    pub fn new(initial: &Parameters) -> Self {
        Self {
            values: std::array::from_fn(|i| AtomicF64::new(initial.get(ParamId::ALL[i]))),
            sidechain_hpf_enabled: AtomicBool::new(initial.sidechain_hpf_enabled),
        }
    }

    /// Plain value (thread-safe)
    #[inline]
    pub fn get(&self, id: ParamId) -> f64 {
        self.values[id.index()].load(Ordering::Relaxed)
    }

    /// Set plain value (thread-safe, call from UI)
    #[inline]
    pub fn set(&self, id: ParamId, value: f64) {
        self.values[id.index()].store(value, Ordering::Relaxed);
        if id == ParamId::SidechainHpf {
            self.sidechain_hpf_enabled.store(value > 0.0, Ordering::Relaxed);
        }
    }

    /// Set from a normalized 0-1 host value
    #[inline]
    pub fn set_normalized(&self, id: ParamId, normalized: f64) {
        self.set(id, id.denormalize(normalized));
    }

    #[inline]
    pub fn set_sidechain_hpf_enabled(&self, enabled: bool) {
        self.sidechain_hpf_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Overwrite every value from a snapshot
    pub fn store(&self, params: &Parameters) {
        for id in ParamId::ALL {
            self.values[id.index()].store(params.get(id), Ordering::Relaxed);
        }
        self.sidechain_hpf_enabled
            .store(params.sidechain_hpf_enabled, Ordering::Relaxed);
    }

    /// Read every value into a plain snapshot
    pub fn snapshot(&self) -> Parameters {
        let mut params = Parameters::default();
        for id in ParamId::ALL {
            params.set(id, self.get(id));
        }
        params.sidechain_hpf_enabled = self.sidechain_hpf_enabled.load(Ordering::Relaxed);
        params
    }
}

impl Default for ParamStore {
    fn default() -> Self {
        Self::new(&Parameters::default())
    }
}
