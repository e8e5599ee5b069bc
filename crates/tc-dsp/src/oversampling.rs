//! Polyphase IIR half-band oversampling
//!
//! Each 2x stage is a pair of allpass chains (even/odd polyphase branches)
//! designed as an elliptic half-band. 4x cascades a steep base-rate stage
//! with a relaxed second stage running at the doubled rate.
//!
//! All buffers are sized in [`Oversampler::new`]; [`Oversampler::process`]
//! never allocates. Blocks longer than the configured maximum are processed
//! in configured-size chunks.

use std::f64::consts::PI;

use tc_core::{MAX_CHANNELS, OversamplingMode, Sample};

use crate::{Processor, flush_denormal};

/// Allpass coefficients per half-band stage, upper bound
pub const MAX_COEFFICIENTS: usize = 8;

/// Base-rate stage: 8 coefficients, transition 0.05 (~110 dB stop band)
const FIRST_STAGE: (usize, f64) = (8, 0.05);

/// Doubled-rate stage of the 4x cascade: 4 coefficients, transition 0.2
const SECOND_STAGE: (usize, f64) = (4, 0.2);

// ═══════════════════════════════════════════════════════════════════════════════
// HALF-BAND DESIGN
// ═══════════════════════════════════════════════════════════════════════════════

/// Allpass coefficients of an elliptic half-band filter
///
/// `transition` is the normalized transition bandwidth (0 < t < 0.5).
/// Coefficients come out ascending in (0, 1); even indices belong to the
/// even branch, odd indices to the odd branch.
pub fn design_halfband(count: usize, transition: f64) -> HalfbandCoefficients {
    let count = count.clamp(1, MAX_COEFFICIENTS);
    let (k, q) = transition_params(transition.clamp(1e-4, 0.4999));
    let order = 2 * count + 1;

    let mut values = [0.0; MAX_COEFFICIENTS];
    for (index, value) in values.iter_mut().enumerate().take(count) {
        *value = allpass_coefficient(index, k, q, order);
    }

    HalfbandCoefficients { values, len: count }
}

/// Elliptic modulus `k` and nome `q` for a transition bandwidth
fn transition_params(transition: f64) -> (f64, f64) {
    let k = ((1.0 - 2.0 * transition) * PI / 4.0).tan().powi(2);
    let kk_sqrt = (1.0 - k * k).powf(0.25);
    let e = 0.5 * (1.0 - kk_sqrt) / (1.0 + kk_sqrt);
    let e4 = e.powi(4);
    let q = e * (1.0 + e4 * (2.0 + e4 * (15.0 + 150.0 * e4)));
    (k, q)
}

fn allpass_coefficient(index: usize, k: f64, q: f64, order: usize) -> f64 {
    let c = (index + 1) as f64;
    let order = order as f64;

    let num = theta_series(|i| {
        let power = (i * (i + 1)) as i32;
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        q.powi(power) * ((2 * i + 1) as f64 * c * PI / order).sin() * sign
    }, 0) * q.powf(0.25);

    let den = theta_series(|i| {
        let power = (i * i) as i32;
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        q.powi(power) * ((2 * i) as f64 * c * PI / order).cos() * sign
    }, 1) + 0.5;

    let ww = num / den;
    let ww2 = ww * ww;
    let x = ((1.0 - ww2 * k) * (1.0 - ww2 / k)).sqrt() / (1.0 + ww2);
    (1.0 - x) / (1.0 + x)
}

/// Sum terms from `start` until they drop below 1e-100
fn theta_series(term: impl Fn(usize) -> f64, start: usize) -> f64 {
    let mut acc = 0.0;
    let mut i = start;
    loop {
        let value = term(i);
        acc += value;
        i += 1;
        if value.abs() <= 1e-100 || i > 64 {
            return acc;
        }
    }
}

/// Fixed-capacity coefficient set for one half-band stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HalfbandCoefficients {
    values: [f64; MAX_COEFFICIENTS],
    len: usize,
}

impl HalfbandCoefficients {
    pub fn as_slice(&self) -> &[f64] {
        &self.values[..self.len]
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POLYPHASE BRANCHES
// ═══════════════════════════════════════════════════════════════════════════════

/// Interleaved even/odd allpass chains
///
/// Section `i`: `y = (x - y[i]) * a[i] + x[i]`.
#[derive(Debug, Clone)]
struct AllpassBranches {
    coeffs: HalfbandCoefficients,
    x: [f64; MAX_COEFFICIENTS],
    y: [f64; MAX_COEFFICIENTS],
}

impl AllpassBranches {
    fn new(coeffs: HalfbandCoefficients) -> Self {
        Self {
            coeffs,
            x: [0.0; MAX_COEFFICIENTS],
            y: [0.0; MAX_COEFFICIENTS],
        }
    }

    #[inline]
    fn process(&mut self, mut even: f64, mut odd: f64) -> (f64, f64) {
        for (i, &a) in self.coeffs.as_slice().iter().enumerate() {
            let input = if i % 2 == 0 { even } else { odd };
            let output = flush_denormal((input - self.y[i]) * a + self.x[i]);
            self.x[i] = input;
            self.y[i] = output;
            if i % 2 == 0 {
                even = output;
            } else {
                odd = output;
            }
        }
        (even, odd)
    }

    fn reset(&mut self) {
        self.x = [0.0; MAX_COEFFICIENTS];
        self.y = [0.0; MAX_COEFFICIENTS];
    }
}

/// One sample in, two samples out
#[derive(Debug, Clone)]
pub struct HalfbandUpsampler {
    branches: AllpassBranches,
}

impl HalfbandUpsampler {
    pub fn new(coeffs: HalfbandCoefficients) -> Self {
        Self {
            branches: AllpassBranches::new(coeffs),
        }
    }

    /// `output.len()` must be `2 * input.len()`
    #[inline]
    pub fn process_block(&mut self, input: &[Sample], output: &mut [Sample]) {
        debug_assert_eq!(output.len(), 2 * input.len());
        for (&x, pair) in input.iter().zip(output.chunks_exact_mut(2)) {
            let (even, odd) = self.branches.process(x, x);
            pair[0] = even;
            pair[1] = odd;
        }
    }

    pub fn reset(&mut self) {
        self.branches.reset();
    }
}

/// Two samples in, one sample out
#[derive(Debug, Clone)]
pub struct HalfbandDownsampler {
    branches: AllpassBranches,
}

impl HalfbandDownsampler {
    pub fn new(coeffs: HalfbandCoefficients) -> Self {
        Self {
            branches: AllpassBranches::new(coeffs),
        }
    }

    /// `input.len()` must be `2 * output.len()`
    #[inline]
    pub fn process_block(&mut self, input: &[Sample], output: &mut [Sample]) {
        debug_assert_eq!(input.len(), 2 * output.len());
        for (pair, y) in input.chunks_exact(2).zip(output.iter_mut()) {
            let (even, odd) = self.branches.process(pair[1], pair[0]);
            *y = 0.5 * (even + odd);
        }
    }

    pub fn reset(&mut self) {
        self.branches.reset();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OVERSAMPLER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct HalfbandStage {
    up: HalfbandUpsampler,
    down: HalfbandDownsampler,
}

impl HalfbandStage {
    fn new((count, transition): (usize, f64)) -> Self {
        let coeffs = design_halfband(count, transition);
        Self {
            up: HalfbandUpsampler::new(coeffs),
            down: HalfbandDownsampler::new(coeffs),
        }
    }
}

/// Per-channel stage cascade plus one scratch buffer per stage
#[derive(Debug, Clone)]
struct ChannelChain {
    stages: Vec<HalfbandStage>,
    /// `buffers[s]` holds `max_block << (s + 1)` samples
    buffers: Vec<Vec<Sample>>,
}

impl ChannelChain {
    fn new(mode: OversamplingMode, max_block: usize) -> Self {
        let designs = [FIRST_STAGE, SECOND_STAGE];
        let stages: Vec<HalfbandStage> = designs
            .iter()
            .take(mode.stages())
            .map(|&design| HalfbandStage::new(design))
            .collect();
        let buffers = (0..stages.len())
            .map(|s| vec![0.0; max_block << (s + 1)])
            .collect();
        Self { stages, buffers }
    }

    /// Up, `f` at the top rate, down. `block.len()` ≤ configured maximum.
    fn process<F>(&mut self, block: &mut [Sample], f: &mut F)
    where
        F: FnMut(&mut [Sample]),
    {
        let n = block.len();
        let depth = self.stages.len();

        self.stages[0].up.process_block(block, &mut self.buffers[0][..2 * n]);
        for s in 1..depth {
            let (lower, upper) = self.buffers.split_at_mut(s);
            self.stages[s]
                .up
                .process_block(&lower[s - 1][..n << s], &mut upper[0][..n << (s + 1)]);
        }

        f(&mut self.buffers[depth - 1][..n << depth]);

        for s in (1..depth).rev() {
            let (lower, upper) = self.buffers.split_at_mut(s);
            self.stages[s]
                .down
                .process_block(&upper[0][..n << (s + 1)], &mut lower[s - 1][..n << s]);
        }
        self.stages[0].down.process_block(&self.buffers[0][..2 * n], block);
    }

    fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.up.reset();
            stage.down.reset();
        }
    }
}

/// Upsample → process → downsample for up to [`MAX_CHANNELS`] channels
#[derive(Debug, Clone)]
pub struct Oversampler {
    mode: OversamplingMode,
    max_block: usize,
    chains: Vec<ChannelChain>,
}

impl Oversampler {
    pub fn new(mode: OversamplingMode, channels: usize, max_block: usize) -> Self {
        let max_block = max_block.max(1);
        Self {
            mode,
            max_block,
            chains: (0..channels.min(MAX_CHANNELS))
                .map(|_| ChannelChain::new(mode, max_block))
                .collect(),
        }
    }

    pub fn mode(&self) -> OversamplingMode {
        self.mode
    }

    pub fn factor(&self) -> usize {
        self.mode.factor()
    }

    pub fn max_block(&self) -> usize {
        self.max_block
    }

    /// Run `f` on each channel at the oversampled rate
    ///
    /// With [`OversamplingMode::Off`], `f` sees the base-rate channel.
    /// Channels without a configured chain are left untouched.
    pub fn process<F>(&mut self, channels: &mut [&mut [Sample]], mut f: F)
    where
        F: FnMut(&mut [Sample]),
    {
        if self.mode == OversamplingMode::Off {
            for channel in channels.iter_mut() {
                f(channel);
            }
            return;
        }

        for (channel, chain) in channels.iter_mut().zip(self.chains.iter_mut()) {
            for chunk in channel.chunks_mut(self.max_block) {
                chain.process(chunk, &mut f);
            }
        }
    }
}

impl Processor for Oversampler {
    fn reset(&mut self) {
        for chain in &mut self.chains {
            chain.reset();
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MODE LATCHING
// ═══════════════════════════════════════════════════════════════════════════════

/// Mode in effect, and any change waiting for reinitialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OversamplingState {
    Active(OversamplingMode),
    Pending {
        active: OversamplingMode,
        requested: OversamplingMode,
    },
}

impl OversamplingState {
    pub fn active(self) -> OversamplingMode {
        match self {
            Self::Active(mode) | Self::Pending { active: mode, .. } => mode,
        }
    }

    /// Mode the next reinitialization will use
    pub fn target(self) -> OversamplingMode {
        match self {
            Self::Active(mode) | Self::Pending { requested: mode, .. } => mode,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// Both oversampling paths plus the latched mode
///
/// Mode changes requested mid-stream are recorded and only take effect in
/// [`OversamplingContext::configure`], called from stream initialization.
#[derive(Debug, Clone)]
pub struct OversamplingContext {
    x2: Oversampler,
    x4: Oversampler,
    state: OversamplingState,
}

impl OversamplingContext {
    pub fn new(mode: OversamplingMode, channels: usize, max_block: usize) -> Self {
        Self {
            x2: Oversampler::new(OversamplingMode::X2, channels, max_block),
            x4: Oversampler::new(OversamplingMode::X4, channels, max_block),
            state: OversamplingState::Active(mode),
        }
    }

    pub fn state(&self) -> OversamplingState {
        self.state
    }

    pub fn active_mode(&self) -> OversamplingMode {
        self.state.active()
    }

    /// Record a requested mode; never touches filter memory
    pub fn request_mode(&mut self, requested: OversamplingMode) {
        let active = self.state.active();
        self.state = if requested == active {
            OversamplingState::Active(active)
        } else {
            OversamplingState::Pending { active, requested }
        };
    }

    /// Resize both paths and apply any pending mode (allocates)
    pub fn configure(&mut self, channels: usize, max_block: usize) {
        if let OversamplingState::Pending { active, requested } = self.state {
            log::info!(
                "Oversampling mode change applied: {} -> {}",
                active.label(),
                requested.label()
            );
        }

        self.x2 = Oversampler::new(OversamplingMode::X2, channels, max_block);
        self.x4 = Oversampler::new(OversamplingMode::X4, channels, max_block);
        self.state = OversamplingState::Active(self.state.target());
    }

    /// Oversampler for the active mode, `None` when off
    pub fn active_mut(&mut self) -> Option<&mut Oversampler> {
        match self.state.active() {
            OversamplingMode::Off => None,
            OversamplingMode::X2 => Some(&mut self.x2),
            OversamplingMode::X4 => Some(&mut self.x4),
        }
    }
}

impl Processor for OversamplingContext {
    fn reset(&mut self) {
        self.x2.reset();
        self.x4.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const SAMPLE_RATE: f64 = 48000.0;

    fn sine(freq: f64, sample_rate: f64, len: usize) -> Vec<Sample> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate).sin())
            .collect()
    }

    fn rms(buffer: &[Sample]) -> f64 {
        (buffer.iter().map(|x| x * x).sum::<f64>() / buffer.len() as f64).sqrt()
    }

    /// Single-bin DFT magnitude (amplitude scale)
    fn bin_magnitude(buffer: &[Sample], freq: f64, sample_rate: f64) -> f64 {
        let (mut re, mut im) = (0.0, 0.0);
        for (i, &x) in buffer.iter().enumerate() {
            let phase = 2.0 * PI * freq * i as f64 / sample_rate;
            re += x * phase.cos();
            im += x * phase.sin();
        }
        2.0 * re.hypot(im) / buffer.len() as f64
    }

    fn round_trip(mode: OversamplingMode, input: &[Sample], max_block: usize) -> Vec<Sample> {
        let mut oversampler = Oversampler::new(mode, 1, max_block);
        let mut buffer = input.to_vec();
        oversampler.process(&mut [buffer.as_mut_slice()], |_| {});
        buffer
    }

    #[test]
    fn test_coefficients_ascending_in_unit_interval() {
        for (count, transition) in [FIRST_STAGE, SECOND_STAGE] {
            let coeffs = design_halfband(count, transition);
            let values = coeffs.as_slice();
            assert_eq!(values.len(), count);
            assert!(values.windows(2).all(|w| w[0] < w[1]));
            assert!(values.iter().all(|&a| a > 0.0 && a < 1.0));
        }

        let steep = design_halfband(8, 0.05);
        assert_abs_diff_eq!(steep.as_slice()[0], 0.035_832_788, epsilon = 1e-6);
        assert_abs_diff_eq!(steep.as_slice()[7], 0.941_503_094, epsilon = 1e-6);
    }

    #[test]
    fn test_dc_unity_gain() {
        for mode in [OversamplingMode::X2, OversamplingMode::X4] {
            let output = round_trip(mode, &vec![1.0; 3000], 512);
            assert_abs_diff_eq!(output[2999], 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_sine_level_preserved() {
        let input = sine(1000.0, SAMPLE_RATE, 19200);
        for mode in [OversamplingMode::X2, OversamplingMode::X4] {
            let output = round_trip(mode, &input, 256);
            let ratio_db = 20.0 * (rms(&output[4800..14400]) / rms(&input[4800..14400])).log10();
            assert!(ratio_db.abs() < 0.1, "{:?}: {} dB", mode, ratio_db);
        }
    }

    #[test]
    fn test_upsampler_rejects_image() {
        let input = sine(1000.0, SAMPLE_RATE, 8000);
        let mut upsampler = HalfbandUpsampler::new(design_halfband(8, 0.05));
        let mut output = vec![0.0; 16000];
        upsampler.process_block(&input, &mut output);

        // 100 ms window at 96 kHz after the filter has settled
        let window = &output[4000..13600];
        let fundamental = bin_magnitude(window, 1000.0, 2.0 * SAMPLE_RATE);
        let image = bin_magnitude(window, 47000.0, 2.0 * SAMPLE_RATE);
        assert_abs_diff_eq!(fundamental, 1.0, epsilon = 1e-6);
        assert!(20.0 * (image / fundamental).log10() < -80.0);
    }

    #[test]
    fn test_oversampled_callback_sees_expanded_block() {
        let mut oversampler = Oversampler::new(OversamplingMode::X4, 2, 128);
        let mut left = vec![0.0; 100];
        let mut right = vec![0.0; 100];
        let mut lengths = Vec::new();
        oversampler.process(&mut [left.as_mut_slice(), right.as_mut_slice()], |block| {
            lengths.push(block.len())
        });
        assert_eq!(lengths, vec![400, 400]);
    }

    #[test]
    fn test_oversize_block_processed_in_chunks() {
        let input = sine(3000.0, SAMPLE_RATE, 300);

        let whole = round_trip(OversamplingMode::X2, &input, 64);

        let mut chunked = Oversampler::new(OversamplingMode::X2, 1, 64);
        let mut pieces = input.clone();
        for chunk in pieces.chunks_mut(64) {
            chunked.process(&mut [chunk], |_| {});
        }

        assert_eq!(whole, pieces);
    }

    #[test]
    fn test_off_mode_runs_at_base_rate() {
        let mut oversampler = Oversampler::new(OversamplingMode::Off, 2, 64);
        let mut buffer = vec![0.5; 32];
        oversampler.process(&mut [buffer.as_mut_slice()], |block| {
            assert_eq!(block.len(), 32);
            block.iter_mut().for_each(|x| *x *= 2.0);
        });
        assert!(buffer.iter().all(|&x| x == 1.0));
    }

    #[test]
    fn test_mode_change_latched_until_configure() {
        let mut context = OversamplingContext::new(OversamplingMode::X2, 2, 256);
        assert_eq!(context.state(), OversamplingState::Active(OversamplingMode::X2));

        context.request_mode(OversamplingMode::X4);
        assert_eq!(
            context.state(),
            OversamplingState::Pending {
                active: OversamplingMode::X2,
                requested: OversamplingMode::X4,
            }
        );
        assert_eq!(context.active_mode(), OversamplingMode::X2);
        assert_eq!(context.active_mut().map(|os| os.factor()), Some(2));

        // Asking for the active mode again cancels the request
        context.request_mode(OversamplingMode::X2);
        assert!(!context.state().is_pending());

        context.request_mode(OversamplingMode::Off);
        context.configure(2, 512);
        assert_eq!(context.state(), OversamplingState::Active(OversamplingMode::Off));
        assert!(context.active_mut().is_none());
    }
}
