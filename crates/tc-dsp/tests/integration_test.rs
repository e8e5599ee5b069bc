//! Compressor Integration Tests
//!
//! Full block pipeline through `CompressorProcessor`:
//! - Gain reduction timing and settling on a loud burst
//! - Saturation with and without oversampling (no NaN/Inf, level match)
//! - Transparency below threshold
//! - Mode latching and sample rate changes

use tc_core::{OversamplingMode, Parameters, Sample};
use tc_dsp::CompressorProcessor;
use tc_dsp::gain_computer::GainComputer;

const SAMPLE_RATE: f64 = 48000.0;
const BLOCK_SIZE: usize = 256;

/// Generate test sine wave
fn generate_sine(samples: usize, freq: f64, amplitude: f64) -> Vec<Sample> {
    (0..samples)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE;
            amplitude * (2.0 * std::f64::consts::PI * freq * t).sin()
        })
        .collect()
}

/// Full-scale square wave
fn generate_square(samples: usize, freq: f64) -> Vec<Sample> {
    let half_period = (SAMPLE_RATE / freq / 2.0).round() as usize;
    (0..samples)
        .map(|i| if (i / half_period) % 2 == 0 { 1.0 } else { -1.0 })
        .collect()
}

/// Check signal has no NaN or Infinity
fn is_valid_signal(signal: &[Sample]) -> bool {
    signal.iter().all(|&x| x.is_finite())
}

/// Calculate RMS of signal
fn rms(signal: &[Sample]) -> f64 {
    let sum: f64 = signal.iter().map(|x| x * x).sum();
    (sum / signal.len() as f64).sqrt()
}

fn peak(signal: &[Sample]) -> f64 {
    signal.iter().fold(0.0_f64, |p, x| p.max(x.abs()))
}

fn processor_with(params: &Parameters) -> CompressorProcessor {
    let mut processor = CompressorProcessor::new();
    processor.update_parameters(params);
    // Initialization applies a latched oversampling mode
    processor.initialize(SAMPLE_RATE, BLOCK_SIZE).unwrap();
    processor
}

/// Render a stereo-identical signal block by block; returns (left, GR per block)
fn render(processor: &mut CompressorProcessor, input: &[Sample]) -> (Vec<Sample>, Vec<f64>) {
    let mut output = Vec::with_capacity(input.len());
    let mut reductions = Vec::new();

    for block in input.chunks(BLOCK_SIZE) {
        let mut left = block.to_vec();
        let mut right = block.to_vec();
        processor.process_block(&mut [left.as_mut_slice(), right.as_mut_slice()]);
        assert_eq!(left, right, "linked channels diverged");
        output.extend_from_slice(&left);
        reductions.push(processor.last_gain_reduction_db());
    }

    (output, reductions)
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPRESSION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_square_burst_reduction_rises_and_settles() {
    let mut processor = processor_with(&Parameters::default());

    let silence_blocks = 10;
    let mut input = vec![0.0; silence_blocks * BLOCK_SIZE];
    input.extend(generate_square(SAMPLE_RATE as usize, 1000.0));

    let (output, reductions) = render(&mut processor, &input);
    assert!(is_valid_signal(&output));

    assert!(reductions[..silence_blocks].iter().all(|&gr| gr == 0.0));
    assert!(reductions[silence_blocks] > 1.0, "no reduction in first burst block");
    assert!(reductions[silence_blocks + 1] > 5.0, "reduction too slow");

    // 0 dB RMS against -18 dB threshold at 4:1
    let expected = GainComputer::new(-18.0, 4.0, 6.0).reduction_db(0.0);
    assert!((expected - 13.5).abs() < 1e-12);
    let settled = *reductions.last().unwrap();
    assert!((settled - expected).abs() < 0.5, "settled at {} dB", settled);
}

#[test]
fn test_release_after_burst() {
    let mut processor = processor_with(&Parameters::default());

    let mut input = generate_square(SAMPLE_RATE as usize / 2, 1000.0);
    input.extend(vec![0.0; SAMPLE_RATE as usize]);

    let (_, reductions) = render(&mut processor, &input);
    let burst_end = SAMPLE_RATE as usize / 2 / BLOCK_SIZE;

    assert!(reductions[burst_end - 1] > 10.0);
    assert!(reductions.windows(2).skip(burst_end + 1).all(|w| w[1] <= w[0]));
    assert!(*reductions.last().unwrap() < 1.0);
}

#[test]
fn test_transparent_below_threshold() {
    let params = Parameters::default().with_threshold(0.0).with_knee(0.0);
    let mut processor = processor_with(&params);

    let input = generate_sine(BLOCK_SIZE * 40, 440.0, 0.1);
    let (output, reductions) = render(&mut processor, &input);

    assert!(reductions.iter().all(|&gr| gr == 0.0));
    assert_eq!(output, input);
}

#[test]
fn test_makeup_and_trims() {
    let params = Parameters::default()
        .with_threshold(0.0)
        .with_input(-6.0)
        .with_makeup(6.0)
        .with_output(-12.0);
    let mut processor = processor_with(&params);

    let input = generate_sine(BLOCK_SIZE * 8, 1000.0, 0.5);
    let (output, _) = render(&mut processor, &input);

    let change_db = 20.0 * (rms(&output) / rms(&input)).log10();
    assert!((change_db + 12.0).abs() < 1e-6, "level change {} dB", change_db);
}

// ═══════════════════════════════════════════════════════════════════════════════
// SATURATION / OVERSAMPLING
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_saturation_oversampled_level_matches_base_rate() {
    let base = Parameters::default().with_saturation(1.0, 1.0);
    let input = generate_sine(SAMPLE_RATE as usize / 2, 1000.0, 1.0);

    let mut oversampled = processor_with(&base.with_oversampling(OversamplingMode::X2));
    assert_eq!(oversampled.oversampling_mode(), OversamplingMode::X2);
    let (os_out, _) = render(&mut oversampled, &input);

    let mut plain = processor_with(&base.with_oversampling(OversamplingMode::Off));
    assert_eq!(plain.oversampling_mode(), OversamplingMode::Off);
    let (plain_out, _) = render(&mut plain, &input);

    assert!(is_valid_signal(&os_out));
    assert!(is_valid_signal(&plain_out));
    assert!(peak(&os_out) < 1.0, "peak {}", peak(&os_out));

    let tail = os_out.len() / 2..;
    let diff_db = 20.0 * (rms(&os_out[tail.clone()]) / rms(&plain_out[tail])).log10();
    assert!(diff_db.abs() < 1.0, "oversampling changed level by {} dB", diff_db);
}

#[test]
fn test_saturation_partial_mix_all_modes() {
    let input = generate_sine(BLOCK_SIZE * 50, 220.0, 0.9);

    for mode in OversamplingMode::ALL {
        let params = Parameters::default()
            .with_saturation(0.6, 0.4)
            .with_oversampling(mode)
            .with_mix(0.7);
        let mut processor = processor_with(&params);
        let (output, _) = render(&mut processor, &input);

        assert!(is_valid_signal(&output), "{:?} produced invalid signal", mode);
        assert!(rms(&output) > 0.05, "{:?} output collapsed", mode);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_various_sample_rates() {
    for sample_rate in [44100.0, 88200.0, 96000.0, 192000.0] {
        let mut processor = CompressorProcessor::new();
        processor.initialize(sample_rate, 512).unwrap();
        processor.update_parameters(
            &Parameters::default()
                .with_saturation(0.5, 1.0)
                .with_oversampling(OversamplingMode::X2),
        );

        let mut left = generate_sine(512, 1000.0, 0.8);
        let mut right = generate_sine(512, 500.0, 0.8);
        for _ in 0..20 {
            processor.process_block(&mut [left.as_mut_slice(), right.as_mut_slice()]);
        }

        assert!(is_valid_signal(&left), "invalid output at {} Hz", sample_rate);
        assert!(is_valid_signal(&right), "invalid output at {} Hz", sample_rate);
    }
}

#[test]
fn test_short_and_mono_blocks() {
    let mut processor = processor_with(&Parameters::default().with_mix(0.5));

    for len in [1, 7, 64, BLOCK_SIZE] {
        let mut mono = generate_sine(len, 1000.0, 0.9);
        processor.process_block(&mut [mono.as_mut_slice()]);
        assert!(is_valid_signal(&mono));
    }
}
