//! Block-wise offline render through the compressor

use tc_core::Sample;
use tc_dsp::CompressorProcessor;

use crate::config::RenderConfig;
use crate::error::OfflineResult;
use crate::wav::AudioData;

/// Rendered audio plus the final processor state worth reporting
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub audio: AudioData,
    pub final_gain_reduction_db: f64,
}

/// Render `input` through a freshly initialized processor
///
/// The input is channel-matched to `config.channels`. Warmup blocks of
/// silence run first; the final partial block is processed at its true
/// length.
pub fn render(input: &AudioData, config: &RenderConfig) -> OfflineResult<RenderOutput> {
    config.validate()?;

    let sample_rate = config
        .sample_rate
        .unwrap_or(input.sample_rate as f64);
    let block_size = config.block_size;
    let dry = input.match_channels(config.channels);
    let num_samples = dry.num_samples();

    let mut processor = CompressorProcessor::new();
    // Parameters first so initialization picks up the oversampling mode
    processor.update_parameters(&config.params);
    processor.initialize(sample_rate, block_size)?;
    processor.update_parameters(&config.params);

    let mut io: Vec<Vec<Sample>> = vec![vec![0.0; block_size]; config.channels];

    for _ in 0..config.warmup_blocks {
        for channel in io.iter_mut() {
            channel.fill(0.0);
        }
        process(&mut processor, &mut io, block_size);
    }

    let mut wet = AudioData::silence(config.channels, num_samples, sample_rate.round() as u32);

    let mut pos = 0;
    while pos < num_samples {
        let len = block_size.min(num_samples - pos);

        for (io_ch, dry_ch) in io.iter_mut().zip(&dry.channels) {
            io_ch[..len].copy_from_slice(&dry_ch[pos..pos + len]);
        }

        process(&mut processor, &mut io, len);

        for (wet_ch, io_ch) in wet.channels.iter_mut().zip(&io) {
            wet_ch[pos..pos + len].copy_from_slice(&io_ch[..len]);
        }

        pos += len;
    }

    let final_gain_reduction_db = processor.last_gain_reduction_db();
    log::info!(
        "Rendered {} samples x {} ch at {} Hz (block {}), final GR {:.2} dB",
        num_samples,
        config.channels,
        sample_rate,
        block_size,
        final_gain_reduction_db
    );

    Ok(RenderOutput {
        audio: wet,
        final_gain_reduction_db,
    })
}

fn process(processor: &mut CompressorProcessor, io: &mut [Vec<Sample>], len: usize) {
    let mut views: Vec<&mut [Sample]> = io.iter_mut().map(|ch| &mut ch[..len]).collect();
    processor.process_block(&mut views);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tc_core::Parameters;

    fn sine(len: usize, amplitude: f64) -> Vec<Sample> {
        (0..len)
            .map(|i| amplitude * (2.0 * std::f64::consts::PI * 1000.0 * i as f64 / 48000.0).sin())
            .collect()
    }

    #[test]
    fn test_render_preserves_length_with_partial_block() {
        let input = AudioData::new(vec![sine(1000, 0.5)], 48000);
        let config = RenderConfig::default().with_block_size(256).with_channels(2);

        let output = render(&input, &config).unwrap();
        assert_eq!(output.audio.num_samples(), 1000);
        assert_eq!(output.audio.num_channels(), 2);
        assert_eq!(output.audio.channels[0], output.audio.channels[1]);
        assert!(!output.audio.has_non_finite());
    }

    #[test]
    fn test_render_below_threshold_is_transparent() {
        let input = AudioData::new(vec![sine(2048, 0.01)], 48000);
        let config = RenderConfig::default()
            .with_channels(1)
            .with_warmup(4)
            .with_params(Parameters::default().with_threshold(0.0).with_knee(0.0));

        let output = render(&input, &config).unwrap();
        assert_eq!(output.audio.channels[0], input.channels[0]);
        assert_eq!(output.final_gain_reduction_db, 0.0);
    }

    #[test]
    fn test_render_reports_gain_reduction() {
        let input = AudioData::new(vec![sine(48000, 1.0)], 48000);
        let config = RenderConfig::default().with_channels(1);
        let output = render(&input, &config).unwrap();
        assert!(output.final_gain_reduction_db > 5.0);
    }

    #[test]
    fn test_render_rejects_invalid_config() {
        let input = AudioData::silence(1, 16, 48000);
        assert!(render(&input, &RenderConfig::default().with_channels(0)).is_err());
    }
}
