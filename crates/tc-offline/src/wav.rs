//! WAV loading and writing via hound

use std::path::Path;

use tc_core::Sample;

use crate::error::{OfflineError, OfflineResult};

/// Deinterleaved audio held in memory
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    /// Sample data per channel
    pub channels: Vec<Vec<Sample>>,

    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioData {
    pub fn new(channels: Vec<Vec<Sample>>, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    /// Silent buffer
    pub fn silence(num_channels: usize, num_samples: usize, sample_rate: u32) -> Self {
        Self::new(vec![vec![0.0; num_samples]; num_channels], sample_rate)
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel (shortest channel)
    pub fn num_samples(&self) -> usize {
        self.channels.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn duration(&self) -> f64 {
        self.num_samples() as f64 / self.sample_rate.max(1) as f64
    }

    /// Load a WAV file (integer PCM of any width, or 32-bit float)
    pub fn load<P: AsRef<Path>>(path: P) -> OfflineResult<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        if !path.is_file() {
            return Err(OfflineError::InputNotFound(path_str));
        }

        let reader = hound::WavReader::open(path)
            .map_err(|e| OfflineError::ReadError(format!("{}: {}", path_str, e)))?;

        let spec = reader.spec();
        let num_channels = spec.channels as usize;
        if num_channels == 0 {
            return Err(OfflineError::ReadError(format!("{}: no channels", path_str)));
        }

        let samples: Vec<Sample> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| v as Sample))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| OfflineError::ReadError(format!("{}: {}", path_str, e)))?,
            hound::SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample - 1)) as Sample;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as Sample / max_val))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| OfflineError::ReadError(format!("{}: {}", path_str, e)))?
            }
        };

        // Deinterleave channels
        let num_samples = samples.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(num_samples); num_channels];
        for (i, sample) in samples.into_iter().take(num_samples * num_channels).enumerate() {
            channels[i % num_channels].push(sample);
        }

        log::debug!(
            "Loaded {}: {} ch, {} Hz, {} samples",
            path_str,
            num_channels,
            spec.sample_rate,
            num_samples
        );

        Ok(Self::new(channels, spec.sample_rate))
    }

    /// Write as 24-bit integer PCM
    pub fn write_24bit<P: AsRef<Path>>(&self, path: P) -> OfflineResult<()> {
        let path = path.as_ref();
        let spec = hound::WavSpec {
            channels: self.num_channels() as u16,
            sample_rate: self.sample_rate,
            bits_per_sample: 24,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path, spec)
            .map_err(|e| OfflineError::WriteError(format!("{}: {}", path.display(), e)))?;

        for i in 0..self.num_samples() {
            for channel in &self.channels {
                let s = (channel[i].clamp(-1.0, 1.0) * 8388607.0).round() as i32;
                writer.write_sample(s)?;
            }
        }

        writer.finalize()?;
        Ok(())
    }

    /// Copy into `target` channels: missing channels repeat the last source
    /// channel, surplus channels are dropped
    pub fn match_channels(&self, target: usize) -> Self {
        let num_samples = self.num_samples();
        let channels = (0..target)
            .map(|ch| {
                self.channels
                    .get(ch.min(self.num_channels().saturating_sub(1)))
                    .map(|source| source[..num_samples].to_vec())
                    .unwrap_or_else(|| vec![0.0; num_samples])
            })
            .collect();
        Self::new(channels, self.sample_rate)
    }

    /// Whether any sample is NaN or infinite
    pub fn has_non_finite(&self) -> bool {
        self.channels
            .iter()
            .any(|channel| channel.iter().any(|x| !x.is_finite()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_match_channels() {
        let mono = AudioData::new(vec![vec![0.1, 0.2, 0.3]], 48000);
        let stereo = mono.match_channels(2);
        assert_eq!(stereo.num_channels(), 2);
        assert_eq!(stereo.channels[1], vec![0.1, 0.2, 0.3]);

        let wide = AudioData::new(vec![vec![1.0; 4], vec![2.0; 4], vec![3.0; 4]], 48000);
        let narrowed = wide.match_channels(2);
        assert_eq!(narrowed.channels, vec![vec![1.0; 4], vec![2.0; 4]]);

        let empty = AudioData::new(Vec::new(), 48000);
        assert_eq!(empty.match_channels(1).channels, vec![Vec::<Sample>::new()]);
    }

    #[test]
    fn test_non_finite_detection() {
        let mut audio = AudioData::silence(2, 8, 44100);
        assert!(!audio.has_non_finite());
        audio.channels[1][3] = f64::NAN;
        assert!(audio.has_non_finite());
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let left: Vec<Sample> = (0..1000).map(|i| (i as f64 * 0.01).sin() * 0.5).collect();
        let right: Vec<Sample> = left.iter().map(|x| -x).collect();
        let audio = AudioData::new(vec![left, right], 48000);
        audio.write_24bit(&path).unwrap();

        let loaded = AudioData::load(&path).unwrap();
        assert_eq!(loaded.sample_rate, 48000);
        assert_eq!(loaded.num_channels(), 2);
        assert_eq!(loaded.num_samples(), 1000);
        for (a, b) in audio.channels[0].iter().zip(&loaded.channels[0]) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            AudioData::load("/definitely/not/here.wav"),
            Err(OfflineError::InputNotFound(_))
        ));
    }
}
