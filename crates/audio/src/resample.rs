//! Audio resampling.

use rubato::{FftFixedInOut, Resampler as RubatoResampler};
use sincnet_core::{AudioBuffer, SUPPORTED_SAMPLE_RATE, SincError, SincResult};
use tracing::debug;

/// Requested input chunk; rubato rounds it to a multiple of the rate ratio.
const CHUNK_SIZE: usize = 1024;

/// Audio resampler for converting sample rates.
pub struct Resampler {
    target_sample_rate: usize,
}

impl Resampler {
    /// Create a new resampler with target sample rate.
    pub fn new(target_sample_rate: usize) -> Self {
        Self { target_sample_rate }
    }

    pub fn target_sample_rate(&self) -> usize {
        self.target_sample_rate
    }

    /// Resample a mono buffer to the target sample rate.
    ///
    /// Output length is `ceil(len · target / source)`; the filter delay of the
    /// FFT resampler is trimmed so the signal stays aligned.
    pub fn resample(&self, buffer: &AudioBuffer) -> SincResult<AudioBuffer> {
        if buffer.sample_rate == self.target_sample_rate {
            return Ok(buffer.clone());
        }
        if buffer.channels != 1 {
            return Err(SincError::Audio(
                "Resampling requires mono audio. Use to_mono() first.".to_string(),
            ));
        }
        if buffer.sample_rate == 0 || self.target_sample_rate == 0 {
            return Err(SincError::Audio(format!(
                "Cannot resample {} Hz -> {} Hz",
                buffer.sample_rate, self.target_sample_rate
            )));
        }

        let mut resampler = FftFixedInOut::<f32>::new(
            buffer.sample_rate,
            self.target_sample_rate,
            CHUNK_SIZE,
            1,
        )
        .map_err(|e| SincError::Audio(format!("Failed to create resampler: {}", e)))?;

        let ratio = self.target_sample_rate as f64 / buffer.sample_rate as f64;
        let expected = (buffer.samples.len() as f64 * ratio).ceil() as usize;
        let delay = resampler.output_delay();
        let chunk_in = resampler.input_frames_next();

        let mut output = Vec::with_capacity(expected + delay + CHUNK_SIZE);
        let mut pos = 0;
        // Хвост дополняется нулями, пока не вытолкнем задержку фильтра.
        while output.len() < delay + expected {
            let mut chunk = vec![0.0f32; chunk_in];
            if pos < buffer.samples.len() {
                let end = (pos + chunk_in).min(buffer.samples.len());
                chunk[..end - pos].copy_from_slice(&buffer.samples[pos..end]);
            }
            pos += chunk_in;

            let out = resampler
                .process(&[chunk], None)
                .map_err(|e| SincError::Audio(format!("Resampling failed: {}", e)))?;
            output.extend_from_slice(&out[0]);
        }

        let output: Vec<f32> = output.into_iter().skip(delay).take(expected).collect();
        debug!(
            "Resampler: {} Гц -> {} Гц, {} -> {} сэмплов",
            buffer.sample_rate,
            self.target_sample_rate,
            buffer.samples.len(),
            output.len()
        );

        Ok(AudioBuffer::new(output, self.target_sample_rate, 1))
    }
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new(SUPPORTED_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: usize, len: usize) -> AudioBuffer {
        let samples = (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect();
        AudioBuffer::new(samples, sample_rate, 1)
    }

    fn zero_crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count()
    }

    #[test]
    fn test_resampler_no_change() {
        let buffer = AudioBuffer::new(vec![0.0; 1024], 16000, 1);
        let resampler = Resampler::default();
        let result = resampler.resample(&buffer).unwrap();

        assert_eq!(result.sample_rate, 16000);
        assert_eq!(result.samples.len(), buffer.samples.len());
    }

    #[test]
    fn test_downsample_length_and_pitch() {
        let buffer = sine(440.0, 48000, 48000);
        let result = Resampler::new(16000).resample(&buffer).unwrap();

        assert_eq!(result.sample_rate, 16000);
        assert_eq!(result.samples.len(), 16000);
        // 440 Гц за секунду: ~880 пересечений нуля.
        let crossings = zero_crossings(&result.samples);
        assert!((860..=900).contains(&crossings), "crossings = {crossings}");
    }

    #[test]
    fn test_upsample_short_buffer() {
        let buffer = sine(200.0, 8000, 100);
        let result = Resampler::new(16000).resample(&buffer).unwrap();
        assert_eq!(result.samples.len(), 200);
    }

    #[test]
    fn test_stereo_rejected() {
        let buffer = AudioBuffer::new(vec![0.0; 200], 44100, 2);
        assert!(Resampler::new(16000).resample(&buffer).is_err());
    }
}
