//! WAV file loading.

use hound::WavReader;
use sincnet_core::{AudioBuffer, SincError, SincResult};
use std::path::Path;
use tracing::debug;

use crate::resample::Resampler;

/// Load a WAV file and return an AudioBuffer (interleaved, samples in [-1, 1]).
pub fn load_wav(path: impl AsRef<Path>) -> SincResult<AudioBuffer> {
    let path = path.as_ref();
    let reader = WavReader::open(path).map_err(|e| {
        SincError::Audio(format!("Failed to open WAV {}: {}", path.display(), e))
    })?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate as usize;
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SincError::Audio(format!("Failed to read samples: {}", e)))?,
        hound::SampleFormat::Int => {
            let max_val = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| SincError::Audio(format!("Failed to read samples: {}", e)))?
        }
    };

    debug!(
        "WAV {}: {} Гц, {} кан., {} сэмплов",
        path.display(),
        sample_rate,
        channels,
        samples.len()
    );
    Ok(AudioBuffer::new(samples, sample_rate, channels))
}

/// Convert multi-channel audio to mono by averaging channels.
pub fn to_mono(buffer: &AudioBuffer) -> AudioBuffer {
    if buffer.channels == 1 {
        return buffer.clone();
    }

    let mono_samples: Vec<f32> = buffer
        .samples
        .chunks(buffer.channels)
        .map(|chunk| chunk.iter().sum::<f32>() / chunk.len() as f32)
        .collect();

    AudioBuffer::new(mono_samples, buffer.sample_rate, 1)
}

/// Load a WAV file as a mono waveform at `target_sample_rate`.
pub fn load_waveform(path: impl AsRef<Path>, target_sample_rate: usize) -> SincResult<AudioBuffer> {
    let buffer = to_mono(&load_wav(path)?);
    Resampler::new(target_sample_rate).resample(&buffer)
}
