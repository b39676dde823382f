//! Общие типы данных workspace.

use serde::{Deserialize, Serialize};

/// Буфер необработанного аудио (интерливинг каналов).
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Аудио-сэмплы, нормализованные к [-1.0, 1.0].
    pub samples: Vec<f32>,

    /// Частота дискретизации в Гц.
    pub sample_rate: usize,

    /// Количество каналов.
    pub channels: usize,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: usize, channels: usize) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Длительность в секундах.
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / (self.sample_rate * self.channels) as f32
    }

    /// Количество сэмплов на канал.
    pub fn num_samples(&self) -> usize {
        self.samples.len() / self.channels
    }
}

/// Effective cutoffs of one band-pass filter after the abs/clamp transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterBand {
    pub low_hz: f32,
    pub high_hz: f32,
}

impl FilterBand {
    /// Ширина полосы, Гц.
    pub fn bandwidth_hz(&self) -> f32 {
        self.high_hz - self.low_hz
    }

    /// Центральная частота, Гц.
    pub fn center_hz(&self) -> f32 {
        0.5 * (self.low_hz + self.high_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_buffer_duration() {
        let buffer = AudioBuffer::new(vec![0.0; 32000], 16000, 2);
        assert_eq!(buffer.num_samples(), 16000);
        assert!((buffer.duration() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_filter_band() {
        let band = FilterBand {
            low_hz: 100.0,
            high_hz: 300.0,
        };
        assert_eq!(band.bandwidth_hz(), 200.0);
        assert_eq!(band.center_hz(), 200.0);
    }
}
