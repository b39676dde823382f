//! Packing waveforms into model input tensors.

use candle_core::{Device, Tensor};
use sincnet_core::{AudioBuffer, SincError, SincResult};

/// Single mono buffer -> `(1, 1, samples)`.
pub fn waveform_tensor(buffer: &AudioBuffer, device: &Device) -> SincResult<Tensor> {
    waveform_batch(std::slice::from_ref(buffer), device)
}

/// Mono buffers of equal length -> `(batch, 1, samples)`.
///
/// All buffers must share one sample rate and length. No padding: zeros
/// would shift the per-example statistics of the waveform instance norm, so a
/// padded clip would not match the same clip run alone.
pub fn waveform_batch(buffers: &[AudioBuffer], device: &Device) -> SincResult<Tensor> {
    let first = buffers
        .first()
        .ok_or_else(|| SincError::Audio("Cannot build a batch from zero waveforms".to_string()))?;

    for (i, buffer) in buffers.iter().enumerate() {
        if buffer.channels != 1 {
            return Err(SincError::Audio(format!(
                "Waveform {i} has {} channels; use to_mono() first",
                buffer.channels
            )));
        }
        if buffer.sample_rate != first.sample_rate {
            return Err(SincError::Audio(format!(
                "Waveform {i} is {} Hz, expected {} Hz",
                buffer.sample_rate, first.sample_rate
            )));
        }
        if buffer.samples.len() != first.samples.len() {
            return Err(SincError::Audio(format!(
                "Waveform {i} has {} samples, expected {}",
                buffer.samples.len(),
                first.samples.len()
            )));
        }
    }

    let len = first.samples.len();
    let data: Vec<f32> = buffers
        .iter()
        .flat_map(|b| b.samples.iter().copied())
        .collect();

    Ok(Tensor::from_vec(data, (buffers.len(), 1, len), device)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_stacks_equal_lengths() {
        let a = AudioBuffer::new(vec![1.0, 2.0, 3.0], 16000, 1);
        let b = AudioBuffer::new(vec![4.0, 5.0, 6.0], 16000, 1);
        let t = waveform_batch(&[a, b], &Device::Cpu).unwrap();

        assert_eq!(t.dims(), &[2, 1, 3]);
        assert_eq!(
            t.to_vec3::<f32>().unwrap(),
            vec![vec![vec![1.0, 2.0, 3.0]], vec![vec![4.0, 5.0, 6.0]]]
        );
    }

    #[test]
    fn test_batch_rejects_unequal_lengths() {
        // Дополнение нулями изменило бы нормировку короткого примера.
        let a = AudioBuffer::new(vec![1.0, 2.0, 3.0], 16000, 1);
        let b = AudioBuffer::new(vec![4.0], 16000, 1);
        let err = waveform_batch(&[a, b], &Device::Cpu).unwrap_err();
        assert!(err.to_string().contains("samples"));
    }

    #[test]
    fn test_single_waveform() {
        let a = AudioBuffer::new(vec![0.5; 10], 16000, 1);
        assert_eq!(waveform_tensor(&a, &Device::Cpu).unwrap().dims(), &[1, 1, 10]);
    }

    #[test]
    fn test_batch_rejects_bad_input() {
        assert!(waveform_batch(&[], &Device::Cpu).is_err());

        let stereo = AudioBuffer::new(vec![0.0; 4], 16000, 2);
        assert!(waveform_batch(&[stereo], &Device::Cpu).is_err());

        let a = AudioBuffer::new(vec![0.0; 4], 16000, 1);
        let b = AudioBuffer::new(vec![0.0; 4], 8000, 1);
        assert!(waveform_batch(&[a, b], &Device::Cpu).is_err());
    }
}
