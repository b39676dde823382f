//! Integration tests: WAV on disk -> 16 kHz mono batch tensor.

use std::path::PathBuf;

use audio::{load_wav, load_waveform, waveform_batch};
use candle_core::Device;
use hound::{SampleFormat, WavSpec, WavWriter};

fn write_wav(name: &str, sample_rate: u32, channels: u16, frames: usize) -> PathBuf {
    let path = std::env::temp_dir().join(format!("sincnet-audio-{}-{name}.wav", std::process::id()));
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(&path, spec).expect("Failed to create WAV");
    for i in 0..frames {
        let v = ((i as f32 * 0.05).sin() * 16000.0) as i16;
        for _ in 0..channels {
            writer.write_sample(v).unwrap();
        }
    }
    writer.finalize().unwrap();
    path
}

#[test]
fn test_load_int16_wav() {
    let path = write_wav("int16", 16000, 1, 800);
    let buffer = load_wav(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(buffer.sample_rate, 16000);
    assert_eq!(buffer.channels, 1);
    assert_eq!(buffer.num_samples(), 800);
    assert!(buffer.samples.iter().all(|s| s.abs() <= 1.0));
}

#[test]
fn test_stereo_44k_becomes_mono_16k() {
    let path = write_wav("stereo", 44100, 2, 44100);
    let buffer = load_waveform(&path, 16000).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(buffer.channels, 1);
    assert_eq!(buffer.sample_rate, 16000);
    assert_eq!(buffer.num_samples(), 16000);

    let batch = waveform_batch(&[buffer], &Device::Cpu).unwrap();
    assert_eq!(batch.dims(), &[1, 1, 16000]);
}
