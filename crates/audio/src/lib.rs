//! # audio
//!
//! Audio front door for SincNet.
//!
//! This crate handles:
//! - WAV file loading and down-mixing to mono
//! - Audio resampling to the model sample rate (16kHz)
//! - Packing waveforms into `(batch, 1, samples)` tensors

pub mod batch;
pub mod loader;
pub mod resample;

pub use batch::{waveform_batch, waveform_tensor};
pub use loader::{load_waveform, load_wav, to_mono};
pub use resample::Resampler;
