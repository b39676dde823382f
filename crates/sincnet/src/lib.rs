//! # sincnet
//!
//! SincNet feature extractor on Candle.
//!
//! This crate implements the learned time-domain front-end:
//! - Parametric band-pass sinc filter bank with trainable cutoffs
//! - Sinc convolution layer (`|conv1d|`)
//! - Three conv -> max-pool -> instance norm -> leaky ReLU stages
//!
//! Raw 16 kHz waveforms `(batch, 1, samples)` become feature maps
//! `(batch, num_conv_filters, frames)`.

pub mod filter_bank;
pub mod layers;
pub mod model;
pub mod sinc_conv;

pub use filter_bank::SincFilterBank;
pub use model::SincNet;
pub use sinc_conv::SincConv1d;
pub use sincnet_core::{FilterBankConfig, SincError, SincNetConfig, SincResult};
