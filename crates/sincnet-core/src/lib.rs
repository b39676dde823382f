//! # sincnet-core
//!
//! Базовые типы, конфигурация и ошибки для SincNet.
//!
//! - Конфигурация пайплайна [`SincNetConfig`] и sinc-слоя [`FilterBankConfig`]
//! - Унифицированная обработка ошибок через [`SincError`]
//! - Арифметика длин свёрток и пулинга ([`shape`])
//! - Выбор вычислительного устройства ([`device`])

pub mod config;
pub mod debug;
pub mod device;
pub mod error;
pub mod shape;
pub mod types;

pub use config::{FilterBankConfig, SUPPORTED_SAMPLE_RATE, SincNetConfig};
pub use error::{SincError, SincResult};
pub use shape::{LayerGeometry, conv_output_len, pool_output_len};
pub use types::{AudioBuffer, FilterBand};
