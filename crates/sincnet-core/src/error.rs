//! Error types for SincNet.

use thiserror::Error;

/// Main error type for SincNet operations.
#[derive(Error, Debug)]
pub enum SincError {
    /// Invalid configuration, detected at construction time.
    #[error("Config error: {0}")]
    Config(String),

    /// Input tensor rank, channel count or length does not fit the model.
    #[error("Shape error: {0}")]
    Shape(String),

    /// Audio loading and resampling errors.
    #[error("Audio error: {0}")]
    Audio(String),

    /// I/O errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Candle tensor errors.
    #[error("Tensor error: {0}")]
    Candle(#[from] candle_core::Error),

    /// JSON parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SincError {
    /// Ошибка конфигурации с именем параметра и его значением.
    pub fn config(param: &str, value: impl std::fmt::Display, reason: &str) -> Self {
        Self::Config(format!("{param} = {value}: {reason}"))
    }

    /// `true` для ошибок, которые возникают только при построении модели.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// `true` для ошибок формы входного тензора.
    pub fn is_shape(&self) -> bool {
        matches!(self, Self::Shape(_))
    }
}

/// Result type alias for SincNet operations.
pub type SincResult<T> = Result<T, SincError>;
