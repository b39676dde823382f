//! Конфигурационные структуры SincNet.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{SincError, SincResult};
use crate::shape::{self, LayerGeometry};

/// Единственная поддерживаемая частота дискретизации.
pub const SUPPORTED_SAMPLE_RATE: usize = 16_000;

/// Нижняя граница mel-инициализации фильтров, Гц.
pub const MEL_INIT_LOW_HZ: f64 = 30.0;

/// Configuration of the full SincNet feature pipeline.
///
/// Field names match the HuggingFace `config.json` written for the model,
/// every field falls back to its default when missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SincNetConfig {
    /// Количество sinc-фильтров (выходных каналов первого слоя).
    pub num_sinc_filters: usize,

    /// Длина sinc-фильтра (чётная увеличивается до нечётной).
    pub sinc_filter_length: usize,

    /// Количество фильтров обычных свёрток второго и третьего слоя.
    pub num_conv_filters: usize,

    /// Длина ядра обычных свёрток.
    pub conv_filter_length: usize,

    /// Окно max-pool.
    pub pool_kernel_size: usize,

    /// Шаг max-pool.
    pub pool_stride: usize,

    /// Частота дискретизации входа (только 16000).
    pub sample_rate: usize,

    /// Stride sinc-свёртки.
    pub sinc_filter_stride: usize,

    /// Padding sinc-свёртки.
    pub sinc_filter_padding: usize,

    /// Dilation sinc-свёртки.
    pub sinc_filter_dilation: usize,

    /// Минимальная нижняя частота среза, Гц.
    pub min_low_hz: f64,

    /// Минимальная ширина полосы, Гц.
    pub min_band_hz: f64,

    /// Входные каналы sinc-слоя (только 1).
    pub sinc_filter_in_channels: usize,

    /// Каналы входного сигнала.
    #[serde(alias = "num_wavform_channels")]
    pub num_waveform_channels: usize,

    /// Обучаются ли частоты среза sinc-фильтров.
    pub train_sinc_filters: bool,
}

impl Default for SincNetConfig {
    fn default() -> Self {
        Self {
            num_sinc_filters: 80,
            sinc_filter_length: 251,
            num_conv_filters: 60,
            conv_filter_length: 5,
            pool_kernel_size: 3,
            pool_stride: 3,
            sample_rate: SUPPORTED_SAMPLE_RATE,
            sinc_filter_stride: 10,
            sinc_filter_padding: 0,
            sinc_filter_dilation: 1,
            min_low_hz: 50.0,
            min_band_hz: 50.0,
            sinc_filter_in_channels: 1,
            num_waveform_channels: 1,
            train_sinc_filters: false,
        }
    }
}

impl SincNetConfig {
    /// Load configuration from a HuggingFace-style `config.json`.
    ///
    /// A top-level `stride` key overrides `sinc_filter_stride`, the way the
    /// HF wrapper forwarded it to the model.
    pub fn from_hf_config(path: impl AsRef<Path>) -> SincResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Parse configuration from a JSON string (same rules as [`Self::from_hf_config`]).
    pub fn from_json_str(content: &str) -> SincResult<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let mut config: Self = serde_json::from_value(value.clone())?;

        if let Some(stride) = value.get("stride").and_then(|v| v.as_u64()) {
            config.sinc_filter_stride = stride as usize;
        }

        Ok(config)
    }

    /// Check every constraint of the pipeline. Called by model constructors.
    pub fn validate(&self) -> SincResult<()> {
        if self.sample_rate != SUPPORTED_SAMPLE_RATE {
            return Err(SincError::config(
                "sample_rate",
                self.sample_rate,
                "SincNet only supports 16kHz audio",
            ));
        }
        if self.num_waveform_channels != self.sinc_filter_in_channels {
            return Err(SincError::config(
                "num_waveform_channels",
                self.num_waveform_channels,
                "must match sinc_filter_in_channels",
            ));
        }

        let positive = [
            ("num_conv_filters", self.num_conv_filters),
            ("conv_filter_length", self.conv_filter_length),
            ("pool_kernel_size", self.pool_kernel_size),
            ("pool_stride", self.pool_stride),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(SincError::config(name, value, "must be positive"));
            }
        }

        self.filter_bank().validate()
    }

    /// Конфигурация первого (sinc) слоя.
    pub fn filter_bank(&self) -> FilterBankConfig {
        FilterBankConfig {
            out_channels: self.num_sinc_filters,
            kernel_size: self.sinc_filter_length,
            sample_rate: self.sample_rate,
            stride: self.sinc_filter_stride,
            padding: self.sinc_filter_padding,
            dilation: self.sinc_filter_dilation,
            min_low_hz: self.min_low_hz,
            min_band_hz: self.min_band_hz,
            in_channels: self.sinc_filter_in_channels,
            trainable: self.train_sinc_filters,
        }
    }

    /// Геометрия всех слоёв вдоль времени: (свёртка, пулинг) × 3.
    pub fn layer_geometry(&self) -> [LayerGeometry; 6] {
        let bank = self.filter_bank();
        let pool = LayerGeometry::pool(self.pool_kernel_size, self.pool_stride);
        let conv = LayerGeometry::conv(self.conv_filter_length, 1, 0, 1);
        [
            LayerGeometry::conv(
                bank.effective_kernel_size(),
                bank.stride,
                bank.padding,
                bank.dilation,
            ),
            pool,
            conv,
            pool,
            conv,
            pool,
        ]
    }

    /// Количество выходных кадров для `num_samples` входных отсчётов.
    pub fn output_len(&self, num_samples: usize) -> Option<usize> {
        shape::chain_output_len(&self.layer_geometry(), num_samples)
    }

    /// Рецептивное поле одного выходного кадра, в отсчётах.
    pub fn receptive_field(&self) -> usize {
        shape::chain_receptive_field(&self.layer_geometry())
    }

    /// Шаг между выходными кадрами, в отсчётах.
    pub fn hop_samples(&self) -> usize {
        shape::chain_hop(&self.layer_geometry())
    }
}

/// Configuration of the analytic (sinc) band-pass filter bank and its convolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterBankConfig {
    /// Number of band-pass filters.
    pub out_channels: usize,

    /// Requested filter length; even values are bumped to the next odd one.
    pub kernel_size: usize,

    /// Sample rate in Hz.
    pub sample_rate: usize,

    pub stride: usize,
    pub padding: usize,
    pub dilation: usize,

    /// Lower bound added to every low cutoff, Hz.
    pub min_low_hz: f64,

    /// Lower bound added to every bandwidth, Hz.
    pub min_band_hz: f64,

    /// Input channels; only mono input is supported.
    pub in_channels: usize,

    /// Whether the cutoff parameters are exposed to the optimizer.
    pub trainable: bool,
}

impl Default for FilterBankConfig {
    fn default() -> Self {
        SincNetConfig::default().filter_bank()
    }
}

impl FilterBankConfig {
    /// Нечётная длина ядра (симметричное ядро с центральным отсчётом).
    pub fn effective_kernel_size(&self) -> usize {
        if self.kernel_size % 2 == 0 {
            self.kernel_size + 1
        } else {
            self.kernel_size
        }
    }

    /// Длина каузальной половины ядра.
    pub fn half_kernel_size(&self) -> usize {
        self.effective_kernel_size() / 2
    }

    /// Частота Найквиста, Гц.
    pub fn nyquist_hz(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }

    /// Верхняя граница mel-инициализации, Гц.
    pub fn mel_init_high_hz(&self) -> f64 {
        self.nyquist_hz() - (self.min_low_hz + self.min_band_hz)
    }

    pub fn validate(&self) -> SincResult<()> {
        if self.in_channels != 1 {
            return Err(SincError::config(
                "in_channels",
                self.in_channels,
                "the sinc filter layer only supports in_channels = 1",
            ));
        }

        let positive = [
            ("out_channels", self.out_channels),
            ("sample_rate", self.sample_rate),
            ("stride", self.stride),
            ("dilation", self.dilation),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(SincError::config(name, value, "must be positive"));
            }
        }

        if self.half_kernel_size() == 0 {
            return Err(SincError::config(
                "kernel_size",
                self.kernel_size,
                "kernel must have at least one sample on each side of the center",
            ));
        }

        for (name, value) in [
            ("min_low_hz", self.min_low_hz),
            ("min_band_hz", self.min_band_hz),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SincError::config(
                    name,
                    value,
                    "must be a finite non-negative frequency",
                ));
            }
        }

        if self.min_low_hz + self.min_band_hz >= self.nyquist_hz() {
            return Err(SincError::config(
                "min_low_hz + min_band_hz",
                self.min_low_hz + self.min_band_hz,
                &format!("must stay below the Nyquist frequency {} Hz", self.nyquist_hz()),
            ));
        }

        Ok(())
    }
}
