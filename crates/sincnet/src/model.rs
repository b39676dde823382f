//! SincNet feature pipeline.

use std::path::Path;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{Conv1d, Conv1dConfig, Module, VarBuilder};
use tracing::{debug, info};

use sincnet_core::{SincError, SincNetConfig, SincResult};

use crate::layers::{INSTANCE_NORM_EPS, InstanceNorm1d, LEAKY_RELU_SLOPE, MaxPool1d};
use crate::sinc_conv::SincConv1d;

/// Свёртка, с которой начинается стадия пайплайна.
trait StageConv {
    fn forward_conv(&self, x: &Tensor) -> SincResult<Tensor>;
}

impl StageConv for SincConv1d {
    fn forward_conv(&self, x: &Tensor) -> SincResult<Tensor> {
        self.forward(x)
    }
}

impl StageConv for Conv1d {
    fn forward_conv(&self, x: &Tensor) -> SincResult<Tensor> {
        Ok(self.forward(x)?)
    }
}

/// One stage: conv -> max-pool -> instance norm -> leaky ReLU.
#[derive(Debug, Clone)]
struct Stage<C> {
    conv: C,
    pool: MaxPool1d,
    norm: InstanceNorm1d,
}

impl<C: StageConv> Stage<C> {
    fn forward(&self, x: &Tensor) -> SincResult<Tensor> {
        let x = self.conv.forward_conv(x)?;
        let x = self.pool.forward(&x)?;
        let x = self.norm.forward(&x)?;
        Ok(candle_nn::ops::leaky_relu(&x, LEAKY_RELU_SLOPE)?)
    }
}

/// SincNet: waveform `(batch, 1, samples)` -> features `(batch, num_conv_filters, frames)`.
///
/// Structure (tensor names follow the original module tree):
/// 1. `wav_norm1d` — instance norm of the raw waveform
/// 2. `conv1d.0` — sinc filter bank (`_low_hz`, `_band_hz`), then `|·|`
/// 3. `conv1d.1`, `conv1d.2` — learned Conv1d
/// 4. after every conv: max-pool, `norm1d.{i}`, leaky ReLU
#[derive(Debug, Clone)]
pub struct SincNet {
    config: SincNetConfig,
    wav_norm1d: InstanceNorm1d,
    sinc_stage: Stage<SincConv1d>,
    conv_stages: [Stage<Conv1d>; 2],
    dtype: DType,
}

impl SincNet {
    /// Build the pipeline from a `VarBuilder`.
    ///
    /// With a `VarMap`-backed builder every learned tensor is created fresh;
    /// with safetensors the pretrained values are used. The configuration is
    /// validated before any tensor is touched.
    pub fn new(config: SincNetConfig, vb: VarBuilder) -> SincResult<Self> {
        config.validate()?;

        let wav_norm1d = InstanceNorm1d::new(
            config.num_waveform_channels,
            INSTANCE_NORM_EPS,
            vb.pp("wav_norm1d"),
        )?;

        let pool = MaxPool1d::new(config.pool_kernel_size, config.pool_stride);
        let conv_cfg = Conv1dConfig::default();

        let sinc = SincConv1d::load(config.filter_bank(), vb.pp("conv1d.0"))?;
        let conv1 = candle_nn::conv1d(
            config.num_sinc_filters,
            config.num_conv_filters,
            config.conv_filter_length,
            conv_cfg,
            vb.pp("conv1d.1"),
        )?;
        let conv2 = candle_nn::conv1d(
            config.num_conv_filters,
            config.num_conv_filters,
            config.conv_filter_length,
            conv_cfg,
            vb.pp("conv1d.2"),
        )?;

        let norm = |i: usize, channels: usize| {
            InstanceNorm1d::new(channels, INSTANCE_NORM_EPS, vb.pp(format!("norm1d.{i}")))
        };
        let sinc_stage = Stage {
            conv: sinc,
            pool,
            norm: norm(0, config.num_sinc_filters)?,
        };
        let conv_stages = [
            Stage {
                conv: conv1,
                pool,
                norm: norm(1, config.num_conv_filters)?,
            },
            Stage {
                conv: conv2,
                pool,
                norm: norm(2, config.num_conv_filters)?,
            },
        ];

        info!(
            "SincNet: {} sinc-фильтров × {} отсчётов, {} свёрточных фильтров, рецептивное поле {} отсчётов",
            config.num_sinc_filters,
            config.filter_bank().effective_kernel_size(),
            config.num_conv_filters,
            config.receptive_field(),
        );

        Ok(Self {
            config,
            wav_norm1d,
            sinc_stage,
            conv_stages,
            dtype: vb.dtype(),
        })
    }

    /// Load the pipeline from one or more safetensors files.
    pub fn from_safetensors<P: AsRef<Path>>(
        config: SincNetConfig,
        paths: &[P],
        device: &Device,
    ) -> SincResult<Self> {
        if let Some(missing) = paths.iter().map(AsRef::as_ref).find(|p| !p.exists()) {
            return Err(SincError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("weights file not found: {}", missing.display()),
            )));
        }

        info!("SincNet: загрузка весов из {} файл(ов)", paths.len());
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(paths, DType::F32, device)? };

        // Без частот среза чекпоинт не описывает обученный банк фильтров.
        for name in ["conv1d.0._low_hz", "conv1d.0._band_hz"] {
            if !vb.contains_tensor(name) {
                return Err(SincError::config(
                    "weights",
                    name,
                    "sinc filter cutoffs are missing from the checkpoint",
                ));
            }
        }
        Self::new(config, vb)
    }

    /// Forward pass.
    ///
    /// # Arguments
    /// * `waveforms` - tensor of shape `(batch, 1, samples)` at 16 kHz
    ///
    /// # Returns
    /// Features of shape `(batch, num_conv_filters, output_len(samples))`
    pub fn forward(&self, waveforms: &Tensor) -> SincResult<Tensor> {
        let samples = self.check_input(waveforms)?;
        let debug_stats = sincnet_core::debug::enabled();

        let x = if waveforms.dtype() != self.dtype {
            waveforms.to_dtype(self.dtype)?
        } else {
            waveforms.clone()
        };

        let x = self.wav_norm1d.forward(&x)?;
        let mut outputs = self.sinc_stage.forward(&x)?;
        trace_stage(1, &outputs, debug_stats)?;

        for (i, stage) in self.conv_stages.iter().enumerate() {
            outputs = stage.forward(&outputs)?;
            trace_stage(i + 2, &outputs, debug_stats)?;
        }

        debug!("SincNet: {} отсчётов -> {:?}", samples, outputs.dims());
        Ok(outputs)
    }

    /// Проверить форму входа до любых вычислений; возвращает число отсчётов.
    fn check_input(&self, waveforms: &Tensor) -> SincResult<usize> {
        if waveforms.rank() != 3 {
            return Err(SincError::Shape(format!(
                "expected waveforms of shape (batch, {}, samples), got {:?}",
                self.config.num_waveform_channels,
                waveforms.dims()
            )));
        }
        let (_batch, channels, samples) = waveforms.dims3()?;
        if channels != self.config.num_waveform_channels {
            return Err(SincError::Shape(format!(
                "expected {} waveform channel(s), got {}",
                self.config.num_waveform_channels, channels
            )));
        }
        if self.output_len(samples).is_none() {
            return Err(SincError::Shape(format!(
                "input of {} samples is shorter than the receptive field of {} samples",
                samples,
                self.receptive_field()
            )));
        }
        Ok(samples)
    }

    /// Number of output frames for `num_samples` input samples.
    pub fn output_len(&self, num_samples: usize) -> Option<usize> {
        self.config.output_len(num_samples)
    }

    /// Input samples seen by one output frame.
    pub fn receptive_field(&self) -> usize {
        self.config.receptive_field()
    }

    /// Input samples between consecutive output frames.
    pub fn hop_samples(&self) -> usize {
        self.config.hop_samples()
    }

    /// Sinc-слой первой стадии.
    pub fn sinc_layer(&self) -> &SincConv1d {
        &self.sinc_stage.conv
    }

    /// Cutoff variables of the sinc layer for an external optimizer.
    ///
    /// Empty when the filter bank is frozen, even though the cutoffs are still
    /// stored in the `VarMap` and saved with it.
    pub fn filter_bank_vars(&self) -> Vec<Var> {
        self.sinc_layer().filter_bank().trainable_vars()
    }

    pub fn config(&self) -> &SincNetConfig {
        &self.config
    }

    /// Output channels.
    pub fn output_dim(&self) -> usize {
        self.config.num_conv_filters
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }
}

fn trace_stage(stage: usize, outputs: &Tensor, debug_stats: bool) -> SincResult<()> {
    debug!("SincNet: стадия {} -> {:?}", stage, outputs.dims());
    if debug_stats {
        let flat = outputs.flatten_all()?.to_dtype(DType::F32)?;
        eprintln!(
            "DEBUG SincNet stage {}: shape={:?}, min={:.4}, max={:.4}, mean={:.4}",
            stage,
            outputs.dims(),
            flat.min(0)?.to_scalar::<f32>()?,
            flat.max(0)?.to_scalar::<f32>()?,
            flat.mean_all()?.to_scalar::<f32>()?,
        );
    }
    Ok(())
}
