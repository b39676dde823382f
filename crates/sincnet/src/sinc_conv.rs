//! Свёртка сигнала с синтезированным банком sinc-фильтров.

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;

use sincnet_core::{FilterBankConfig, LayerGeometry, SincError, SincResult};

use crate::filter_bank::SincFilterBank;

/// SincNet fast convolution filter layer.
///
/// `(batch, 1, samples) -> (batch, out_channels, frames)`, magnitude of the
/// band-pass responses.
#[derive(Debug, Clone)]
pub struct SincConv1d {
    filter_bank: SincFilterBank,
    geometry: LayerGeometry,
}

impl SincConv1d {
    /// Create the layer with Mel-initialised filters.
    pub fn new(config: FilterBankConfig, device: &Device) -> SincResult<Self> {
        let filter_bank = SincFilterBank::new(config, device)?;
        Ok(Self::with_filter_bank(filter_bank))
    }

    /// Create the layer from a `VarBuilder` (see [`SincFilterBank::load`]).
    pub fn load(config: FilterBankConfig, vb: VarBuilder) -> SincResult<Self> {
        let filter_bank = SincFilterBank::load(config, vb)?;
        Ok(Self::with_filter_bank(filter_bank))
    }

    fn with_filter_bank(filter_bank: SincFilterBank) -> Self {
        let cfg = filter_bank.config();
        let geometry = LayerGeometry::conv(
            cfg.effective_kernel_size(),
            cfg.stride,
            cfg.padding,
            cfg.dilation,
        );
        Self {
            filter_bank,
            geometry,
        }
    }

    pub fn filter_bank(&self) -> &SincFilterBank {
        &self.filter_bank
    }

    pub fn geometry(&self) -> LayerGeometry {
        self.geometry
    }

    /// Длина выхода для входа из `input_len` отсчётов.
    pub fn output_len(&self, input_len: usize) -> Option<usize> {
        self.geometry.output_len(input_len)
    }

    /// Forward pass: conv1d with the freshly synthesized kernels, then `abs`.
    pub fn forward(&self, waveforms: &Tensor) -> SincResult<Tensor> {
        if waveforms.rank() != 3 {
            return Err(SincError::Shape(format!(
                "sinc conv expects (batch, 1, samples), got {:?}",
                waveforms.dims()
            )));
        }
        let (_batch, channels, samples) = waveforms.dims3()?;
        if channels != 1 {
            return Err(SincError::Shape(format!(
                "sinc conv expects a single input channel, got {channels}"
            )));
        }
        if self.output_len(samples).is_none() {
            return Err(SincError::Shape(format!(
                "input of {samples} samples is shorter than the sinc kernel span {}",
                self.geometry.span()
            )));
        }

        let kernel = self
            .filter_bank
            .synthesize()?
            .to_dtype(waveforms.dtype())?;
        let out = waveforms.conv1d(
            &kernel,
            self.geometry.padding,
            self.geometry.stride,
            self.geometry.dilation,
            1,
        )?;

        // Модуль, а не ReLU: отклик полосового фильтра знакопеременный.
        Ok(out.abs()?)
    }
}
