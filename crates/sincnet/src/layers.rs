//! Neural network layers shared by the SincNet stages.
//!
//! - InstanceNorm1d with affine weight/bias (per example, per channel)
//! - MaxPool1d on top of candle's 2D pooling

use candle_core::{D, DType, Result, Tensor};
use candle_nn::{Init, VarBuilder};

/// Epsilon of the instance normalisation (PyTorch default).
pub const INSTANCE_NORM_EPS: f64 = 1e-5;

/// Negative slope of the leaky ReLU after every stage (PyTorch default).
pub const LEAKY_RELU_SLOPE: f64 = 0.01;

/// InstanceNorm1d: нормировка каждого канала каждого примера по времени.
///
/// Статистики не накапливаются (`track_running_stats=False`).
#[derive(Debug, Clone)]
pub struct InstanceNorm1d {
    /// `(channels,)`
    weight: Tensor,
    /// `(channels,)`
    bias: Tensor,
    num_channels: usize,
    eps: f64,
}

impl InstanceNorm1d {
    /// Create a new InstanceNorm1d layer (weight = 1, bias = 0 when not in `vb`).
    pub fn new(num_channels: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get_with_hints(num_channels, "weight", Init::Const(1.0))?;
        let bias = vb.get_with_hints(num_channels, "bias", Init::Const(0.0))?;
        Ok(Self {
            weight,
            bias,
            num_channels,
            eps,
        })
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// `(batch, channels, time) -> (batch, channels, time)`
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (_batch, channels, _time) = x.dims3()?;
        if channels != self.num_channels {
            candle_core::bail!(
                "InstanceNorm1d: expected {} channels, got {}",
                self.num_channels,
                channels
            );
        }

        // Статистики в float32, затем каст обратно.
        let input_dtype = x.dtype();
        let x_f32 = x.to_dtype(DType::F32)?;

        let mean = x_f32.mean_keepdim(D::Minus1)?;
        let x_centered = x_f32.broadcast_sub(&mean)?;
        let variance = x_centered.sqr()?.mean_keepdim(D::Minus1)?;
        let x_normed = x_centered.broadcast_div(&(variance + self.eps)?.sqrt()?)?;
        let x_normed = x_normed.to_dtype(input_dtype)?;

        let w = self
            .weight
            .to_dtype(input_dtype)?
            .reshape((1, self.num_channels, 1))?;
        let b = self
            .bias
            .to_dtype(input_dtype)?
            .reshape((1, self.num_channels, 1))?;
        x_normed.broadcast_mul(&w)?.broadcast_add(&b)
    }
}

/// MaxPool1d with a fixed window and stride, floor mode, no padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPool1d {
    kernel_size: usize,
    stride: usize,
}

impl MaxPool1d {
    pub fn new(kernel_size: usize, stride: usize) -> Self {
        Self {
            kernel_size,
            stride,
        }
    }

    /// `(batch, channels, time) -> (batch, channels, pooled_time)`
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        // (b, c, t) -> (b, c, 1, t): окно 1×k по последней оси.
        x.unsqueeze(2)?
            .max_pool2d_with_stride((1, self.kernel_size), (1, self.stride))?
            .squeeze(2)
    }
}
