//! Арифметика длин для свёрток и пулинга.
//!
//! Формулы совпадают с PyTorch `Conv1d` / `MaxPool1d` (floor-режим):
//! `out = floor((in + 2·padding − dilation·(kernel − 1) − 1) / stride) + 1`.

/// Геометрия одного слоя вдоль временной оси.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerGeometry {
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
    pub dilation: usize,
}

impl LayerGeometry {
    /// Свёртка с произвольными stride/padding/dilation.
    pub fn conv(kernel_size: usize, stride: usize, padding: usize, dilation: usize) -> Self {
        Self {
            kernel_size,
            stride,
            padding,
            dilation,
        }
    }

    /// Max-pool без паддинга.
    pub fn pool(kernel_size: usize, stride: usize) -> Self {
        Self::conv(kernel_size, stride, 0, 1)
    }

    /// Ширина ядра с учётом dilation.
    pub fn span(&self) -> usize {
        self.dilation * (self.kernel_size.saturating_sub(1)) + 1
    }

    /// Длина выхода или `None`, если вход короче ядра.
    pub fn output_len(&self, input_len: usize) -> Option<usize> {
        conv_output_len(
            input_len,
            self.kernel_size,
            self.stride,
            self.padding,
            self.dilation,
        )
    }
}

/// Output length of a 1-D convolution, `None` when the kernel does not fit.
pub fn conv_output_len(
    input_len: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
    dilation: usize,
) -> Option<usize> {
    if kernel_size == 0 || stride == 0 || dilation == 0 {
        return None;
    }
    let padded = input_len + 2 * padding;
    let span = dilation * (kernel_size - 1) + 1;
    if padded < span {
        return None;
    }
    Some((padded - span) / stride + 1)
}

/// Output length of a 1-D max-pool (no padding, floor mode).
pub fn pool_output_len(input_len: usize, kernel_size: usize, stride: usize) -> Option<usize> {
    conv_output_len(input_len, kernel_size, stride, 0, 1)
}

/// Длина выхода цепочки слоёв; `None`, если какой-то слой получает пустой вход.
pub fn chain_output_len(layers: &[LayerGeometry], input_len: usize) -> Option<usize> {
    layers
        .iter()
        .try_fold(input_len, |len, layer| layer.output_len(len))
}

/// Сколько входных отсчётов видит один выходной кадр цепочки.
pub fn chain_receptive_field(layers: &[LayerGeometry]) -> usize {
    layers
        .iter()
        .rev()
        .fold(1, |rf, layer| (rf - 1) * layer.stride + layer.span())
}

/// Шаг между соседними выходными кадрами в отсчётах входа.
pub fn chain_hop(layers: &[LayerGeometry]) -> usize {
    layers.iter().map(|layer| layer.stride).product()
}
