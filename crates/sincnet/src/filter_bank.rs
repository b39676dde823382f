//! Параметрический банк полосовых sinc-фильтров.
//!
//! Каждый фильтр задаётся двумя обучаемыми скалярами: смещением нижней
//! частоты среза и шириной полосы. Ядро длиной `kernel_size` синтезируется
//! заново при каждом вызове [`SincFilterBank::synthesize`] как разность двух
//! идеальных ФНЧ, умноженная на окно Хэмминга.

use std::f64::consts::PI;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{Init, VarBuilder};
use tracing::{debug, info};

use sincnet_core::config::MEL_INIT_LOW_HZ;
use sincnet_core::{FilterBand, FilterBankConfig, SincError, SincResult};

/// Нижняя граница ширины полосы при нормировке ядра, Гц.
///
/// Если clamp по Найквисту схлопывает полосу, деление на `2·band` остаётся конечным.
pub const MIN_BANDWIDTH_HZ: f64 = 1e-3;

/// Hz → Mel (HTK formula).
pub fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Mel → Hz (HTK formula).
pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Начальные (low, band) для `num_filters` фильтров, равномерно по mel-шкале.
///
/// Границы: `num_filters + 1` точек между `low_hz` и `high_hz`; фильтр `i`
/// начинается на границе `i`, его ширина равна расстоянию до границы `i + 1`.
///
/// One filter per output channel: the kernel bank is reshaped to
/// `(out_channels, 1, kernel_size)`, so `out_channels / 2` filters cannot feed it.
pub fn mel_spaced_bands(num_filters: usize, low_hz: f64, high_hz: f64) -> (Vec<f64>, Vec<f64>) {
    let mel_low = hz_to_mel(low_hz);
    let mel_high = hz_to_mel(high_hz);
    let step = (mel_high - mel_low) / num_filters as f64;

    let edges: Vec<f64> = (0..=num_filters)
        .map(|i| {
            if i == num_filters {
                mel_high
            } else {
                mel_low + step * i as f64
            }
        })
        .map(mel_to_hz)
        .collect();

    let low = edges[..num_filters].to_vec();
    let band = edges.windows(2).map(|w| w[1] - w[0]).collect();
    (low, band)
}

/// Окно Хэмминга длины `kernel_size`, от которого берётся первая половина.
fn hamming_half(kernel_size: usize, half: usize) -> Vec<f32> {
    let denom = (kernel_size - 1) as f64;
    (0..half)
        .map(|i| (0.54 - 0.46 * (2.0 * PI * i as f64 / denom).cos()) as f32)
        .collect()
}

/// Ось времени каузальной половины: `2π·n / sample_rate`, `n = -half..-1`.
fn negative_time_axis(half: usize, sample_rate: usize) -> Vec<f32> {
    (0..half)
        .map(|i| {
            let n = i as f64 - half as f64;
            (2.0 * PI * n / sample_rate as f64) as f32
        })
        .collect()
}

/// Mel-spaced `(low, band)` as `(out_channels, 1)` F32 tensors.
fn mel_init_tensors(config: &FilterBankConfig, device: &Device) -> SincResult<(Tensor, Tensor)> {
    let n = config.out_channels;
    let (low, band) = mel_spaced_bands(n, MEL_INIT_LOW_HZ, config.mel_init_high_hz());
    let low: Vec<f32> = low.into_iter().map(|v| v as f32).collect();
    let band: Vec<f32> = band.into_iter().map(|v| v as f32).collect();

    debug!(
        "SincFilterBank: mel-инициализация {} фильтров, {}..{} Гц",
        n,
        MEL_INIT_LOW_HZ,
        config.mel_init_high_hz()
    );
    Ok((
        Tensor::from_vec(low, (n, 1), device)?,
        Tensor::from_vec(band, (n, 1), device)?,
    ))
}

/// Bank of analytic band-pass filters with trainable cutoffs.
///
/// Parameters live in two [`Var`]s of shape `(out_channels, 1)`, shared with
/// the `VarMap` when built through [`SincFilterBank::load`]; synthesis constants (window, time axis) are fixed at construction.
#[derive(Debug, Clone)]
pub struct SincFilterBank {
    config: FilterBankConfig,
    low_hz: Var,
    band_hz: Var,
    /// `(1, half)`
    window: Tensor,
    /// `(1, half)`
    time_axis: Tensor,
    /// Индексы `half-1..=0` для зеркального отражения левой половины.
    reverse_index: Tensor,
}

impl SincFilterBank {
    /// Create a filter bank with Mel-spaced initial cutoffs.
    pub fn new(config: FilterBankConfig, device: &Device) -> SincResult<Self> {
        config.validate()?;

        let (low_hz, band_hz) = mel_init_tensors(&config, device)?;
        Self::from_parameters(config, Var::from_tensor(&low_hz)?, Var::from_tensor(&band_hz)?)
    }

    /// Cutoffs `_low_hz` / `_band_hz` through a `VarBuilder`.
    ///
    /// With a `VarMap` the cutoffs are registered next to every other learned
    /// tensor: created with Mel-spaced values on first use, so `VarMap::save`
    /// writes them and `VarMap::load` restores them. With pretrained weights
    /// both tensors must be present.
    pub fn load(config: FilterBankConfig, vb: VarBuilder) -> SincResult<Self> {
        config.validate()?;

        let has_low = vb.contains_tensor("_low_hz");
        let has_band = vb.contains_tensor("_band_hz");
        if has_low != has_band {
            let missing = if has_low { "_band_hz" } else { "_low_hz" };
            return Err(SincError::config(
                "weights",
                missing,
                "sinc filter cutoffs must be stored as a pair",
            ));
        }
        let fresh = !has_low;

        let n = config.out_channels;
        let get = |name: &str| -> SincResult<Var> {
            let t = vb
                .get_with_hints_dtype((n, 1), name, Init::Const(0.0), DType::F32)
                .map_err(|e| {
                    SincError::config("weights", name, &format!("cannot read sinc cutoffs: {e}"))
                })?;
            // Тензор из VarMap уже переменная: Var делит с ним хранилище.
            Ok(Var::from_tensor(&t)?)
        };
        let low_hz = get("_low_hz")?;
        let band_hz = get("_band_hz")?;

        if fresh {
            let (low, band) = mel_init_tensors(&config, vb.device())?;
            low_hz.set(&low)?;
            band_hz.set(&band)?;
        } else {
            info!("SincFilterBank: загружено {} фильтров из весов", n);
        }

        Self::from_parameters(config, low_hz, band_hz)
    }

    fn from_parameters(config: FilterBankConfig, low_hz: Var, band_hz: Var) -> SincResult<Self> {
        let device = low_hz.device().clone();
        let kernel_size = config.effective_kernel_size();
        let half = config.half_kernel_size();

        let window = Tensor::from_vec(hamming_half(kernel_size, half), (1, half), &device)?;
        let time_axis = Tensor::from_vec(
            negative_time_axis(half, config.sample_rate),
            (1, half),
            &device,
        )?;
        let reverse: Vec<u32> = (0..half as u32).rev().collect();
        let reverse_index = Tensor::from_vec(reverse, half, &device)?;

        Ok(Self {
            low_hz,
            band_hz,
            config,
            window,
            time_axis,
            reverse_index,
        })
    }

    /// Number of filters.
    pub fn num_filters(&self) -> usize {
        self.config.out_channels
    }

    /// Odd kernel length actually synthesized.
    pub fn kernel_size(&self) -> usize {
        self.config.effective_kernel_size()
    }

    pub fn config(&self) -> &FilterBankConfig {
        &self.config
    }

    /// Raw trainable low-cutoff offsets, `(out_channels, 1)`.
    pub fn low_hz_param(&self) -> &Tensor {
        self.low_hz.as_tensor()
    }

    /// Raw trainable bandwidth offsets, `(out_channels, 1)`.
    pub fn band_hz_param(&self) -> &Tensor {
        self.band_hz.as_tensor()
    }

    /// Variables an external optimizer should update; empty when frozen.
    pub fn trainable_vars(&self) -> Vec<Var> {
        if self.config.trainable {
            vec![self.low_hz.clone(), self.band_hz.clone()]
        } else {
            Vec::new()
        }
    }

    /// Replace both parameter vectors in place.
    ///
    /// Accepts `(out_channels,)` or `(out_channels, 1)`.
    pub fn set_parameters(&self, low_hz: &Tensor, band_hz: &Tensor) -> SincResult<()> {
        let n = self.num_filters();
        for (name, t) in [("low_hz", low_hz), ("band_hz", band_hz)] {
            if t.elem_count() != n || t.rank() > 2 {
                return Err(SincError::Shape(format!(
                    "{name}: expected {n} values of shape ({n}, 1), got {:?}",
                    t.dims()
                )));
            }
        }

        let device = self.low_hz.device();
        let low = low_hz.reshape((n, 1))?.to_dtype(DType::F32)?.to_device(device)?;
        let band = band_hz.reshape((n, 1))?.to_dtype(DType::F32)?.to_device(device)?;
        self.low_hz.set(&low)?;
        self.band_hz.set(&band)?;
        Ok(())
    }

    /// Effective `(low, high)` cutoffs in Hz, each `(out_channels, 1)`.
    ///
    /// `low = min_low_hz + |low_param|`,
    /// `high = clamp(low + min_band_hz + |band_param|, min_low_hz, sample_rate / 2)`.
    fn cutoff_tensors(&self) -> SincResult<(Tensor, Tensor)> {
        let cfg = &self.config;
        let low = self.low_hz.as_tensor().abs()?.affine(1.0, cfg.min_low_hz)?;
        let high = low
            .add(&self.band_hz.as_tensor().abs()?)?
            .affine(1.0, cfg.min_band_hz)?
            .clamp(cfg.min_low_hz, cfg.nyquist_hz())?;
        Ok((low, high))
    }

    /// Effective cutoffs of every filter, copied to the host.
    pub fn cutoffs(&self) -> SincResult<Vec<FilterBand>> {
        let (low, high) = self.cutoff_tensors()?;
        let low = low.flatten_all()?.to_vec1::<f32>()?;
        let high = high.flatten_all()?.to_vec1::<f32>()?;
        Ok(low
            .into_iter()
            .zip(high)
            .map(|(low_hz, high_hz)| FilterBand { low_hz, high_hz })
            .collect())
    }

    /// Synthesize the kernel bank, `(out_channels, 1, kernel_size)`, F32.
    ///
    /// Pure function of the current parameters: recomputed on every call.
    pub fn synthesize(&self) -> SincResult<Tensor> {
        let (low, high) = self.cutoff_tensors()?;
        let band = high.sub(&low)?.maximum(MIN_BANDWIDTH_HZ)?;

        let f_times_t_low = low.broadcast_mul(&self.time_axis)?;
        let f_times_t_high = high.broadcast_mul(&self.time_axis)?;
        let half_t = self.time_axis.affine(0.5, 0.0)?;

        // (sin(2π·high·t) − sin(2π·low·t)) / (π·t), окно Хэмминга.
        let left = f_times_t_high
            .sin()?
            .sub(&f_times_t_low.sin()?)?
            .broadcast_div(&half_t)?
            .broadcast_mul(&self.window)?;
        let center = band.affine(2.0, 0.0)?;
        let right = left.index_select(&self.reverse_index, 1)?;

        let kernel = Tensor::cat(&[&left, &center, &right], 1)?;
        let kernel = kernel.broadcast_div(&center)?;

        Ok(kernel.reshape((self.num_filters(), 1, self.kernel_size()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank(config: FilterBankConfig) -> SincFilterBank {
        SincFilterBank::new(config, &Device::Cpu).unwrap()
    }

    fn kernels(bank: &SincFilterBank) -> Vec<Vec<f32>> {
        bank.synthesize()
            .unwrap()
            .squeeze(1)
            .unwrap()
            .to_vec2::<f32>()
            .unwrap()
    }

    #[test]
    fn test_mel_roundtrip() {
        for hz in [0.0, 30.0, 700.0, 7900.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
    }

    #[test]
    fn test_mel_spaced_bands_cover_range() {
        let (low, band) = mel_spaced_bands(80, 30.0, 7900.0);
        assert_eq!(low.len(), 80);
        assert_eq!(band.len(), 80);
        assert!((low[0] - 30.0).abs() < 1e-9);
        let last_high = low[79] + band[79];
        assert!((last_high - 7900.0).abs() < 1e-6);
        // Полосы растут с частотой на mel-шкале.
        assert!(band.windows(2).all(|w| w[1] > w[0]));
        // Соседние фильтры стыкуются без зазоров.
        for i in 0..79 {
            assert!((low[i] + band[i] - low[i + 1]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_hamming_half_matches_numpy() {
        // np.hamming(5)[:2] == [0.08, 0.54]
        let w = hamming_half(5, 2);
        assert!((w[0] - 0.08).abs() < 1e-6);
        assert!((w[1] - 0.54).abs() < 1e-6);
    }

    #[test]
    fn test_negative_time_axis() {
        let t = negative_time_axis(3, 16000);
        let step = (2.0 * PI / 16000.0) as f32;
        assert!((t[0] + 3.0 * step).abs() < 1e-9);
        assert!((t[2] + step).abs() < 1e-9);
    }

    #[test]
    fn test_synthesize_shape_default() {
        let bank = bank(FilterBankConfig::default());
        let kernel = bank.synthesize().unwrap();
        assert_eq!(kernel.dims(), &[80, 1, 251]);
        assert_eq!(kernel.dtype(), DType::F32);
    }

    #[test]
    fn test_even_kernel_size_bumped() {
        let bank = bank(FilterBankConfig {
            out_channels: 8,
            kernel_size: 64,
            ..Default::default()
        });
        assert_eq!(bank.synthesize().unwrap().dims(), &[8, 1, 65]);
    }

    #[test]
    fn test_kernels_symmetric_and_center_normalised() {
        let bank = bank(FilterBankConfig {
            out_channels: 16,
            kernel_size: 101,
            ..Default::default()
        });
        for kernel in kernels(&bank) {
            let k = kernel.len();
            for i in 0..k {
                assert_eq!(kernel[i], kernel[k - 1 - i]);
            }
            assert!((kernel[k / 2] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_synthesize_idempotent() {
        let bank = bank(FilterBankConfig::default());
        assert_eq!(kernels(&bank), kernels(&bank));
    }

    #[test]
    fn test_cutoffs_respect_bounds() {
        let config = FilterBankConfig::default();
        let bank = bank(config.clone());
        for band in bank.cutoffs().unwrap() {
            assert!(band.low_hz as f64 >= config.min_low_hz);
            assert!(band.high_hz as f64 <= config.nyquist_hz());
            assert!(band.bandwidth_hz() as f64 >= config.min_band_hz - 1e-3);
        }
    }

    #[test]
    fn test_negative_parameters_are_folded() {
        let config = FilterBankConfig {
            out_channels: 2,
            kernel_size: 11,
            ..Default::default()
        };
        let bank = bank(config);
        let low = Tensor::new(&[-100f32, 100.0], &Device::Cpu).unwrap();
        let band = Tensor::new(&[-200f32, 200.0], &Device::Cpu).unwrap();
        bank.set_parameters(&low, &band).unwrap();

        let cutoffs = bank.cutoffs().unwrap();
        assert_eq!(cutoffs[0], cutoffs[1]);
        assert_eq!(cutoffs[0].low_hz, 150.0);
        assert_eq!(cutoffs[0].high_hz, 400.0);
    }

    #[test]
    fn test_high_clamped_to_nyquist_and_finite() {
        let config = FilterBankConfig {
            out_channels: 3,
            kernel_size: 251,
            ..Default::default()
        };
        let bank = bank(config);
        // Фильтр 0: верх за Найквистом; 1: полоса схлопнута; 2: low выше Найквиста.
        let low = Tensor::new(&[7000f32, 7950.0, 9000.0], &Device::Cpu).unwrap();
        let band = Tensor::new(&[5000f32, 0.0, 10.0], &Device::Cpu).unwrap();
        bank.set_parameters(&low, &band).unwrap();

        for band in bank.cutoffs().unwrap() {
            assert_eq!(band.high_hz, 8000.0);
        }
        for kernel in kernels(&bank) {
            assert!(kernel.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_wider_min_band_never_narrows() {
        let narrow = bank(FilterBankConfig {
            min_band_hz: 50.0,
            ..Default::default()
        });
        let wide = bank(FilterBankConfig {
            min_band_hz: 200.0,
            ..Default::default()
        });
        // Одинаковые сырые параметры, разный min_band_hz.
        wide.set_parameters(narrow.low_hz_param(), narrow.band_hz_param())
            .unwrap();

        let narrow = narrow.cutoffs().unwrap();
        let wide = wide.cutoffs().unwrap();
        for (a, b) in narrow.iter().zip(&wide) {
            assert!(b.bandwidth_hz() >= a.bandwidth_hz());
        }
    }

    #[test]
    fn test_set_parameters_changes_kernels() {
        let bank = bank(FilterBankConfig {
            out_channels: 4,
            kernel_size: 31,
            ..Default::default()
        });
        let before = kernels(&bank);
        let low = Tensor::new(&[100f32, 200.0, 300.0, 400.0], &Device::Cpu).unwrap();
        let band = Tensor::new(&[10f32, 20.0, 30.0, 40.0], &Device::Cpu).unwrap();
        bank.set_parameters(&low, &band).unwrap();
        assert_ne!(before, kernels(&bank));
    }

    #[test]
    fn test_set_parameters_rejects_wrong_length() {
        let bank = bank(FilterBankConfig {
            out_channels: 4,
            ..Default::default()
        });
        let wrong = Tensor::zeros(3, DType::F32, &Device::Cpu).unwrap();
        let err = bank.set_parameters(&wrong, &wrong).unwrap_err();
        assert!(err.is_shape());
    }

    #[test]
    fn test_frozen_by_default() {
        let frozen = bank(FilterBankConfig::default());
        assert!(frozen.trainable_vars().is_empty());

        let trainable = bank(FilterBankConfig {
            trainable: true,
            ..Default::default()
        });
        assert_eq!(trainable.trainable_vars().len(), 2);
    }

    #[test]
    fn test_in_channels_rejected() {
        let err = SincFilterBank::new(
            FilterBankConfig {
                in_channels: 2,
                ..Default::default()
            },
            &Device::Cpu,
        )
        .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_load_registers_cutoffs_in_varmap() {
        let config = FilterBankConfig {
            out_channels: 6,
            kernel_size: 31,
            ..Default::default()
        };
        let varmap = candle_nn::VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let loaded = SincFilterBank::load(config.clone(), vb).unwrap();

        // Те же mel-значения, что и у `new`, и они лежат в VarMap.
        assert_eq!(loaded.cutoffs().unwrap(), bank(config).cutoffs().unwrap());
        let stored = varmap.data().lock().unwrap()["_low_hz"]
            .as_tensor()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        let own = loaded
            .low_hz_param()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert_eq!(stored, own);

        // Запись через банк видна в VarMap.
        let low = Tensor::full(700f32, 6, &Device::Cpu).unwrap();
        let band = Tensor::full(100f32, 6, &Device::Cpu).unwrap();
        loaded.set_parameters(&low, &band).unwrap();
        let stored = varmap.data().lock().unwrap()["_band_hz"]
            .as_tensor()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert_eq!(stored, vec![100f32; 6]);
    }

    #[test]
    fn test_load_requires_both_cutoffs() {
        let config = FilterBankConfig {
            out_channels: 4,
            kernel_size: 31,
            ..Default::default()
        };

        let empty = std::collections::HashMap::new();
        let vb = VarBuilder::from_tensors(empty, DType::F32, &Device::Cpu);
        assert!(SincFilterBank::load(config.clone(), vb).unwrap_err().is_config());

        let mut half = std::collections::HashMap::new();
        half.insert(
            "_low_hz".to_string(),
            Tensor::zeros((4, 1), DType::F32, &Device::Cpu).unwrap(),
        );
        let vb = VarBuilder::from_tensors(half, DType::F32, &Device::Cpu);
        assert!(SincFilterBank::load(config, vb).unwrap_err().is_config());
    }
}
