//!
//! CLI для SincNet: признаки из WAV или шума, банк фильтров, длины выходов.

use anyhow::{Context, Result, bail};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use clap::{Parser, Subcommand};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use sincnet::{SincNet, SincNetConfig};
use sincnet_core::device::select_device;

#[derive(Parser)]
#[command(name = "sincnet")]
#[command(author, version, about = "SincNet: learned band-pass front-end for raw audio", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract features from a WAV file or from seeded noise
    Features {
        /// Path to the audio file (WAV format)
        #[arg(long, conflicts_with = "random_samples", required_unless_present = "random_samples")]
        audio: Option<PathBuf>,

        /// Use N samples of uniform noise in [-1, 1) instead of a file
        #[arg(long)]
        random_samples: Option<usize>,

        /// Batch size for noise input
        #[arg(long, default_value_t = 1)]
        batch: usize,

        /// Seed for noise input
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// HuggingFace-style config.json
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pretrained weights (safetensors); random init when absent
        #[arg(long)]
        weights: Option<PathBuf>,

        /// Device to use (cpu, metal, cuda)
        #[arg(long, default_value = "cpu")]
        device: String,
    },

    /// Print the effective cutoffs of every sinc filter
    Filters {
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        weights: Option<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print per-layer lengths for an input of N samples
    Shape {
        #[arg(long)]
        samples: usize,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run a simple test to verify the setup
    Test {
        /// Device to use (cpu, metal, cuda)
        #[arg(long, default_value = "cpu")]
        device: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Features {
            audio: audio_path,
            random_samples,
            batch,
            seed,
            config,
            weights,
            device,
        } => {
            let device = select_device(&device)?;
            let config = resolve_config(config.as_deref(), weights.as_deref())?;
            let model = build_model(config, weights.as_deref(), &device)?;

            let waveforms = match (audio_path, random_samples) {
                (Some(path), _) => {
                    println!("Audio file: {}", path.display());
                    let buffer = audio::load_waveform(&path, model.config().sample_rate)?;
                    println!("Duration: {:.2}s", buffer.duration());
                    audio::waveform_tensor(&buffer, &device)?
                }
                (None, Some(samples)) => {
                    println!("Noise: {batch} × {samples} samples, seed {seed}");
                    noise(batch, samples, seed, &device)?
                }
                (None, None) => bail!("either --audio or --random-samples is required"),
            };

            let start = Instant::now();
            let features = model.forward(&waveforms)?;
            let elapsed = start.elapsed();

            let (_, _, frames) = features.dims3()?;
            println!("Input shape:  {:?}", waveforms.dims());
            println!("Output shape: {:?}", features.dims());
            println!(
                "Frame hop: {} samples ({:.1} ms)",
                model.hop_samples(),
                model.hop_samples() as f64 * 1000.0 / model.config().sample_rate as f64
            );
            print_stats(&features)?;
            println!("⏱️  {} frames in {:.2?}", frames, elapsed);
            Ok(())
        }

        Commands::Filters {
            config,
            weights,
            json,
        } => {
            let config = resolve_config(config.as_deref(), weights.as_deref())?;
            let model = build_model(config, weights.as_deref(), &Device::Cpu)?;
            let bands = model.sinc_layer().filter_bank().cutoffs()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&bands)?);
                return Ok(());
            }

            println!("{:>4} {:>10} {:>10} {:>10} {:>10}", "#", "low Hz", "high Hz", "band Hz", "center Hz");
            for (i, band) in bands.iter().enumerate() {
                println!(
                    "{:>4} {:>10.1} {:>10.1} {:>10.1} {:>10.1}",
                    i,
                    band.low_hz,
                    band.high_hz,
                    band.bandwidth_hz(),
                    band.center_hz()
                );
            }
            Ok(())
        }

        Commands::Shape { samples, config } => {
            let config = resolve_config(config.as_deref(), None)?;
            config.validate()?;

            let names = ["sinc conv", "pool", "conv 1", "pool", "conv 2", "pool"];
            let mut len = samples;
            println!("{:<10} {:>8}", "input", len);
            for (name, layer) in names.iter().zip(config.layer_geometry()) {
                len = layer.output_len(len).with_context(|| {
                    format!(
                        "{samples} samples is shorter than the receptive field of {} samples",
                        config.receptive_field()
                    )
                })?;
                println!("{:<10} {:>8}", name, len);
            }
            println!(
                "Output: ({}, {}) | receptive field {} | hop {}",
                config.num_conv_filters,
                len,
                config.receptive_field(),
                config.hop_samples()
            );
            Ok(())
        }

        Commands::Test { device } => {
            println!("🧪 SincNet - Setup Test");
            println!("=======================");

            let device = select_device(&device)?;
            println!("Device: {:?}", device);

            let model = build_model(SincNetConfig::default(), None, &device)?;
            let sample_rate = model.config().sample_rate;
            let x = noise(1, sample_rate, 0, &device)?;
            let y = model.forward(&x)?;

            let expected = [1, model.output_dim(), model.output_len(sample_rate).unwrap_or(0)];
            if y.dims() != expected.as_slice() {
                bail!("unexpected output shape {:?}, expected {:?}", y.dims(), expected);
            }
            println!("✅ Test passed. Output shape: {:?}", y.dims());
            Ok(())
        }
    }
}

/// `--config` wins; otherwise a `config.json` next to the weights; otherwise defaults.
fn resolve_config(config: Option<&Path>, weights: Option<&Path>) -> Result<SincNetConfig> {
    let sibling = weights
        .and_then(Path::parent)
        .map(|dir| dir.join("config.json"))
        .filter(|p| p.exists());

    match config.map(Path::to_path_buf).or(sibling) {
        Some(path) => {
            info!("Конфигурация: {}", path.display());
            SincNetConfig::from_hf_config(&path)
                .with_context(|| format!("failed to read {}", path.display()))
        }
        None => Ok(SincNetConfig::default()),
    }
}

fn build_model(config: SincNetConfig, weights: Option<&Path>, device: &Device) -> Result<SincNet> {
    let start = Instant::now();
    let model = match weights {
        Some(path) => SincNet::from_safetensors(config, &[path], device)?,
        None => {
            warn!("Веса не заданы: случайная инициализация свёрток");
            let varmap = VarMap::new();
            SincNet::new(config, VarBuilder::from_varmap(&varmap, DType::F32, device))?
        }
    };
    info!("Модель готова за {:.2?}", start.elapsed());
    Ok(model)
}

/// Uniform noise in [-1, 1), `(batch, 1, samples)`.
fn noise(batch: usize, samples: usize, seed: u64, device: &Device) -> Result<Tensor> {
    let mut rng = StdRng::seed_from_u64(seed);
    let data: Vec<f32> = (0..batch * samples)
        .map(|_| rng.gen_range(-1.0f32..1.0))
        .collect();
    Ok(Tensor::from_vec(data, (batch, 1, samples), device)?)
}

fn print_stats(features: &Tensor) -> Result<()> {
    let flat = features.flatten_all()?.to_dtype(DType::F32)?;
    let mean = flat.mean_all()?.to_scalar::<f32>()?;
    let std = flat
        .affine(1.0, -(mean as f64))?
        .sqr()?
        .mean_all()?
        .sqrt()?
        .to_scalar::<f32>()?;
    println!(
        "Stats: min={:.4} max={:.4} mean={:.4} std={:.4}",
        flat.min(0)?.to_scalar::<f32>()?,
        flat.max(0)?.to_scalar::<f32>()?,
        mean,
        std
    );
    Ok(())
}
