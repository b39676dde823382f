//! Выбор вычислительного устройства candle по имени.

use candle_core::Device;
use tracing::debug;

use crate::error::{SincError, SincResult};

/// Создать устройство по имени: `cpu`, `metal` или `cuda`.
///
/// Metal и CUDA доступны только если candle собран с соответствующей feature;
/// иначе возвращается ошибка, а не тихий откат на CPU.
pub fn select_device(name: &str) -> SincResult<Device> {
    let device = match name.to_ascii_lowercase().as_str() {
        "cpu" => Device::Cpu,
        "metal" => {
            // candle может паниковать при инициализации Metal в неподходящем окружении.
            let prev_hook = std::panic::take_hook();
            std::panic::set_hook(Box::new(|_| {}));
            let res = std::panic::catch_unwind(|| Device::new_metal(0));
            std::panic::set_hook(prev_hook);

            match res {
                Ok(dev) => dev?,
                Err(_) => {
                    return Err(SincError::Config(
                        "Metal initialisation is not available here, use --device cpu".into(),
                    ));
                }
            }
        }
        "cuda" => Device::new_cuda(0)?,
        other => {
            return Err(SincError::config(
                "device",
                other,
                "expected one of cpu, metal, cuda",
            ));
        }
    };

    debug!("Selected device: {:?}", device);
    Ok(device)
}
