//! Compute device selection and device checks.

use candle_core::{Device, Tensor};

use crate::error::{ModelError, Result};

/// Resolve a device name (`cpu`, `cuda`, `cuda:N`, `metal`, `metal:N`).
///
/// Asking for an accelerator this build or machine does not provide is an
/// error; there is no silent fallback to the CPU.
pub fn select_device(name: &str) -> Result<Device> {
    let name = name.trim().to_ascii_lowercase();
    let (kind, ordinal) = match name.split_once(':') {
        Some((kind, n)) => {
            let ordinal = n
                .parse::<usize>()
                .map_err(|_| ModelError::Device(format!("invalid device ordinal in '{name}'")))?;
            (kind, ordinal)
        }
        None => (name.as_str(), 0),
    };

    match kind {
        "cpu" => Ok(Device::Cpu),
        "cuda" => cuda_device(ordinal),
        "metal" => metal_device(ordinal),
        other => Err(ModelError::Device(format!("unknown device '{other}'"))),
    }
}

#[cfg(feature = "cuda")]
fn cuda_device(ordinal: usize) -> Result<Device> {
    let device = Device::new_cuda(ordinal)
        .map_err(|e| ModelError::Device(format!("CUDA device {ordinal} unavailable: {e}")))?;
    tracing::info!("Using CUDA device {}", ordinal);
    Ok(device)
}

#[cfg(not(feature = "cuda"))]
fn cuda_device(_ordinal: usize) -> Result<Device> {
    Err(ModelError::Device("built without the `cuda` feature".to_string()))
}

#[cfg(feature = "metal")]
fn metal_device(ordinal: usize) -> Result<Device> {
    let device = Device::new_metal(ordinal)
        .map_err(|e| ModelError::Device(format!("Metal device {ordinal} unavailable: {e}")))?;
    tracing::info!("Using Metal device {}", ordinal);
    Ok(device)
}

#[cfg(not(feature = "metal"))]
fn metal_device(_ordinal: usize) -> Result<Device> {
    Err(ModelError::Device("built without the `metal` feature".to_string()))
}

/// Short label for logs and error messages.
pub fn device_label(device: &Device) -> String {
    format!("{:?}", device.location())
}

/// Fail with `DeviceMismatch` unless `tensor` lives on `expected`.
pub fn ensure_device(expected: &Device, tensor: &Tensor) -> Result<()> {
    if expected.same_device(tensor.device()) {
        Ok(())
    } else {
        Err(ModelError::DeviceMismatch {
            expected: device_label(expected),
            found: device_label(tensor.device()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_selected() {
        assert!(select_device("cpu").unwrap().is_cpu());
        assert!(select_device(" CPU ").unwrap().is_cpu());
    }

    #[test]
    fn test_unknown_device_rejected() {
        assert!(matches!(select_device("tpu"), Err(ModelError::Device(_))));
        assert!(matches!(select_device("cuda:x"), Err(ModelError::Device(_))));
    }

    #[cfg(not(feature = "cuda"))]
    #[test]
    fn test_missing_accelerator_is_an_error() {
        assert!(matches!(select_device("cuda"), Err(ModelError::Device(_))));
    }

    #[test]
    fn test_same_device_passes() {
        let t = Tensor::zeros((2, 2), candle_core::DType::F32, &Device::Cpu).unwrap();
        assert!(ensure_device(&Device::Cpu, &t).is_ok());
    }
}
