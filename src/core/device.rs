use crate::utils::error::{Result, ServerError};
use candle_core::{DType, Device};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl FromStr for DevicePreference {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            "metal" | "mps" => Ok(Self::Metal),
            other => Err(ServerError::InvalidConfigValueError {
                field: "device".to_string(),
                value: other.to_string(),
                reason: "Expected one of: auto, cpu, cuda, metal".to_string(),
            }),
        }
    }
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
            Self::Metal => "metal",
        };
        f.write_str(name)
    }
}

/// Metal 優先，其次 CUDA，最後退回 CPU
pub fn select_device(preference: DevicePreference) -> Result<Device> {
    match preference {
        DevicePreference::Cpu => Ok(Device::Cpu),
        DevicePreference::Cuda => Ok(Device::new_cuda(0)?),
        DevicePreference::Metal => Ok(Device::new_metal(0)?),
        DevicePreference::Auto => {
            if candle_core::utils::metal_is_available() {
                match Device::new_metal(0) {
                    Ok(device) => return Ok(device),
                    Err(e) => tracing::warn!("⚠️ Metal reported available but failed: {}", e),
                }
            }
            if candle_core::utils::cuda_is_available() {
                match Device::new_cuda(0) {
                    Ok(device) => return Ok(device),
                    Err(e) => tracing::warn!("⚠️ CUDA reported available but failed: {}", e),
                }
            }
            Ok(Device::Cpu)
        }
    }
}

pub fn device_label(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "cpu",
        Device::Cuda(_) => "cuda",
        Device::Metal(_) => "mps",
    }
}

/// "auto" 時 CPU 用 f32，加速器用 f16
pub fn select_dtype(requested: &str, device: &Device) -> Result<DType> {
    match requested.trim().to_ascii_lowercase().as_str() {
        "auto" | "" => Ok(if device.is_cpu() {
            DType::F32
        } else {
            DType::F16
        }),
        "f32" => Ok(DType::F32),
        "f16" => Ok(DType::F16),
        "bf16" => Ok(DType::BF16),
        other => Err(ServerError::InvalidConfigValueError {
            field: "model.dtype".to_string(),
            value: other.to_string(),
            reason: "Expected one of: auto, f32, f16, bf16".to_string(),
        }),
    }
}
