#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::core::device::{select_dtype, DevicePreference};
use crate::core::ConfigProvider;
use crate::domain::model::GenerationParams;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL_PATH: &str = "./friend";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 11434;

/// 合併預設值、TOML 與命令列之後的最終設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub model_path: String,
    pub device: String,
    pub dtype: String,
    pub generation: GenerationParams,
    pub log_level: Option<String>,
    pub json_logs: bool,
    pub monitor: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            model_path: DEFAULT_MODEL_PATH.to_string(),
            device: DevicePreference::Auto.to_string(),
            dtype: "auto".to_string(),
            generation: GenerationParams::default(),
            log_level: None,
            json_logs: false,
            monitor: false,
        }
    }
}

impl ConfigProvider for ServerSettings {
    fn model_path(&self) -> &str {
        &self.model_path
    }

    fn bind_address(&self) -> String {
        // IPv6 位址需要方括號才能接埠號
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    fn device(&self) -> &str {
        &self.device
    }

    fn dtype(&self) -> &str {
        &self.dtype
    }

    fn generation_params(&self) -> GenerationParams {
        self.generation.clone()
    }
}

impl Validate for ServerSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("server.host", &self.host)?;
        validation::validate_path("model.path", &self.model_path)?;
        self.device.parse::<DevicePreference>()?;
        select_dtype(&self.dtype, &candle_core::Device::Cpu)?;

        let generation = &self.generation;
        validation::validate_positive_number(
            "generation.max_new_tokens",
            generation.max_new_tokens,
            1,
        )?;
        validation::validate_open_closed_range("generation.top_p", generation.top_p, 0.0, 1.0)?;
        // 貪婪解碼時不使用 temperature
        if generation.do_sample {
            validation::validate_open_closed_range(
                "generation.temperature",
                generation.temperature,
                0.0,
                10.0,
            )?;
        }

        tracing::debug!("✅ Server configuration validation passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = ServerSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.bind_address(), "127.0.0.1:11434");
        assert_eq!(settings.model_path(), "./friend");
    }

    #[test]
    fn test_bind_address_brackets_ipv6_hosts() {
        let mut settings = ServerSettings {
            host: "::1".to_string(),
            ..ServerSettings::default()
        };
        assert_eq!(settings.bind_address(), "[::1]:11434");
        assert!(settings
            .bind_address()
            .parse::<std::net::SocketAddr>()
            .is_ok());

        settings.host = "[::]".to_string();
        assert_eq!(settings.bind_address(), "[::]:11434");

        settings.host = "localhost".to_string();
        assert_eq!(settings.bind_address(), "localhost:11434");
    }

    #[test]
    fn test_rejects_bad_sampling_values() {
        let mut settings = ServerSettings::default();
        settings.generation.top_p = 1.5;
        assert!(settings.validate().is_err());

        let mut settings = ServerSettings::default();
        settings.generation.temperature = 0.0;
        assert!(settings.validate().is_err());

        settings.generation.do_sample = false;
        assert!(settings.validate().is_ok());

        let mut settings = ServerSettings::default();
        settings.generation.max_new_tokens = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rejects_unknown_device() {
        let settings = ServerSettings {
            device: "tpu".to_string(),
            ..ServerSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
