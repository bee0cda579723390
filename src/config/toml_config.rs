use crate::config::ServerSettings;
use crate::utils::error::{Result, ServerError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub server: Option<ServerSection>,
    pub model: Option<ModelSection>,
    pub generation: Option<GenerationSection>,
    pub logging: Option<LoggingSection>,
    pub monitoring: Option<MonitoringSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSection {
    pub path: Option<String>,
    pub device: Option<String>,
    pub dtype: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSection {
    pub max_new_tokens: Option<usize>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub do_sample: Option<bool>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub json: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSection {
    pub enabled: bool,
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("static regex"))
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ServerError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| ServerError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${LLM_MODEL_PATH})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    /// 把檔案中有寫的欄位覆蓋到 settings 上
    pub fn apply_to(&self, settings: &mut ServerSettings) {
        if let Some(server) = &self.server {
            if let Some(host) = &server.host {
                settings.host = host.clone();
            }
            if let Some(port) = server.port {
                settings.port = port;
            }
        }

        if let Some(model) = &self.model {
            if let Some(path) = &model.path {
                settings.model_path = path.clone();
            }
            if let Some(device) = &model.device {
                settings.device = device.clone();
            }
            if let Some(dtype) = &model.dtype {
                settings.dtype = dtype.clone();
            }
        }

        if let Some(generation) = &self.generation {
            let params = &mut settings.generation;
            if let Some(v) = generation.max_new_tokens {
                params.max_new_tokens = v;
            }
            if let Some(v) = generation.temperature {
                params.temperature = v;
            }
            if let Some(v) = generation.top_p {
                params.top_p = v;
            }
            if let Some(v) = generation.do_sample {
                params.do_sample = v;
            }
            if generation.seed.is_some() {
                params.seed = generation.seed;
            }
        }

        if let Some(logging) = &self.logging {
            if logging.level.is_some() {
                settings.log_level = logging.level.clone();
            }
            if let Some(json) = logging.json {
                settings.json_logs = json;
            }
        }

        if let Some(monitoring) = &self.monitoring {
            settings.monitor = monitoring.enabled;
        }
    }

    pub fn into_settings(self) -> ServerSettings {
        let mut settings = ServerSettings::default();
        self.apply_to(&mut settings);
        settings
    }
}
