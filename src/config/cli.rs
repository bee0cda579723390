use crate::config::toml_config::TomlConfig;
use crate::config::ServerSettings;
use crate::utils::error::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Parser)]
#[command(name = "llm-server")]
#[command(about = "Serve a local causal language model over HTTP")]
pub struct CliConfig {
    /// Path to a TOML configuration file; flags below override it
    #[arg(short, long)]
    pub config: Option<String>,

    /// Model directory (config.json, tokenizer.json, *.safetensors)
    #[arg(long, env = "LLM_MODEL_PATH")]
    pub model_path: Option<String>,

    #[arg(long, env = "LLM_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "LLM_PORT")]
    pub port: Option<u16>,

    /// auto, cpu, cuda or metal
    #[arg(long, env = "LLM_DEVICE")]
    pub device: Option<String>,

    /// auto, f32, f16 or bf16
    #[arg(long)]
    pub dtype: Option<String>,

    #[arg(long)]
    pub max_new_tokens: Option<usize>,

    #[arg(long)]
    pub temperature: Option<f64>,

    #[arg(long)]
    pub top_p: Option<f64>,

    /// Fixed RNG seed for reproducible sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Disable sampling and always pick the most likely token
    #[arg(long, conflicts_with = "sample")]
    pub greedy: bool,

    /// Force top-p sampling on, even if the config file disables it
    #[arg(long)]
    pub sample: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    #[arg(long, help = "Log process CPU and memory usage")]
    pub monitor: bool,
}

impl CliConfig {
    /// 預設值 < TOML 檔 < 命令列
    pub fn resolve(&self) -> Result<ServerSettings> {
        let mut settings = match &self.config {
            Some(path) => TomlConfig::from_file(path)?.into_settings(),
            None => ServerSettings::default(),
        };
        self.apply_to(&mut settings);
        Ok(settings)
    }

    fn apply_to(&self, settings: &mut ServerSettings) {
        if let Some(path) = &self.model_path {
            settings.model_path = path.clone();
        }
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(device) = &self.device {
            settings.device = device.clone();
        }
        if let Some(dtype) = &self.dtype {
            settings.dtype = dtype.clone();
        }

        let params = &mut settings.generation;
        if let Some(v) = self.max_new_tokens {
            params.max_new_tokens = v;
        }
        if let Some(v) = self.temperature {
            params.temperature = v;
        }
        if let Some(v) = self.top_p {
            params.top_p = v;
        }
        if self.seed.is_some() {
            params.seed = self.seed;
        }
        if self.greedy {
            params.do_sample = false;
        } else if self.sample {
            params.do_sample = true;
        }

        settings.json_logs |= self.json_logs;
        settings.monitor |= self.monitor;
    }
}
