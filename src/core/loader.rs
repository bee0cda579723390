use crate::utils::error::{Result, ServerError};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const SINGLE_WEIGHTS_FILE: &str = "model.safetensors";
const SHARDED_INDEX_FILE: &str = "model.safetensors.index.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Llama,
    Mistral,
    Qwen2,
    Phi3,
}

impl Architecture {
    pub fn from_model_type(model_type: &str) -> Result<Self> {
        match model_type {
            "llama" => Ok(Self::Llama),
            "mistral" => Ok(Self::Mistral),
            "qwen2" => Ok(Self::Qwen2),
            "phi3" => Ok(Self::Phi3),
            other => Err(ServerError::UnsupportedArchitectureError {
                model_type: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Llama => "llama",
            Self::Mistral => "mistral",
            Self::Qwen2 => "qwen2",
            Self::Phi3 => "phi3",
        };
        f.write_str(name)
    }
}

/// config.json 裡我們在分派前需要的欄位
#[derive(Debug, Deserialize)]
struct ConfigHeader {
    model_type: Option<String>,
    eos_token_id: Option<EosTokenId>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EosTokenId {
    Single(u32),
    Many(Vec<u32>),
}

#[derive(Debug, Deserialize)]
struct ShardIndex {
    weight_map: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub root: PathBuf,
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: Vec<PathBuf>,
    pub architecture: Architecture,
    pub eos_token_ids: Vec<u32>,
}

impl ModelFiles {
    pub fn resolve<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let root = dir.as_ref().to_path_buf();
        let load_error = |message: String| ServerError::ModelLoadError {
            path: root.display().to_string(),
            message,
        };

        if !root.is_dir() {
            return Err(load_error("model directory does not exist".to_string()));
        }

        let config = root.join(CONFIG_FILE);
        if !config.is_file() {
            return Err(load_error(format!("{} not found", CONFIG_FILE)));
        }

        let tokenizer = root.join(TOKENIZER_FILE);
        if !tokenizer.is_file() {
            return Err(load_error(format!("{} not found", TOKENIZER_FILE)));
        }

        let weights = resolve_weights(&root).map_err(|e| match e {
            ServerError::ModelLoadError { .. } => e,
            other => load_error(other.to_string()),
        })?;

        let header: ConfigHeader = serde_json::from_str(&std::fs::read_to_string(&config)?)?;
        let model_type = header
            .model_type
            .ok_or_else(|| load_error("config.json has no model_type".to_string()))?;
        let architecture = Architecture::from_model_type(&model_type)?;

        let eos_token_ids = match header.eos_token_id {
            Some(EosTokenId::Single(id)) => vec![id],
            Some(EosTokenId::Many(ids)) => ids,
            None => Vec::new(),
        };

        tracing::debug!(
            "Resolved model files: arch={}, shards={}, eos={:?}",
            architecture,
            weights.len(),
            eos_token_ids
        );

        Ok(Self {
            root,
            config,
            tokenizer,
            weights,
            architecture,
            eos_token_ids,
        })
    }
}

fn resolve_weights(root: &Path) -> Result<Vec<PathBuf>> {
    let single = root.join(SINGLE_WEIGHTS_FILE);
    if single.is_file() {
        return Ok(vec![single]);
    }

    let index_path = root.join(SHARDED_INDEX_FILE);
    if !index_path.is_file() {
        return Err(ServerError::ModelLoadError {
            path: root.display().to_string(),
            message: format!(
                "neither {} nor {} found",
                SINGLE_WEIGHTS_FILE, SHARDED_INDEX_FILE
            ),
        });
    }

    let index: ShardIndex = serde_json::from_str(&std::fs::read_to_string(&index_path)?)?;
    // 同一個 shard 會對應很多權重名稱，去重並保持順序穩定
    let shard_names: BTreeSet<String> = index.weight_map.into_values().collect();

    let mut shards = Vec::with_capacity(shard_names.len());
    for name in shard_names {
        let path = root.join(&name);
        if !path.is_file() {
            return Err(ServerError::ModelLoadError {
                path: root.display().to_string(),
                message: format!("shard {} listed in index but missing", name),
            });
        }
        shards.push(path);
    }

    if shards.is_empty() {
        return Err(ServerError::ModelLoadError {
            path: root.display().to_string(),
            message: "shard index has an empty weight_map".to_string(),
        });
    }

    Ok(shards)
}
