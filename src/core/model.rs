use crate::core::loader::{Architecture, ModelFiles};
use crate::utils::error::{Result, ServerError};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::{llama, mistral, phi3, qwen2};

/// llama 的 KV cache 是外部物件，其餘架構由模型自己持有
pub enum CausalLm {
    Llama {
        model: llama::Llama,
        config: llama::Config,
        cache: llama::Cache,
        dtype: DType,
        device: Device,
    },
    Mistral(mistral::Model),
    Qwen2(qwen2::ModelForCausalLM),
    Phi3(phi3::Model),
}

impl CausalLm {
    pub fn load(files: &ModelFiles, dtype: DType, device: &Device) -> Result<Self> {
        let config_bytes = std::fs::read(&files.config)?;

        // safetensors 以 mmap 載入，檔案在模型生命週期內不可被改寫
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&files.weights, dtype, device)? };

        let model = match files.architecture {
            Architecture::Llama => {
                let raw: llama::LlamaConfig = serde_json::from_slice(&config_bytes)?;
                let config = raw.into_config(false);
                let model = llama::Llama::load(vb, &config)?;
                let cache = llama::Cache::new(true, dtype, &config, device)?;
                CausalLm::Llama {
                    model,
                    config,
                    cache,
                    dtype,
                    device: device.clone(),
                }
            }
            Architecture::Mistral => {
                let config: mistral::Config = serde_json::from_slice(&config_bytes)?;
                CausalLm::Mistral(mistral::Model::new(&config, vb)?)
            }
            Architecture::Qwen2 => {
                let config: qwen2::Config = serde_json::from_slice(&config_bytes)?;
                CausalLm::Qwen2(qwen2::ModelForCausalLM::new(&config, vb)?)
            }
            Architecture::Phi3 => {
                let config: phi3::Config = serde_json::from_slice(&config_bytes)?;
                CausalLm::Phi3(phi3::Model::new(&config, vb)?)
            }
        };

        Ok(model)
    }

    pub fn architecture(&self) -> Architecture {
        match self {
            CausalLm::Llama { .. } => Architecture::Llama,
            CausalLm::Mistral(_) => Architecture::Mistral,
            CausalLm::Qwen2(_) => Architecture::Qwen2,
            CausalLm::Phi3(_) => Architecture::Phi3,
        }
    }

    /// 回傳最後一個位置的 logits，一維 f32
    pub fn forward(&mut self, input: &Tensor, offset: usize) -> Result<Tensor> {
        let logits = match self {
            CausalLm::Llama { model, cache, .. } => model.forward(input, offset, cache)?,
            CausalLm::Mistral(model) => model.forward(input, offset)?,
            CausalLm::Qwen2(model) => model.forward(input, offset)?,
            CausalLm::Phi3(model) => model.forward(input, offset)?,
        };
        Ok(logits.flatten_all()?.to_dtype(DType::F32)?)
    }

    pub fn clear_kv_cache(&mut self) -> Result<()> {
        match self {
            CausalLm::Llama {
                config,
                cache,
                dtype,
                device,
                ..
            } => {
                *cache = llama::Cache::new(true, *dtype, config, device)?;
            }
            CausalLm::Mistral(model) => model.clear_kv_cache(),
            CausalLm::Qwen2(model) => model.clear_kv_cache(),
            CausalLm::Phi3(model) => model.clear_kv_cache(),
        }
        Ok(())
    }
}

impl std::fmt::Debug for CausalLm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CausalLm({})", self.architecture())
    }
}

pub(crate) fn ensure_tokens(ids: &[u32]) -> Result<()> {
    if ids.is_empty() {
        return Err(ServerError::InvalidPromptError {
            message: "prompt produced no tokens".to_string(),
        });
    }
    Ok(())
}
