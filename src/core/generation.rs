use crate::core::device::{device_label, select_device, select_dtype, DevicePreference};
use crate::core::loader::ModelFiles;
use crate::core::model::{ensure_tokens, CausalLm};
use crate::domain::model::GenerationParams;
use crate::domain::ports::{ConfigProvider, TextGenerator};
use crate::utils::error::{Result, ServerError};
use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokenizers::Tokenizer;

const EOS_CANDIDATES: &[&str] = &["</s>", "<|endoftext|>", "<|im_end|>", "<|end|>", "<|eot_id|>"];

struct Engine {
    model: CausalLm,
    tokenizer: Tokenizer,
    device: Device,
    eos_token_ids: HashSet<u32>,
}

impl Engine {
    fn generate(&mut self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(ServerError::tokenizer)?;
        let mut tokens = encoding.get_ids().to_vec();
        ensure_tokens(&tokens)?;

        // 每個請求都是獨立的序列
        self.model.clear_kv_cache()?;

        let prompt_len = tokens.len();
        let mut logits_processor = build_logits_processor(params);
        let started = Instant::now();

        for step in 0..params.max_new_tokens {
            let (context, offset) = if step == 0 {
                (&tokens[..], 0)
            } else {
                let last = tokens.len() - 1;
                (&tokens[last..], last)
            };

            let input = Tensor::new(context, &self.device)?.unsqueeze(0)?;
            let logits = self.model.forward(&input, offset)?;
            let next_token = logits_processor.sample(&logits)?;
            tokens.push(next_token);

            if self.eos_token_ids.contains(&next_token) {
                break;
            }
        }

        let generated = tokens.len() - prompt_len;
        tracing::debug!(
            "Generated {} tokens ({} prompt) in {:?}",
            generated,
            prompt_len,
            started.elapsed()
        );

        self.tokenizer
            .decode(&tokens, true)
            .map_err(ServerError::tokenizer)
    }
}

pub(crate) fn build_logits_processor(params: &GenerationParams) -> LogitsProcessor {
    let seed = params.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default()
    });

    let sampling = if params.do_sample {
        Sampling::TopP {
            p: params.top_p,
            temperature: params.temperature,
        }
    } else {
        Sampling::ArgMax
    };

    LogitsProcessor::from_sampling(seed, sampling)
}

pub(crate) fn collect_eos_ids(tokenizer: &Tokenizer, configured: &[u32]) -> HashSet<u32> {
    let mut ids: HashSet<u32> = configured.iter().copied().collect();
    for candidate in EOS_CANDIDATES {
        if let Some(id) = tokenizer.token_to_id(candidate) {
            ids.insert(id);
        }
    }
    ids
}

/// 以 candle 執行的生成器，模型在行程內只載入一次
pub struct CandleGenerator {
    engine: Arc<Mutex<Engine>>,
    params: GenerationParams,
    device_label: &'static str,
}

impl CandleGenerator {
    pub fn load<C: ConfigProvider>(config: &C) -> Result<Self> {
        let preference: DevicePreference = config.device().parse()?;
        let device = select_device(preference)?;
        let device_label = device_label(&device);
        tracing::info!("🚀 Using device: {}", device_label);

        let files = ModelFiles::resolve(config.model_path())?;
        let dtype = select_dtype(config.dtype(), &device)?;

        tracing::info!("📦 Loading tokenizer from {}", files.tokenizer.display());
        let tokenizer = Tokenizer::from_file(&files.tokenizer).map_err(ServerError::tokenizer)?;

        tracing::info!(
            "📦 Loading {} model ({} weight file(s), {:?})",
            files.architecture,
            files.weights.len(),
            dtype
        );
        let started = Instant::now();
        let model = CausalLm::load(&files, dtype, &device).map_err(|e| match e {
            ServerError::CandleError(inner) => ServerError::ModelLoadError {
                path: files.root.display().to_string(),
                message: inner.to_string(),
            },
            other => other,
        })?;
        tracing::info!("✅ Model loaded in {:?}", started.elapsed());

        let eos_token_ids = collect_eos_ids(&tokenizer, &files.eos_token_ids);
        if eos_token_ids.is_empty() {
            tracing::warn!("⚠️ No end-of-sequence token found, generation always runs to max_new_tokens");
        }

        Ok(Self {
            engine: Arc::new(Mutex::new(Engine {
                model,
                tokenizer,
                device,
                eos_token_ids,
            })),
            params: config.generation_params(),
            device_label,
        })
    }
}

#[async_trait]
impl TextGenerator for CandleGenerator {
    async fn generate(&self, prompt: String) -> Result<String> {
        let engine = Arc::clone(&self.engine);
        let params = self.params.clone();

        tokio::task::spawn_blocking(move || {
            let mut engine = engine.lock().map_err(|_| ServerError::GenerationError {
                message: "model state corrupted (lock poisoned), restart the server".to_string(),
            })?;
            engine.generate(&prompt, &params)
        })
        .await
        .map_err(|e| ServerError::GenerationError {
            message: format!("generation task failed: {}", e),
        })?
    }

    fn params(&self) -> &GenerationParams {
        &self.params
    }

    fn device_name(&self) -> String {
        self.device_label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const WORD_LEVEL_TOKENIZER: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": {"hello": 0, "world": 1, "</s>": 2, "[UNK]": 3},
            "unk_token": "[UNK]"
        }
    }"#;

    #[test]
    fn test_greedy_picks_argmax() {
        let params = GenerationParams {
            do_sample: false,
            ..GenerationParams::default()
        };
        let mut processor = build_logits_processor(&params);
        let logits = Tensor::new(&[0.1f32, 3.0, 0.2, -1.0], &Device::Cpu).unwrap();
        assert_eq!(processor.sample(&logits).unwrap(), 1);
    }

    #[test]
    fn test_top_p_keeps_dominant_token() {
        let params = GenerationParams {
            seed: Some(42),
            top_p: 0.5,
            ..GenerationParams::default()
        };
        let mut processor = build_logits_processor(&params);
        let logits = Tensor::new(&[0.0f32, 0.0, 20.0, 0.0], &Device::Cpu).unwrap();
        for _ in 0..10 {
            assert_eq!(processor.sample(&logits).unwrap(), 2);
        }
    }

    const TINY_LLAMA_CONFIG: &str = r#"{
        "model_type": "llama",
        "hidden_size": 16,
        "intermediate_size": 32,
        "vocab_size": 4,
        "num_hidden_layers": 2,
        "num_attention_heads": 2,
        "num_key_value_heads": 2,
        "rms_norm_eps": 1e-5,
        "max_position_embeddings": 64,
        "eos_token_id": 2
    }"#;

    /// 隨機權重的迷你 llama，只用來跑通載入與生成流程
    fn write_tiny_llama(dir: &std::path::Path) {
        use candle_core::DType;
        use candle_nn::{VarBuilder, VarMap};
        use candle_transformers::models::llama;

        std::fs::write(dir.join("config.json"), TINY_LLAMA_CONFIG).unwrap();
        std::fs::write(dir.join("tokenizer.json"), WORD_LEVEL_TOKENIZER).unwrap();

        let raw: llama::LlamaConfig = serde_json::from_str(TINY_LLAMA_CONFIG).unwrap();
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        llama::Llama::load(vb, &raw.into_config(false)).unwrap();
        varmap.save(dir.join("model.safetensors")).unwrap();
    }

    #[tokio::test]
    async fn test_tiny_llama_generates_from_prompt() {
        let dir = tempfile::tempdir().unwrap();
        write_tiny_llama(dir.path());

        let settings = crate::config::ServerSettings {
            model_path: dir.path().to_str().unwrap().to_string(),
            device: "cpu".to_string(),
            dtype: "f32".to_string(),
            generation: GenerationParams {
                max_new_tokens: 8,
                seed: Some(7),
                ..GenerationParams::default()
            },
            ..crate::config::ServerSettings::default()
        };
        let generator = CandleGenerator::load(&settings).unwrap();
        assert_eq!(generator.device_name(), "cpu");
        assert_eq!(generator.params().max_new_tokens, 8);

        // 同一個模型連續處理兩個請求，KV cache 每次重置
        for _ in 0..2 {
            let text = generator.generate("hello world".to_string()).await.unwrap();
            assert!(text.starts_with("hello world"), "got {:?}", text);

            let words: Vec<&str> = text.split_whitespace().collect();
            assert!(words.len() <= 2 + 8, "got {:?}", text);
            if let Some(pos) = words.iter().position(|w| *w == "</s>") {
                assert_eq!(pos, words.len() - 1, "generation continued past EOS: {:?}", text);
            }
        }

        let err = generator.generate(String::new()).await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidPromptError { .. }));

        // 空 prompt 之後模型仍可用
        assert!(generator.generate("world".to_string()).await.is_ok());
    }

    #[test]
    fn test_collect_eos_ids_merges_config_and_vocab() {
        let tokenizer = Tokenizer::from_str(WORD_LEVEL_TOKENIZER).unwrap();
        let ids = collect_eos_ids(&tokenizer, &[7]);
        assert!(ids.contains(&2));
        assert!(ids.contains(&7));
        assert_eq!(ids.len(), 2);
    }
}
