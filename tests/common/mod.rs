#![allow(dead_code)]

use async_trait::async_trait;
use local_llm_server::{GenerationParams, Result, ServerError, TextGenerator};
use std::sync::Mutex;

/// 不載入模型，把 prompt 原樣接上固定續寫
pub struct EchoGenerator {
    params: GenerationParams,
    suffix: String,
    pub seen_prompts: Mutex<Vec<String>>,
}

impl EchoGenerator {
    pub fn new(suffix: &str) -> Self {
        Self {
            params: GenerationParams::default(),
            suffix: suffix.to_string(),
            seen_prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(&self, prompt: String) -> Result<String> {
        self.seen_prompts.lock().unwrap().push(prompt.clone());
        Ok(format!("{}{}", prompt, self.suffix))
    }

    fn params(&self) -> &GenerationParams {
        &self.params
    }

    fn device_name(&self) -> String {
        "cpu".to_string()
    }
}

pub struct FailingGenerator {
    params: GenerationParams,
}

impl FailingGenerator {
    pub fn new() -> Self {
        Self {
            params: GenerationParams::default(),
        }
    }
}

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: String) -> Result<String> {
        Err(ServerError::GenerationError {
            message: "out of memory".to_string(),
        })
    }

    fn params(&self) -> &GenerationParams {
        &self.params
    }

    fn device_name(&self) -> String {
        "cpu".to_string()
    }
}
