//! Client for a running `/query` endpoint, with the chat prompt templates
//! and reply cleanup used by the chat backend.

use crate::domain::model::{QueryRequest, QueryResponse};
use crate::utils::error::{Result, ServerError};
use crate::utils::validation::validate_url;
use regex::Regex;
use reqwest::Client;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const EMPTY_MESSAGE_REPLY: &str = "Please enter a valid message.";
pub const EMPTY_REPLY_FALLBACK: &str = "I'm not sure how to respond.";
pub const UNAVAILABLE_REPLY: &str = "Sorry, the AI service is currently unavailable.";

const ASSISTANT_MARKER: &str = "Assistant:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptMode {
    #[default]
    Chat,
    Movies,
    Plain,
}

impl FromStr for PromptMode {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "movies" => Ok(Self::Movies),
            "plain" => Ok(Self::Plain),
            other => Err(ServerError::InvalidConfigValueError {
                field: "mode".to_string(),
                value: other.to_string(),
                reason: "Expected one of: chat, movies, plain".to_string(),
            }),
        }
    }
}

pub fn build_prompt(message: &str, mode: PromptMode) -> String {
    match mode {
        PromptMode::Chat => format!(
            "You are MovieBot.\n\
             Respond naturally in ONE short sentence.\n\
             Do NOT mention movies unless asked.\n\
             \n\
             User: {}\n\
             Assistant:",
            message
        ),
        PromptMode::Movies => format!(
            "You are MovieBot.\n\
             User wants movie recommendations.\n\
             Write ONE friendly sentence.\n\
             Do NOT list movies.\n\
             \n\
             User: {}\n\
             Assistant:",
            message
        ),
        PromptMode::Plain => format!("User: {}\nAssistant:", message),
    }
}

fn newline_runs() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n+").expect("static regex"))
}

/// 回覆包含整段 prompt，只保留最後一個 "Assistant:" 之後的內容
pub fn clean_reply(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(idx) = text.rfind(ASSISTANT_MARKER) {
        text = text[idx + ASSISTANT_MARKER.len()..].trim();
    }

    let text = newline_runs().replace_all(text, " ");
    let text = text.trim();
    if text.is_empty() {
        EMPTY_REPLY_FALLBACK.to_string()
    } else {
        text.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    client: Client,
    endpoint: String,
}

impl LlmClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        validate_url("base_url", base_url)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/query", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn query(&self, prompt: &str) -> Result<QueryResponse> {
        tracing::debug!("Sending prompt to {}", self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&QueryRequest {
                prompt: prompt.to_string(),
            })
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<QueryResponse>().await?)
    }

    /// 失敗時不回傳錯誤，改回固定的提示訊息
    pub async fn ask(&self, message: &str, mode: PromptMode) -> String {
        if message.trim().is_empty() {
            return EMPTY_MESSAGE_REPLY.to_string();
        }

        let prompt = build_prompt(message, mode);
        match self.query(&prompt).await {
            Ok(response) => clean_reply(&response.text),
            Err(e) => {
                tracing::warn!("⚠️ LLM error: {}", e);
                UNAVAILABLE_REPLY.to_string()
            }
        }
    }
}
