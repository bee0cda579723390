use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::domain::model::ErrorResponse;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Tensor operation failed: {0}")]
    CandleError(#[from] candle_core::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Tokenizer error: {message}")]
    TokenizerError { message: String },

    #[error("Failed to load model from {path}: {message}")]
    ModelLoadError { path: String, message: String },

    #[error("Unsupported model architecture: {model_type}")]
    UnsupportedArchitectureError { model_type: String },

    #[error("Generation failed: {message}")]
    GenerationError { message: String },

    #[error("Invalid prompt: {message}")]
    InvalidPromptError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    ModelLoading,
    Inference,
    Request,
    Network,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ServerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ServerError::ConfigError { .. } | ServerError::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            ServerError::ModelLoadError { .. }
            | ServerError::UnsupportedArchitectureError { .. } => ErrorCategory::ModelLoading,
            ServerError::CandleError(_)
            | ServerError::TokenizerError { .. }
            | ServerError::GenerationError { .. } => ErrorCategory::Inference,
            ServerError::InvalidPromptError { .. } | ServerError::SerializationError(_) => {
                ErrorCategory::Request
            }
            ServerError::HttpError(_) => ErrorCategory::Network,
            ServerError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Request => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Inference | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::ModelLoading | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ServerError::ModelLoadError { .. } => {
                "Check that the model directory contains config.json, tokenizer.json and safetensors weights"
            }
            ServerError::UnsupportedArchitectureError { .. } => {
                "Use a llama, mistral, qwen2 or phi3 checkpoint"
            }
            ServerError::InvalidConfigValueError { .. } => {
                "Fix the value on the command line or in the TOML config file"
            }
            ServerError::ConfigError { .. } => "Check the configuration file syntax",
            ServerError::CandleError(_) => {
                "Try --device cpu, or rebuild with the matching accelerator feature"
            }
            ServerError::HttpError(_) => "Make sure the LLM server is running and reachable",
            ServerError::InvalidPromptError { .. } => "Send a non-empty prompt",
            _ => "Check the logs for details",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("設定錯誤: {}", self),
            ErrorCategory::ModelLoading => format!("模型載入失敗: {}", self),
            ErrorCategory::Inference => format!("推論失敗: {}", self),
            ErrorCategory::Request => format!("請求無效: {}", self),
            ErrorCategory::Network => format!("網路錯誤: {}", self),
            ErrorCategory::System => format!("系統錯誤: {}", self),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::InvalidPromptError { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::SerializationError(_) => StatusCode::BAD_REQUEST,
            ServerError::HttpError(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub(crate) fn tokenizer(err: impl std::fmt::Display) -> Self {
        ServerError::TokenizerError {
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("❌ Request failed: {} (Category: {:?})", self, self.category());
        } else {
            tracing::warn!("⚠️ Request rejected: {}", self);
        }
        let body = ErrorResponse {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_follows_category() {
        let err = ServerError::ModelLoadError {
            path: "./friend".to_string(),
            message: "missing".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::ModelLoading);
        assert_eq!(err.severity(), ErrorSeverity::Critical);

        let err = ServerError::InvalidPromptError {
            message: "empty".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_config_errors_are_high_severity() {
        let errors = [
            ServerError::ConfigError {
                message: "bad toml".to_string(),
            },
            ServerError::InvalidConfigValueError {
                field: "generation.top_p".to_string(),
                value: "1.5".to_string(),
                reason: "out of range".to_string(),
            },
        ];
        for err in errors {
            assert_eq!(err.category(), ErrorCategory::Configuration);
            assert_eq!(err.severity(), ErrorSeverity::High);
            assert!(err.user_friendly_message().starts_with("設定錯誤"));
        }
    }

    #[test]
    fn test_generation_error_maps_to_500() {
        let err = ServerError::GenerationError {
            message: "boom".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.user_friendly_message().contains("boom"));
    }
}
