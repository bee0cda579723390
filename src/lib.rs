pub mod client;
pub mod config;
pub mod core;
pub mod domain;
pub mod server;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::cli::CliConfig;

pub use crate::client::{LlmClient, PromptMode};
pub use crate::config::{toml_config::TomlConfig, ServerSettings};
pub use crate::core::generation::CandleGenerator;
pub use crate::domain::model::{GenerationParams, QueryRequest, QueryResponse, StatusResponse};
pub use crate::domain::ports::TextGenerator;
pub use crate::server::{create_router, serve, AppState};
pub use crate::utils::error::{Result, ServerError};
