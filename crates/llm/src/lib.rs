//! Lovelace LLM Service
//!
//! Provides chat completion against a local inference server with support for:
//! - Ollama `/api/chat` integration for production
//! - Programmable mock service for testing and development

pub mod mock;
pub mod ollama;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM configuration error: {0}")]
    Configuration(String),

    /// The endpoint could not be reached or the connection failed mid-request
    #[error("LLM request error: {0}")]
    Request(String),

    /// The endpoint answered with a non-success HTTP status
    #[error("LLM endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The endpoint answered 200 but the body lacks the expected fields
    #[error("Invalid response from LLM: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// True for failures where the endpoint answered but broke the response contract
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, LlmError::InvalidResponse(_))
    }
}

/// Chat role as understood by the LLM endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    System,
    User,
    Assistant,
}

/// A single message sent to the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    pub fn new(role: LlmRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Per-request generation settings
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    /// Target model name
    pub model: String,
    /// Context window size in tokens (`num_ctx`)
    pub num_ctx: u32,
    pub temperature: f64,
}

/// Completion request handed to an [`LlmService`]
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Prepended as a `system` message when present and non-empty
    pub system_prompt: Option<String>,
    pub messages: Vec<LlmMessage>,
    pub options: GenerationOptions,
}

impl CompletionRequest {
    /// The full message list in the order the endpoint receives it
    pub fn wire_messages(&self) -> Vec<LlmMessage> {
        let system = self
            .system_prompt
            .as_deref()
            .filter(|prompt| !prompt.is_empty())
            .map(|prompt| LlmMessage::new(LlmRole::System, prompt));

        system
            .into_iter()
            .chain(self.messages.iter().cloned())
            .collect()
    }
}

/// Completion returned by an [`LlmService`]
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Raw assistant text, unformatted
    pub content: String,
    pub model: String,
}

/// LLM service configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// LLM provider (ollama, mock)
    pub provider: String,
    /// Base URL of the inference server
    pub base_url: String,
    /// Optional timeout for a whole chat request
    pub timeout: Option<Duration>,
}

/// LLM service trait for different implementations
#[async_trait::async_trait]
pub trait LlmService: Send + Sync {
    /// Run a single non-streaming chat completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Short provider name used in logs
    fn provider(&self) -> &str;
}

/// Factory for creating LlmService implementations
pub struct LlmServiceFactory;

impl LlmServiceFactory {
    /// Create an LlmService based on configuration
    pub fn create(config: LlmConfig) -> Result<Box<dyn LlmService>, LlmError> {
        match config.provider.as_str() {
            "ollama" => {
                tracing::info!(base_url = %config.base_url, "Creating Ollama LLM service");
                Ok(Box::new(ollama::OllamaService::new(config)?))
            }
            "mock" => {
                tracing::info!("Creating mock LLM service");
                Ok(Box::new(mock::MockLlmService::new()))
            }
            provider => Err(LlmError::Configuration(format!(
                "Unknown LLM provider: {}. Supported providers: ollama, mock",
                provider
            ))),
        }
    }
}
