//! Ollama Chat API Implementation
//!
//! Calls the Ollama chat endpoint (`{base_url}/api/chat`) with streaming
//! disabled, using the reqwest HTTP client.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::{CompletionRequest, CompletionResponse, LlmConfig, LlmError, LlmMessage, LlmService};

/// Ollama `/api/chat` request body
#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<LlmMessage>,
    options: ChatOptions,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
    num_ctx: u32,
}

impl<'a> ChatRequest<'a> {
    pub(crate) fn from_completion(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.options.model,
            messages: request.wire_messages(),
            options: ChatOptions {
                temperature: request.options.temperature,
                num_ctx: request.options.num_ctx,
            },
            stream: false,
        }
    }
}

/// Ollama `/api/chat` response body; unknown fields are ignored
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Ollama LLM service implementation
pub struct OllamaService {
    client: Client,
    chat_url: String,
}

impl OllamaService {
    /// Create a new Ollama service
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            chat_url: format!("{}/api/chat", config.base_url.trim_end_matches('/')),
        })
    }
}

fn parse_chat_body(body: &str, requested_model: &str) -> Result<CompletionResponse, LlmError> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        LlmError::InvalidResponse(format!("Failed to parse response: {}. Body: {}", e, body))
    })?;

    let content = parsed
        .message
        .and_then(|message| message.content)
        .ok_or_else(|| {
            LlmError::InvalidResponse(format!("message content is null. Body: {}", body))
        })?;

    Ok(CompletionResponse {
        content,
        model: parsed.model.unwrap_or_else(|| requested_model.to_string()),
    })
}

#[async_trait::async_trait]
impl LlmService for OllamaService {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = ChatRequest::from_completion(&request);

        tracing::debug!(
            url = %self.chat_url,
            model = %request.options.model,
            messages = body.messages.len(),
            payload = %serde_json::to_string(&body).unwrap_or_default(),
            "Sending Ollama chat request"
        );

        let response = self
            .client
            .post(&self.chat_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Request(format!("Failed to read response body: {}", e)))?;

        tracing::debug!(status = status.as_u16(), body = %text, "Received Ollama chat response");

        if status != StatusCode::OK {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_chat_body(&text, &request.options.model)
    }

    fn provider(&self) -> &str {
        "ollama"
    }
}
