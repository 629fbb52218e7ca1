//! Mock LLM Service Implementation
//!
//! Programmable mock used by `LlmServiceFactory` when provider is `"mock"`
//! and by the conversation tests:
//! - `MockOutcome`: echo, fixed reply, HTTP status failure, or broken contract
//! - Records every request for test assertions
//! - Optional artificial latency to exercise concurrent turns

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::{CompletionRequest, CompletionResponse, LlmError, LlmService};

/// What outcome the mock should produce
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MockOutcome {
    /// Reply with `Mock response to: <last message>`
    #[default]
    Echo,
    /// Reply with the given raw text
    Reply(String),
    /// Fail as if the endpoint returned this HTTP status
    Status(u16),
    /// Fail as if the endpoint answered without message content
    InvalidResponse,
}

/// Mock LLM service with programmable behavior
#[derive(Debug, Clone, Default)]
pub struct MockLlmService {
    outcome: Arc<RwLock<MockOutcome>>,
    delay: Arc<RwLock<Option<Duration>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockLlmService {
    /// Create a new mock LLM service that echoes the last message
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that always produces the given outcome
    pub fn with_outcome(outcome: MockOutcome) -> Self {
        let service = Self::new();
        service.set_outcome(outcome);
        service
    }

    /// Configure the mock outcome
    pub fn set_outcome(&self, outcome: MockOutcome) {
        *self.outcome.write().unwrap_or_else(|e| e.into_inner()) = outcome;
    }

    /// Configure a delay applied before every completion
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.write().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }

    /// Return all recorded requests
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait::async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        tracing::info!("Mock LLM service processing completion request");

        let delay = *self.delay.read().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = self
            .outcome
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let model = if request.options.model.is_empty() {
            "mock-model".to_string()
        } else {
            request.options.model.clone()
        };

        let last_message = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_else(|| "empty".to_string());

        self.requests
            .lock()
            .map_err(|e| LlmError::Request(format!("requests lock poisoned: {e}")))?
            .push(request);

        match outcome {
            MockOutcome::Echo => Ok(CompletionResponse {
                content: format!("Mock response to: {}", last_message),
                model,
            }),
            MockOutcome::Reply(content) => Ok(CompletionResponse { content, model }),
            MockOutcome::Status(status) => Err(LlmError::Status {
                status,
                body: "mock failure".to_string(),
            }),
            MockOutcome::InvalidResponse => Err(LlmError::InvalidResponse(
                "message content is null".to_string(),
            )),
        }
    }

    fn provider(&self) -> &str {
        "mock"
    }
}
