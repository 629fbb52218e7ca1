//! Common test utilities and fixtures for integration tests
//!
//! Provides a conversation service wired to a real `OllamaService` talking to
//! a wiremock endpoint, backed by a history file in a temporary directory.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use lovelace_conversations::{ConversationService, ConversationSettings, HistoryStore};
use lovelace_llm::ollama::OllamaService;
use lovelace_llm::{GenerationOptions, LlmConfig};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const MODEL: &str = "qwen3:8b";

/// Conversation service against a mocked Ollama endpoint
pub struct TestHarness {
    pub ollama: MockServer,
    pub service: Arc<ConversationService>,
    pub history_file: PathBuf,
    dir: TempDir,
}

impl TestHarness {
    pub async fn new(system_prompt: &str) -> Self {
        let ollama = MockServer::start().await;
        let dir = tempfile::tempdir().expect("create temp dir");
        let history_file = dir.path().join("chat_histories.json");
        let service = build_service(&ollama, &history_file, system_prompt, HistoryStore::new());

        Self {
            ollama,
            service,
            history_file,
            dir,
        }
    }

    /// A fresh service over the same endpoint, restored from the history file
    pub fn restart(&self, system_prompt: &str) -> Arc<ConversationService> {
        build_service(
            &self.ollama,
            &self.history_file,
            system_prompt,
            HistoryStore::load(&self.history_file),
        )
    }

    /// Reload the history file from disk
    pub fn saved(&self) -> HistoryStore {
        HistoryStore::try_load(&self.history_file).expect("history file readable")
    }

    /// Answer every chat request with `raw`
    pub async fn reply_with(&self, raw: &str) {
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_body(raw)))
            .mount(&self.ollama)
            .await;
    }

    /// Bodies of every chat request the endpoint received, in order
    pub async fn chat_requests(&self) -> Vec<Value> {
        self.ollama
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| request.body_json().expect("chat request is JSON"))
            .collect()
    }
}

fn build_service(
    ollama: &MockServer,
    history_file: &std::path::Path,
    system_prompt: &str,
    store: HistoryStore,
) -> Arc<ConversationService> {
    let llm = OllamaService::new(LlmConfig {
        provider: "ollama".to_string(),
        base_url: ollama.uri(),
        timeout: Some(std::time::Duration::from_secs(5)),
    })
    .expect("build ollama service");

    let settings = ConversationSettings {
        system_prompt: system_prompt.to_string(),
        max_history_messages: 20,
        generation: GenerationOptions {
            model: MODEL.to_string(),
            num_ctx: 8192,
            temperature: 0.6,
        },
        history_file: history_file.to_path_buf(),
    };

    Arc::new(ConversationService::new(
        Arc::new(store),
        Arc::new(llm),
        settings,
    ))
}

/// A successful non-streaming `/api/chat` body
pub fn chat_body(content: &str) -> Value {
    json!({
        "model": MODEL,
        "created_at": "2024-05-01T12:00:00Z",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}

/// `(role, content)` pairs of a conversation log
pub fn pairs(store: &HistoryStore, conversation_id: i64) -> Vec<(String, String)> {
    store
        .last_n(conversation_id, usize::MAX)
        .into_iter()
        .map(|m| (m.role.to_string(), m.content))
        .collect()
}
