//! End-to-end conversation turns against a mocked Ollama endpoint

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{chat_body, pairs, TestHarness, MODEL};
use lovelace_conversations::{
    ConversationService, ConversationSettings, HistoryStore, TurnOutcome, FAILURE_MESSAGE,
};
use lovelace_llm::ollama::OllamaService;
use lovelace_llm::{GenerationOptions, LlmConfig};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

fn user(content: &str) -> (String, String) {
    ("user".to_string(), content.to_string())
}

fn assistant(content: &str) -> (String, String) {
    ("assistant".to_string(), content.to_string())
}

#[tokio::test]
async fn test_successful_turn_stores_raw_and_returns_formatted() {
    let harness = TestHarness::new("").await;
    let raw = "<think>\nThe user says hi.\n</think>\n\nHello! How can I help?";
    harness.reply_with(raw).await;

    let outcome = harness.service.handle_inbound(111, "hi").await;

    assert_eq!(
        outcome,
        TurnOutcome::Answered(
            "<tg-spoiler><b>Thinking Process:</b>\nThe user says hi.</tg-spoiler>\nHello! How can I help?"
                .to_string()
        )
    );
    assert_eq!(
        pairs(&harness.saved(), 111),
        vec![user("hi"), assistant(raw)]
    );
}

#[tokio::test]
async fn test_request_carries_model_options_and_context() {
    let harness = TestHarness::new("You are a helpful assistant.").await;
    harness.reply_with("ok").await;

    harness.service.handle_inbound(111, "hi").await;

    let requests = harness.chat_requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0],
        json!({
            "model": MODEL,
            "messages": [
                { "role": "system", "content": "You are a helpful assistant." },
                { "role": "user", "content": "hi" }
            ],
            "options": { "temperature": 0.6, "num_ctx": 8192 },
            "stream": false
        })
    );
}

#[tokio::test]
async fn test_empty_system_prompt_sends_no_system_entry() {
    let harness = TestHarness::new("").await;
    harness.reply_with("ok").await;

    harness.service.handle_inbound(111, "hi").await;

    let requests = harness.chat_requests().await;
    let messages = requests[0]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["role"], "user");
}

#[tokio::test]
async fn test_server_error_returns_apology_and_keeps_user_message() {
    let harness = TestHarness::new("").await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&harness.ollama)
        .await;

    let outcome = harness.service.handle_inbound(111, "hi").await;

    assert_eq!(outcome, TurnOutcome::Failed(FAILURE_MESSAGE.to_string()));
    assert_eq!(pairs(&harness.saved(), 111), vec![user("hi")]);
}

#[tokio::test]
async fn test_null_content_returns_apology_and_keeps_user_message() {
    let harness = TestHarness::new("").await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": MODEL,
            "message": { "role": "assistant", "content": null },
            "done": true
        })))
        .mount(&harness.ollama)
        .await;

    let outcome = harness.service.handle_inbound(111, "hi").await;

    assert_eq!(outcome, TurnOutcome::Failed(FAILURE_MESSAGE.to_string()));
    assert_eq!(pairs(&harness.saved(), 111), vec![user("hi")]);
}

#[tokio::test]
async fn test_interleaved_conversations_persist_independently() {
    let harness = TestHarness::new("").await;
    for (text, reply) in [("a1", "ra1"), ("b1", "rb1"), ("a2", "ra2"), ("b2", "rb2")] {
        harness.ollama.reset().await;
        harness.reply_with(reply).await;
        let conversation_id = if text.starts_with('a') { 111 } else { 222 };
        harness.service.handle_inbound(conversation_id, text).await;
    }

    let saved = harness.saved();
    assert_eq!(
        pairs(&saved, 111),
        vec![user("a1"), assistant("ra1"), user("a2"), assistant("ra2")]
    );
    assert_eq!(
        pairs(&saved, 222),
        vec![user("b1"), assistant("rb1"), user("b2"), assistant("rb2")]
    );
}

#[tokio::test]
async fn test_restart_restores_context_from_disk() {
    let harness = TestHarness::new("").await;
    harness.reply_with("Nice to meet you, Ada.").await;
    harness
        .service
        .handle_inbound(111, "My name is Ada.")
        .await;

    let restarted = harness.restart("");
    harness.ollama.reset().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_body("Your name is Ada.")))
        .mount(&harness.ollama)
        .await;

    let outcome = restarted.handle_inbound(111, "What is my name?").await;

    assert_eq!(outcome.text(), "Your name is Ada.");
    let requests = harness.chat_requests().await;
    let contents: Vec<&str> = requests[0]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(
        contents,
        vec!["My name is Ada.", "Nice to meet you, Ada.", "What is my name?"]
    );
}

#[tokio::test]
async fn test_unreachable_endpoint_returns_apology() {
    let dir = tempfile::tempdir().unwrap();
    let history_file = dir.path().join("histories.json");

    let llm = OllamaService::new(LlmConfig {
        provider: "ollama".to_string(),
        base_url: "http://127.0.0.1:1".to_string(),
        timeout: Some(Duration::from_secs(2)),
    })
    .unwrap();
    let service = ConversationService::new(
        Arc::new(HistoryStore::new()),
        Arc::new(llm),
        ConversationSettings {
            system_prompt: String::new(),
            max_history_messages: 20,
            generation: GenerationOptions {
                model: MODEL.to_string(),
                num_ctx: 2048,
                temperature: 0.7,
            },
            history_file: history_file.clone(),
        },
    );

    let outcome = service.handle_inbound(111, "hello?").await;

    assert_eq!(outcome, TurnOutcome::Failed(FAILURE_MESSAGE.to_string()));
    let saved = HistoryStore::try_load(&history_file).unwrap();
    assert_eq!(pairs(&saved, 111), vec![user("hello?")]);
}
