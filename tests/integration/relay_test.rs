//! Full relay: Telegram Bot API and Ollama both served by wiremock

mod common;

use std::time::Duration;

use common::{chat_body, pairs};
use lovelace_common::Config;
use lovelace_conversations::HistoryStore;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const TOKEN: &str = "123456:TEST";

struct Servers {
    telegram: MockServer,
    ollama: MockServer,
}

impl Servers {
    async fn start() -> Self {
        Self {
            telegram: MockServer::start().await,
            ollama: MockServer::start().await,
        }
    }

    fn config(&self, history_file: &std::path::Path) -> Config {
        let telegram_url = self.telegram.uri();
        let ollama_url = self.ollama.uri();
        let history_file = history_file.display().to_string();

        Config::from_lookup(|key| match key {
            "TELEGRAM_BOT_TOKEN" => Some(TOKEN.to_string()),
            "TELEGRAM_API_URL" => Some(telegram_url.clone()),
            "TELEGRAM_POLL_TIMEOUT_SECS" => Some("1".to_string()),
            "OLLAMA_URL" => Some(ollama_url.clone()),
            "OLLAMA_MODEL" => Some(common::MODEL.to_string()),
            "HISTORY_FILE" => Some(history_file.clone()),
            _ => None,
        })
        .expect("valid test configuration")
    }

    async fn telegram_requests(&self, method_name: &str) -> Vec<Request> {
        let suffix = format!("/{}", method_name);
        self.telegram
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path().ends_with(&suffix))
            .collect()
    }
}

fn bot_path(method_name: &str) -> String {
    format!("/bot{}/{}", TOKEN, method_name)
}

fn empty_updates() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(json!({ "ok": true, "result": [] }))
        .set_delay(Duration::from_millis(50))
}

#[tokio::test]
async fn test_relay_answers_telegram_message_and_saves_history() {
    let servers = Servers::start().await;
    let dir = tempfile::tempdir().unwrap();
    let history_file = dir.path().join("chat_histories.json");

    Mock::given(method("GET"))
        .and(path(bot_path("getUpdates")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": [
                {
                    "update_id": 10,
                    "message": {
                        "message_id": 1,
                        "chat": { "id": 111, "type": "private" },
                        "from": { "id": 7, "is_bot": false, "first_name": "Ada" },
                        "text": "hello"
                    }
                },
                {
                    "update_id": 11,
                    "message": {
                        "message_id": 2,
                        "chat": { "id": 222, "type": "private" },
                        "from": { "id": 8, "is_bot": false, "first_name": "Charles" },
                        "sticker": { "file_id": "abc" }
                    }
                }
            ]
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&servers.telegram)
        .await;
    Mock::given(method("GET"))
        .and(path(bot_path("getUpdates")))
        .respond_with(empty_updates())
        .mount(&servers.telegram)
        .await;
    Mock::given(method("POST"))
        .and(path(bot_path("sendMessage")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": true, "result": { "message_id": 3 } })),
        )
        .mount(&servers.telegram)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_body("<think>a greeting</think>Hello Ada")),
        )
        .mount(&servers.ollama)
        .await;

    let relay = lovelace_app::create_relay(&servers.config(&history_file)).unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn(relay.run(async {
        let _ = stopped.await;
    }));

    tokio::time::timeout(Duration::from_secs(5), async {
        while servers.telegram_requests("sendMessage").await.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("reply was not sent in time");

    // Give a stray second delivery a chance to show up before shutting down.
    tokio::time::sleep(Duration::from_millis(100)).await;
    stop.send(()).unwrap();
    running.await.unwrap().unwrap();

    let sends = servers.telegram_requests("sendMessage").await;
    assert_eq!(sends.len(), 1);
    let body: Value = sends[0].body_json().unwrap();
    assert_eq!(
        body,
        json!({
            "chat_id": 111,
            "text": "<tg-spoiler><b>Thinking Process:</b>\na greeting</tg-spoiler>\nHello Ada",
            "parse_mode": "HTML"
        })
    );

    let polls = servers.telegram_requests("getUpdates").await;
    assert!(polls.len() >= 2);
    assert!(polls[1]
        .url
        .query_pairs()
        .any(|(key, value)| key == "offset" && value == "12"));

    let saved = HistoryStore::try_load(&history_file).unwrap();
    assert_eq!(saved.conversation_ids(), vec![111]);
    assert_eq!(
        pairs(&saved, 111),
        vec![
            ("user".to_string(), "hello".to_string()),
            (
                "assistant".to_string(),
                "<think>a greeting</think>Hello Ada".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn test_relay_shuts_down_promptly_while_backing_off() {
    let servers = Servers::start().await;
    let dir = tempfile::tempdir().unwrap();
    let history_file = dir.path().join("chat_histories.json");

    Mock::given(method("GET"))
        .and(path(bot_path("getUpdates")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "ok": false,
            "error_code": 401,
            "description": "Unauthorized"
        })))
        .mount(&servers.telegram)
        .await;

    let relay = lovelace_app::create_relay(&servers.config(&history_file)).unwrap();
    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let running = tokio::spawn(relay.run(async {
        let _ = stopped.await;
    }));

    tokio::time::sleep(Duration::from_millis(200)).await;
    stop.send(()).unwrap();

    tokio::time::timeout(Duration::from_secs(2), running)
        .await
        .expect("relay did not stop during backoff")
        .unwrap()
        .unwrap();

    assert_eq!(servers.telegram_requests("getUpdates").await.len(), 1);
    assert!(HistoryStore::try_load(&history_file).unwrap().is_empty());
}
