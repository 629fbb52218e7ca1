//! Telegram Bot API Client Implementation
//!
//! Long-polls `{api_url}/bot{token}/getUpdates` and delivers replies through
//! `sendMessage` with HTML parse mode.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{ChatTransport, InboundUpdate, TransportConfig, TransportError, UpdateBatch};

/// Extra time the HTTP client waits beyond the long-poll timeout
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Envelope shared by every Bot API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    chat: Chat,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    first_name: String,
}

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

/// Real Telegram Bot API client
pub struct TelegramClient {
    http: Client,
    bot_url: String,
    poll_timeout: Duration,
}

impl TelegramClient {
    /// Create a new Telegram client from configuration
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(config.poll_timeout + POLL_GRACE)
            .build()
            .map_err(|e| {
                TransportError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            bot_url: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
            poll_timeout: config.poll_timeout,
        })
    }

    async fn read_envelope<T>(response: reqwest::Response) -> Result<Option<T>, TransportError>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Request(format!("Failed to read response body: {}", e)))?;

        let envelope: ApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
            TransportError::Api(format!(
                "Unparseable response (status {}): {}: {}",
                status, e, body
            ))
        })?;

        if !envelope.ok {
            return Err(TransportError::Api(format!(
                "status {}: {}",
                status,
                envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string())
            )));
        }

        Ok(envelope.result)
    }
}

fn into_batch(updates: Vec<Update>) -> UpdateBatch {
    let next_offset = updates.iter().map(|u| u.update_id + 1).max();

    let updates = updates
        .into_iter()
        .filter_map(|update| {
            let message = update.message?;
            Some(InboundUpdate {
                update_id: update.update_id,
                conversation_id: message.chat.id,
                sender_name: message
                    .from
                    .map(|user| user.first_name)
                    .unwrap_or_default(),
                text: message.text,
            })
        })
        .collect();

    UpdateBatch {
        next_offset,
        updates,
    }
}

#[async_trait::async_trait]
impl ChatTransport for TelegramClient {
    async fn poll_updates(&self, offset: Option<i64>) -> Result<UpdateBatch, TransportError> {
        let mut query = vec![
            ("timeout", self.poll_timeout.as_secs().to_string()),
            ("allowed_updates", r#"["message"]"#.to_string()),
        ];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .http
            .get(format!("{}/getUpdates", self.bot_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.without_url().to_string()))?;

        let updates: Vec<Update> = Self::read_envelope(response).await?.unwrap_or_default();
        let batch = into_batch(updates);

        if !batch.updates.is_empty() {
            tracing::debug!(count = batch.updates.len(), "Received Telegram updates");
        }
        Ok(batch)
    }

    async fn send_text(&self, conversation_id: i64, text: &str) -> Result<(), TransportError> {
        let response = self
            .http
            .post(format!("{}/sendMessage", self.bot_url))
            .json(&SendMessageBody {
                chat_id: conversation_id,
                text,
                parse_mode: "HTML",
            })
            .send()
            .await
            .map_err(|e| TransportError::Request(e.without_url().to_string()))?;

        Self::read_envelope::<serde_json::Value>(response).await?;

        tracing::debug!(chat_id = conversation_id, "Telegram message delivered");
        Ok(())
    }
}
