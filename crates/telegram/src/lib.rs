//! Lovelace Chat Transport
//!
//! Receives inbound chat messages and delivers formatted replies with support for:
//! - Telegram Bot API long polling (`getUpdates`) and `sendMessage`
//! - Mock transport for testing and development

pub mod client;
pub mod mock;

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport configuration error: {0}")]
    Configuration(String),

    #[error("Transport request error: {0}")]
    Request(String),

    #[error("Telegram API error: {0}")]
    Api(String),
}

/// One inbound update, reduced to what the relay needs
#[derive(Debug, Clone, PartialEq)]
pub struct InboundUpdate {
    pub update_id: i64,
    pub conversation_id: i64,
    pub sender_name: String,
    /// `None` for messages without text (stickers, photos, service messages)
    pub text: Option<String>,
}

/// Result of one poll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateBatch {
    /// Offset to pass to the next poll; acknowledges everything in this batch
    pub next_offset: Option<i64>,
    pub updates: Vec<InboundUpdate>,
}

/// Transport configuration
#[derive(Clone)]
pub struct TransportConfig {
    /// Transport provider (telegram, mock)
    pub provider: String,
    /// Bot API base URL
    pub api_url: String,
    pub bot_token: String,
    /// Long-poll timeout passed to `getUpdates`
    pub poll_timeout: Duration,
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("bot_token", &"[REDACTED]")
            .field("poll_timeout", &self.poll_timeout)
            .finish()
    }
}

/// Chat transport trait for different implementations
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Wait for the next batch of updates after `offset`
    async fn poll_updates(&self, offset: Option<i64>) -> Result<UpdateBatch, TransportError>;

    /// Deliver one pre-formatted reply to a conversation
    async fn send_text(&self, conversation_id: i64, text: &str) -> Result<(), TransportError>;
}

/// Factory for creating ChatTransport implementations
pub struct TransportFactory;

impl TransportFactory {
    /// Create a ChatTransport based on configuration
    pub fn create(config: TransportConfig) -> Result<Box<dyn ChatTransport>, TransportError> {
        match config.provider.as_str() {
            "telegram" => {
                tracing::info!(api_url = %config.api_url, "Creating Telegram transport");
                if config.bot_token.is_empty() {
                    return Err(TransportError::Configuration(
                        "TELEGRAM_BOT_TOKEN is required for Telegram transport".to_string(),
                    ));
                }
                Ok(Box::new(client::TelegramClient::new(config)?))
            }
            "mock" => {
                tracing::info!("Creating mock transport");
                Ok(Box::new(mock::MockTransport::new()))
            }
            provider => Err(TransportError::Configuration(format!(
                "Unknown transport provider: {}. Supported providers: telegram, mock",
                provider
            ))),
        }
    }
}
