//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables once at startup.
//! A `.env` file in the working directory is honoured when present.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "llama3";
const DEFAULT_HISTORY_FILE: &str = "chat_histories.json";

#[derive(Clone)]
pub struct Config {
    /// Telegram bot credential
    pub bot_token: String,
    pub telegram_api_url: String,
    pub poll_timeout_secs: u64,
    /// Chat transport provider (telegram, mock)
    pub transport_provider: String,

    /// LLM provider (ollama, mock)
    pub llm_provider: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub ollama_timeout_secs: Option<u64>,

    /// Conversation behaviour
    pub system_prompt: String,
    pub max_history_messages: usize,
    pub num_ctx: u32,
    pub temperature: f64,

    /// Durable history store
    pub history_file: PathBuf,

    /// Runtime configuration
    pub rust_log: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"[REDACTED]")
            .field("telegram_api_url", &self.telegram_api_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .field("transport_provider", &self.transport_provider)
            .field("llm_provider", &self.llm_provider)
            .field("ollama_url", &self.ollama_url)
            .field("ollama_model", &self.ollama_model)
            .field("ollama_timeout_secs", &self.ollama_timeout_secs)
            .field("system_prompt", &self.system_prompt)
            .field("max_history_messages", &self.max_history_messages)
            .field("num_ctx", &self.num_ctx)
            .field("temperature", &self.temperature)
            .field("history_file", &self.history_file)
            .field("rust_log", &self.rust_log)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded environment from .env file");
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let transport_provider =
            lookup("TRANSPORT_PROVIDER").unwrap_or_else(|| "telegram".to_string());

        // The mock transport never talks to Telegram, so it runs without a token.
        let bot_token = match lookup("TELEGRAM_BOT_TOKEN") {
            Some(token) if !token.trim().is_empty() => token,
            _ if transport_provider == "mock" => String::new(),
            _ => {
                return Err(Error::Configuration(
                    "TELEGRAM_BOT_TOKEN is required".to_string(),
                ))
            }
        };

        let config = Self {
            bot_token,
            telegram_api_url: lookup("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string()),
            poll_timeout_secs: parse_or(&lookup, "TELEGRAM_POLL_TIMEOUT_SECS", 30)?,
            transport_provider,

            llm_provider: lookup("LLM_PROVIDER").unwrap_or_else(|| "ollama".to_string()),
            ollama_url: lookup("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            ollama_model: lookup("OLLAMA_MODEL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            ollama_timeout_secs: parse_optional(&lookup, "OLLAMA_TIMEOUT_SECS")?,

            system_prompt: lookup("SYSTEM_PROMPT").unwrap_or_default(),
            max_history_messages: parse_or(&lookup, "MAX_HISTORY_MESSAGES", 20)?,
            num_ctx: parse_or(&lookup, "NUM_CTX", 4096)?,
            temperature: parse_or(&lookup, "TEMPERATURE", 0.7)?,

            history_file: lookup("HISTORY_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_FILE)),

            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "lovelace=info".to_string()),
        };

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    Ok(parse_optional(lookup, key)?.unwrap_or(default))
}

fn parse_optional<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            Error::Configuration(format!("{} has an invalid value: {:?}", key, raw))
        }),
    }
}
