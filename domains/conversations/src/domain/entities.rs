//! Domain entities for the Conversations domain
//!
//! A conversation is an append-only log of role-tagged messages keyed by the
//! chat platform's conversation identifier.

use lovelace_llm::{LlmMessage, LlmRole};
use serde::{Deserialize, Serialize};

/// Stable integer key identifying one chat thread (the Telegram chat id)
pub type ConversationId = i64;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Message entity; immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn to_llm_message(&self) -> LlmMessage {
        let role = match self.role {
            MessageRole::System => LlmRole::System,
            MessageRole::User => LlmRole::User,
            MessageRole::Assistant => LlmRole::Assistant,
        };
        LlmMessage::new(role, self.content.clone())
    }
}

/// Ordered message log of one conversation
///
/// Messages are only ever appended; the log serializes as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog {
    messages: Vec<Message>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The final `min(n, len)` messages in original order
    pub fn last_n(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }
}
