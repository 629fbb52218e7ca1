//! Conversations domain: chat histories, reply formatting, turn orchestration

pub mod domain;
pub mod repository;
pub mod service;

// Re-export domain types at the crate root for convenience
pub use domain::entities::{ConversationId, ConversationLog, Message, MessageRole};
pub use domain::formatter::{format_reply, split_reasoning, ReplyParts, MESSAGE_LIMIT};
pub use domain::history::HistoryStore;

// Re-export repository types
pub use repository::PersistenceError;

// Re-export service types
pub use service::{ConversationService, ConversationSettings, TurnOutcome, FAILURE_MESSAGE};
