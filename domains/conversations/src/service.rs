//! Conversation turn orchestration
//!
//! One turn: record the user message, persist, ask the LLM with a bounded
//! context, record the raw reply, persist again, and format the reply for
//! delivery. Turns for the same conversation are serialized; turns for
//! different conversations run independently.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use lovelace_llm::{CompletionRequest, GenerationOptions, LlmService};

use crate::domain::entities::{ConversationId, MessageRole};
use crate::domain::formatter::format_reply;
use crate::domain::history::HistoryStore;
use crate::repository::PersistenceError;

/// Shown to the user whenever the LLM call fails
pub const FAILURE_MESSAGE: &str = "Sorry, I had a problem getting a response from the AI model.";

/// Settings read once at startup
#[derive(Debug, Clone)]
pub struct ConversationSettings {
    /// Sent as a leading system message when non-empty; never stored
    pub system_prompt: String,
    pub max_history_messages: usize,
    pub generation: GenerationOptions,
    pub history_file: PathBuf,
}

/// Result of one turn; both variants carry the text to deliver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Answered(String),
    Failed(String),
}

impl TurnOutcome {
    pub fn text(&self) -> &str {
        match self {
            TurnOutcome::Answered(text) | TurnOutcome::Failed(text) => text,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, TurnOutcome::Answered(_))
    }
}

pub struct ConversationService {
    store: Arc<HistoryStore>,
    llm: Arc<dyn LlmService>,
    settings: ConversationSettings,
    turn_locks: Mutex<HashMap<ConversationId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConversationService {
    pub fn new(
        store: Arc<HistoryStore>,
        llm: Arc<dyn LlmService>,
        settings: ConversationSettings,
    ) -> Self {
        Self {
            store,
            llm,
            settings,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    /// Handle one inbound chat message; messages without text are ignored
    pub async fn handle_message(
        &self,
        conversation_id: ConversationId,
        sender_name: &str,
        text: Option<&str>,
    ) -> Option<TurnOutcome> {
        let Some(text) = text else {
            tracing::debug!(chat_id = conversation_id, "Ignoring message without text");
            return None;
        };

        tracing::info!(
            chat_id = conversation_id,
            "{} ({}) wrote: {}",
            sender_name,
            conversation_id,
            text
        );
        Some(self.handle_inbound(conversation_id, text).await)
    }

    /// Run one full turn for `conversation_id`
    pub async fn handle_inbound(&self, conversation_id: ConversationId, text: &str) -> TurnOutcome {
        let turn_lock = self.turn_lock(conversation_id);
        let outcome = {
            let _turn = turn_lock.lock().await;
            self.run_turn(conversation_id, text).await
        };
        self.release_turn_lock(conversation_id, turn_lock);
        outcome
    }

    async fn run_turn(&self, conversation_id: ConversationId, text: &str) -> TurnOutcome {
        self.store.append(conversation_id, MessageRole::User, text);
        self.persist_best_effort().await;

        let context = self
            .store
            .last_n(conversation_id, self.settings.max_history_messages);

        let request = CompletionRequest {
            system_prompt: Some(self.settings.system_prompt.clone())
                .filter(|prompt| !prompt.is_empty()),
            messages: context.iter().map(|m| m.to_llm_message()).collect(),
            options: self.settings.generation.clone(),
        };

        let response = match self.llm.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    chat_id = conversation_id,
                    provider = self.llm.provider(),
                    contract_violation = e.is_contract_violation(),
                    error = %e,
                    "Error calling LLM"
                );
                return TurnOutcome::Failed(FAILURE_MESSAGE.to_string());
            }
        };

        self.store
            .append(conversation_id, MessageRole::Assistant, &response.content);
        self.persist_best_effort().await;

        TurnOutcome::Answered(format_reply(&response.content))
    }

    /// Write the whole store to the history file
    pub async fn persist(&self) -> Result<(), PersistenceError> {
        let store = Arc::clone(&self.store);
        let path = self.settings.history_file.clone();

        tokio::task::spawn_blocking(move || store.save(&path))
            .await
            .map_err(|e| PersistenceError::Background(e.to_string()))?
    }

    async fn persist_best_effort(&self) {
        if let Err(e) = self.persist().await {
            tracing::error!(
                path = %self.settings.history_file.display(),
                error = %e,
                "Unable to save chat histories"
            );
        }
    }

    fn turn_lock(&self, conversation_id: ConversationId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .turn_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(conversation_id).or_default())
    }

    /// Drop the conversation's lock entry once no other turn holds or awaits it
    fn release_turn_lock(
        &self,
        conversation_id: ConversationId,
        turn_lock: Arc<tokio::sync::Mutex<()>>,
    ) {
        let mut locks = self
            .turn_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Clones are only handed out under this map lock, so the count is stable here.
        if Arc::strong_count(&turn_lock) == 2 {
            locks.remove(&conversation_id);
        }
    }

    #[cfg(test)]
    fn tracked_turn_locks(&self) -> usize {
        self.turn_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
