//! In-memory history store with whole-store durable save/restore
//!
//! Every conversation id maps to exactly one [`ConversationLog`], created
//! empty on first access. The map lock is only held for the duration of a
//! single read or append; callers that need a read-modify-write across an
//! `.await` serialize per conversation themselves.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, PoisonError, RwLock};

use crate::domain::entities::{ConversationId, ConversationLog, Message, MessageRole};
use crate::repository::history_file::{self, Snapshot};
use crate::repository::PersistenceError;

#[derive(Debug, Default)]
pub struct HistoryStore {
    logs: RwLock<BTreeMap<ConversationId, ConversationLog>>,
    /// Serializes writers of the durable file
    writer: Mutex<()>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            logs: RwLock::new(snapshot),
            writer: Mutex::new(()),
        }
    }

    /// Snapshot of the conversation's log, creating an empty one on first use
    pub fn get_or_create(&self, conversation_id: ConversationId) -> ConversationLog {
        if let Some(log) = self.read_logs().get(&conversation_id) {
            return log.clone();
        }
        self.write_logs()
            .entry(conversation_id)
            .or_default()
            .clone()
    }

    /// Append one message to the end of the conversation's log
    pub fn append(&self, conversation_id: ConversationId, role: MessageRole, content: &str) {
        self.write_logs()
            .entry(conversation_id)
            .or_default()
            .push(Message::new(role, content));
    }

    /// The final `min(n, len)` messages of the conversation, in order
    pub fn last_n(&self, conversation_id: ConversationId, n: usize) -> Vec<Message> {
        self.read_logs()
            .get(&conversation_id)
            .map(|log| log.last_n(n).to_vec())
            .unwrap_or_default()
    }

    pub fn message_count(&self, conversation_id: ConversationId) -> usize {
        self.read_logs()
            .get(&conversation_id)
            .map_or(0, ConversationLog::len)
    }

    pub fn conversation_ids(&self) -> Vec<ConversationId> {
        self.read_logs().keys().copied().collect()
    }

    /// Number of conversations
    pub fn len(&self) -> usize {
        self.read_logs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_logs().is_empty()
    }

    /// Copy of the whole mapping
    pub fn snapshot(&self) -> Snapshot {
        self.read_logs().clone()
    }

    /// Write the whole store to `path`, replacing the file atomically
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        history_file::write_atomic(path, &snapshot)?;

        tracing::debug!(
            path = %path.display(),
            conversations = snapshot.len(),
            "Chat histories saved"
        );
        Ok(())
    }

    /// Load the store from `path`, surfacing any failure
    pub fn try_load(path: &Path) -> Result<Self, PersistenceError> {
        history_file::read(path).map(Self::from_snapshot)
    }

    /// Load the store from `path`; a missing or unreadable file yields an empty store
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(store) => {
                tracing::info!(
                    path = %path.display(),
                    conversations = store.len(),
                    "Chat histories loaded"
                );
                store
            }
            Err(e) if e.is_not_found() => {
                tracing::info!(path = %path.display(), "No history file yet, starting empty");
                Self::new()
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Error reading chat histories file, starting empty"
                );
                Self::new()
            }
        }
    }

    fn read_logs(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, BTreeMap<ConversationId, ConversationLog>> {
        self.logs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_logs(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, BTreeMap<ConversationId, ConversationLog>> {
        self.logs.write().unwrap_or_else(PoisonError::into_inner)
    }
}
