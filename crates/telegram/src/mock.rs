//! Mock Transport Implementation
//!
//! Serves queued updates and records delivered messages for test assertions.
//! Thread-safe via `Arc<Mutex<>>`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{ChatTransport, InboundUpdate, TransportError, UpdateBatch};

/// How long an idle poll waits before returning an empty batch
const IDLE_POLL: Duration = Duration::from_millis(10);

/// A delivered message recorded by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub conversation_id: i64,
    pub text: String,
}

/// Mock transport that replays queued updates and records deliveries
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    pending: Arc<Mutex<VecDeque<InboundUpdate>>>,
    last_update_id: Arc<AtomicI64>,
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail_sends: Arc<Mutex<bool>>,
}

impl MockTransport {
    /// Create a new mock transport with no pending updates
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an inbound text message; update ids are assigned sequentially
    pub fn push_text(&self, conversation_id: i64, sender_name: &str, text: &str) {
        self.push(conversation_id, sender_name, Some(text.to_string()));
    }

    /// Queue an inbound message without text
    pub fn push_non_text(&self, conversation_id: i64, sender_name: &str) {
        self.push(conversation_id, sender_name, None);
    }

    fn push(&self, conversation_id: i64, sender_name: &str, text: Option<String>) {
        let update_id = self.last_update_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.push_back(InboundUpdate {
            update_id,
            conversation_id,
            sender_name: sender_name.to_string(),
            text,
        });
    }

    /// Make every subsequent `send_text` fail
    pub fn fail_sends(&self, fail: bool) {
        *self.fail_sends.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }

    /// Return all delivered messages
    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait::async_trait]
impl ChatTransport for MockTransport {
    async fn poll_updates(&self, offset: Option<i64>) -> Result<UpdateBatch, TransportError> {
        let drained: Vec<InboundUpdate> = {
            let mut pending = self
                .pending
                .lock()
                .map_err(|e| TransportError::Request(format!("pending lock poisoned: {e}")))?;
            pending.retain(|u| offset.map_or(true, |offset| u.update_id >= offset));
            pending.drain(..).collect()
        };

        if drained.is_empty() {
            tokio::time::sleep(IDLE_POLL).await;
            return Ok(UpdateBatch::default());
        }

        Ok(UpdateBatch {
            next_offset: drained.iter().map(|u| u.update_id + 1).max(),
            updates: drained,
        })
    }

    async fn send_text(&self, conversation_id: i64, text: &str) -> Result<(), TransportError> {
        if *self.fail_sends.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(TransportError::Api("mock delivery failure".to_string()));
        }

        tracing::debug!(chat_id = conversation_id, "Mock transport: recording message");
        self.sent
            .lock()
            .map_err(|e| TransportError::Request(format!("sent lock poisoned: {e}")))?
            .push(SentMessage {
                conversation_id,
                text: text.to_string(),
            });
        Ok(())
    }
}
