//! Lovelace application composition root
//!
//! Wires the chat transport, the LLM service and the conversation domain into
//! a polling relay.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use lovelace_common::Config;
use lovelace_conversations::{
    ConversationService, ConversationSettings, HistoryStore, TurnOutcome,
};
use lovelace_llm::{GenerationOptions, LlmConfig, LlmServiceFactory};
use lovelace_telegram::{ChatTransport, InboundUpdate, TransportConfig, TransportFactory};
use tokio::task::JoinSet;

/// Pause after a failed poll before trying again
const POLL_BACKOFF: Duration = Duration::from_secs(5);

/// How long in-flight turns may run after a shutdown request
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Build the relay from configuration, restoring chat histories from disk
pub fn create_relay(config: &Config) -> Result<Relay, anyhow::Error> {
    let llm = LlmServiceFactory::create(LlmConfig {
        provider: config.llm_provider.clone(),
        base_url: config.ollama_url.clone(),
        timeout: config.ollama_timeout_secs.map(Duration::from_secs),
    })?;

    let transport = TransportFactory::create(TransportConfig {
        provider: config.transport_provider.clone(),
        api_url: config.telegram_api_url.clone(),
        bot_token: config.bot_token.clone(),
        poll_timeout: Duration::from_secs(config.poll_timeout_secs),
    })?;

    let store = HistoryStore::load(&config.history_file);

    let settings = ConversationSettings {
        system_prompt: config.system_prompt.clone(),
        max_history_messages: config.max_history_messages,
        generation: GenerationOptions {
            model: config.ollama_model.clone(),
            num_ctx: config.num_ctx,
            temperature: config.temperature,
        },
        history_file: config.history_file.clone(),
    };

    let conversations = ConversationService::new(Arc::new(store), Arc::from(llm), settings);

    Ok(Relay::new(Arc::from(transport), Arc::new(conversations)))
}

/// Long-polling relay between the chat transport and the conversation service
#[derive(Clone)]
pub struct Relay {
    transport: Arc<dyn ChatTransport>,
    conversations: Arc<ConversationService>,
}

impl Relay {
    pub fn new(transport: Arc<dyn ChatTransport>, conversations: Arc<ConversationService>) -> Self {
        Self {
            transport,
            conversations,
        }
    }

    pub fn conversations(&self) -> &Arc<ConversationService> {
        &self.conversations
    }

    /// Run one turn for `update` and deliver the reply
    ///
    /// Delivery failures are logged and swallowed.
    pub async fn handle_update(&self, update: InboundUpdate) -> Option<TurnOutcome> {
        let chat_id = update.conversation_id;
        let outcome = self
            .conversations
            .handle_message(chat_id, &update.sender_name, update.text.as_deref())
            .await?;

        if outcome.text().is_empty() {
            tracing::warn!(chat_id, "Reply is empty after formatting, nothing to send");
            return Some(outcome);
        }

        if let Err(e) = self.transport.send_text(chat_id, outcome.text()).await {
            tracing::error!(chat_id, error = %e, "Failed to deliver reply");
        }

        Some(outcome)
    }

    /// Poll for updates until `shutdown` resolves, then save the histories
    pub async fn run<F>(self, shutdown: F) -> Result<(), anyhow::Error>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut offset = None;
        let mut turns = JoinSet::new();

        tracing::info!("Relay started, waiting for messages");

        // The pending poll survives loop iterations that only reap finished turns.
        let mut poll = self.transport.poll_updates(offset);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                polled = &mut poll => {
                    match polled {
                        Ok(batch) => {
                            if batch.next_offset.is_some() {
                                offset = batch.next_offset;
                            }
                            for update in batch.updates {
                                let relay = self.clone();
                                turns.spawn(async move {
                                    relay.handle_update(update).await;
                                });
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Polling for updates failed, backing off");
                            tokio::select! {
                                _ = &mut shutdown => break,
                                _ = tokio::time::sleep(POLL_BACKOFF) => {}
                            }
                        }
                    }
                    poll = self.transport.poll_updates(offset);
                }
                Some(joined) = turns.join_next(), if !turns.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Turn task failed");
                    }
                }
            }
        }
        drop(poll);

        tracing::info!(in_flight = turns.len(), "Shutting down relay");

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while turns.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                aborted = turns.len(),
                "Turns still running after grace period, aborting"
            );
            turns.abort_all();
        }

        self.conversations.persist().await?;
        tracing::info!("Chat histories saved");

        Ok(())
    }
}
