use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use uuid::Uuid;

use cchat_ledger::Ledger;
use cchat_types::events::{ReactionAction, ServerEvent};
use cchat_types::models::{Message, Reaction};

use crate::dispatcher::{Dispatcher, Outbound};

/// Front door to the ledger for every connection.
///
/// Mutations and registrations share one sequencer: a mutation is persisted and
/// its event queued for every connection before the next one starts, and a new
/// connection gets its history snapshot and registry slot in the same step. Each
/// connection therefore sees exactly `snapshot + every later event`.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    ledger: Arc<Ledger>,
    dispatcher: Dispatcher,
    sequencer: Mutex<()>,
}

impl Relay {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                ledger: Arc::new(ledger),
                dispatcher: Dispatcher::new(),
                sequencer: Mutex::new(()),
            }),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.inner.ledger
    }

    /// Register a connection: queue `hello` + `history`, then announce presence.
    pub async fn join(&self) -> Result<(Uuid, Outbound)> {
        let joined = {
            let _seq = self.inner.sequencer.lock().await;
            let messages = self.inner.ledger.snapshot()?;
            let greeting = [
                ServerEvent::Hello {
                    message_count: messages.len(),
                },
                ServerEvent::History { messages },
            ];
            self.inner.dispatcher.register(&greeting).await
        };
        self.broadcast_presence().await;
        Ok(joined)
    }

    pub async fn leave(&self, conn_id: Uuid) {
        if self.inner.dispatcher.unregister(conn_id).await {
            self.broadcast_presence().await;
        }
    }

    pub async fn post_message(
        &self,
        user: String,
        ciphertext: String,
        timestamp: Option<String>,
    ) -> Result<Option<Message>> {
        self.commit(
            move |ledger| ledger.append_message(&user, &ciphertext, timestamp.as_deref()),
            |message| ServerEvent::Message {
                message: message.clone(),
            },
        )
        .await
    }

    /// Add or remove a reaction. Broadcasts only when the ledger actually changed.
    pub async fn react(
        &self,
        message_id: u64,
        emoji: String,
        user: String,
        remove: bool,
    ) -> Result<Option<Reaction>> {
        let action = if remove { ReactionAction::Remove } else { ReactionAction::Add };
        self.commit(
            move |ledger| match action {
                ReactionAction::Add => ledger.add_reaction(message_id, &emoji, &user),
                ReactionAction::Remove => ledger.remove_reaction(message_id, &emoji, &user),
            },
            |reaction| ServerEvent::Reaction {
                message_id,
                reaction: reaction.clone(),
                action,
            },
        )
        .await
    }

    async fn commit<T, F, E>(&self, mutation: F, event: E) -> Result<Option<T>>
    where
        T: Send + 'static,
        F: FnOnce(&Ledger) -> Result<Option<T>> + Send + 'static,
        E: FnOnce(&T) -> ServerEvent,
    {
        let _seq = self.inner.sequencer.lock().await;

        // Persisting touches the filesystem, keep it off the async runtime
        let ledger = self.inner.ledger.clone();
        let outcome = tokio::task::spawn_blocking(move || mutation(ledger.as_ref())).await??;

        if let Some(value) = &outcome {
            let fanout = self.inner.dispatcher.broadcast(&event(value)).await;
            if fanout.evicted > 0 {
                self.broadcast_presence().await;
            }
        }
        Ok(outcome)
    }

    /// Announce the live connection count. Evicting a lagging peer changes the
    /// count again, so repeat until a round evicts nobody.
    async fn broadcast_presence(&self) {
        loop {
            let connected_clients = self.inner.dispatcher.connection_count().await;
            let fanout = self
                .inner
                .dispatcher
                .broadcast(&ServerEvent::Presence { connected_clients })
                .await;
            if fanout.evicted == 0 {
                break;
            }
        }
    }
}
