use anyhow::Result;
use tracing::warn;

use cchat_types::models::{Message, Reaction, now_timestamp};

use crate::Ledger;

impl Ledger {
    // -- Messages --

    /// Append a message, assigning the next id. Returns `None` (and changes
    /// nothing) when `author` or `ciphertext` is empty, or no id is left.
    pub fn append_message(
        &self,
        author: &str,
        ciphertext: &str,
        timestamp: Option<&str>,
    ) -> Result<Option<Message>> {
        if author.is_empty() || ciphertext.is_empty() {
            return Ok(None);
        }

        self.with_state_mut(|state| {
            // the last representable id is never handed out
            let Some(following) = state.next_id.checked_add(1) else {
                warn!("Message ids exhausted, dropping message from {}", author);
                return None;
            };
            let message = Message {
                id: state.next_id,
                author: author.to_string(),
                ciphertext: ciphertext.to_string(),
                timestamp: timestamp
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(now_timestamp),
                reactions: Vec::new(),
            };
            state.next_id = following;
            state.messages.push(message.clone());
            Some(message)
        })
    }

    /// Full current state, in id order, for history replay.
    pub fn snapshot(&self) -> Result<Vec<Message>> {
        self.with_state(|state| state.messages.clone())
    }

    pub fn message_count(&self) -> Result<usize> {
        self.with_state(|state| state.messages.len())
    }

    #[cfg(test)]
    pub(crate) fn next_id(&self) -> Result<u64> {
        self.with_state(|state| state.next_id)
    }

    // -- Reactions --

    /// Add a reaction. Returns `None` when the message does not exist or the
    /// `(message_id, emoji, user)` key is already present.
    pub fn add_reaction(&self, message_id: u64, emoji: &str, user: &str) -> Result<Option<Reaction>> {
        if emoji.is_empty() || user.is_empty() {
            return Ok(None);
        }

        self.with_state_mut(|state| {
            let message = state.find_mut(message_id)?;
            if message.has_reaction(emoji, user) {
                return None;
            }
            let reaction = Reaction {
                emoji: emoji.to_string(),
                user: user.to_string(),
                timestamp: now_timestamp(),
            };
            message.reactions.push(reaction.clone());
            Some(reaction)
        })
    }

    /// Remove the first reaction matching the key. Returns the removed
    /// reaction, or `None` if nothing matched.
    pub fn remove_reaction(&self, message_id: u64, emoji: &str, user: &str) -> Result<Option<Reaction>> {
        self.with_state_mut(|state| state.find_mut(message_id)?.take_reaction(emoji, user))
    }
}
