use cchat_types::events::ReactionAction;
use cchat_types::models::{Message, Reaction};

/// Client-side replica of the ledger, in arrival (= id) order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mirror {
    messages: Vec<Message>,
}

impl Mirror {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn index_of(&self, message_id: u64) -> Option<usize> {
        self.messages.binary_search_by_key(&message_id, |m| m.id).ok()
    }

    pub fn get(&self, message_id: u64) -> Option<&Message> {
        self.index_of(message_id).map(|i| &self.messages[i])
    }

    /// Replace everything with a history replay.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Append a live message. Returns its index, or `None` when the id is not
    /// newer than what the mirror already holds (a replayed duplicate).
    pub fn push(&mut self, message: Message) -> Option<usize> {
        if self.messages.last().is_some_and(|last| last.id >= message.id) {
            return None;
        }
        self.messages.push(message);
        Some(self.messages.len() - 1)
    }

    /// Fold a reaction event in. Returns whether anything changed; unknown
    /// messages and already-applied events are no-ops.
    pub fn apply_reaction(&mut self, message_id: u64, reaction: Reaction, action: ReactionAction) -> bool {
        let Some(i) = self.index_of(message_id) else {
            return false;
        };
        let message = &mut self.messages[i];
        match action {
            ReactionAction::Add => {
                if message.has_reaction(&reaction.emoji, &reaction.user) {
                    return false;
                }
                message.reactions.push(reaction);
                true
            }
            ReactionAction::Remove => message.take_reaction(&reaction.emoji, &reaction.user).is_some(),
        }
    }

    pub fn has_reaction(&self, message_id: u64, emoji: &str, user: &str) -> bool {
        self.get(message_id).is_some_and(|m| m.has_reaction(emoji, user))
    }
}
