//! In-memory ledger contents. Distinct from the on-disk `HistoryFile` so the
//! `next_id` rules on load live in one place.

use cchat_types::models::{HistoryFile, Message};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerState {
    pub next_id: u64,
    pub messages: Vec<Message>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            next_id: 1,
            messages: Vec::new(),
        }
    }
}

impl LedgerState {
    /// Seed from a loaded snapshot. With messages present the next id is
    /// `max(id) + 1`; otherwise the stored value is kept (never below 1).
    /// `HistoryStore::load` rejects files whose ids would overflow.
    pub fn from_history(file: HistoryFile) -> Self {
        let next_id = match file.messages.iter().map(|m| m.id).max() {
            Some(max_id) => max_id.saturating_add(1),
            None => file.next_id.max(1),
        };
        Self {
            next_id,
            messages: file.messages,
        }
    }

    pub fn to_history(&self) -> HistoryFile {
        HistoryFile {
            next_id: self.next_id,
            messages: self.messages.clone(),
        }
    }

    pub fn find(&self, message_id: u64) -> Option<&Message> {
        // IDs are sorted, so binary search by id.
        self.messages
            .binary_search_by_key(&message_id, |m| m.id)
            .ok()
            .map(|i| &self.messages[i])
    }

    pub fn find_mut(&mut self, message_id: u64) -> Option<&mut Message> {
        self.messages
            .binary_search_by_key(&message_id, |m| m.id)
            .ok()
            .map(|i| &mut self.messages[i])
    }
}
