use serde::{Deserialize, Serialize};

/// Timestamp layout used on the wire and in the history file.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Current local time in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// A single emoji reaction. Logically keyed by `(message_id, emoji, user)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub user: String,
    pub timestamp: String,
}

impl Reaction {
    pub fn matches(&self, emoji: &str, user: &str) -> bool {
        self.emoji == emoji && self.user == user
    }
}

/// A chat message as stored by the ledger and sent over the wire.
/// The server only ever sees the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    #[serde(rename = "user")]
    pub author: String,
    pub ciphertext: String,
    pub timestamp: String,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

impl Message {
    pub fn has_reaction(&self, emoji: &str, user: &str) -> bool {
        self.reactions.iter().any(|r| r.matches(emoji, user))
    }

    /// Removes the first reaction with the given key, returning it.
    pub fn take_reaction(&mut self, emoji: &str, user: &str) -> Option<Reaction> {
        let pos = self.reactions.iter().position(|r| r.matches(emoji, user))?;
        Some(self.reactions.remove(pos))
    }
}

/// On-disk snapshot of the ledger, rewritten in full after every mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFile {
    pub next_id: u64,
    #[serde(default)]
    pub messages: Vec<Message>,
}
