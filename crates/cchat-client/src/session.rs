use tokio::sync::mpsc;
use tracing::{debug, warn};

use cchat_crypto::CipherBundle;
use cchat_types::events::{ClientCommand, ReactionAction, ServerEvent};
use cchat_types::models::{Message, Reaction, now_timestamp};

use crate::mirror::Mirror;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("could not encrypt message: {0}")]
    Encrypt(String),
    #[error("not connected")]
    Disconnected,
}

/// What folding one server event into the mirror did, for the view layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Hello { message_count: usize },
    History { len: usize },
    Message { index: usize, from_self: bool },
    /// A live message the mirror already had
    Duplicate { message_id: u64 },
    Reaction {
        message_id: u64,
        reaction: Reaction,
        action: ReactionAction,
        changed: bool,
    },
    Presence { connected_clients: usize },
}

/// One connection's worth of client state: the mirror plus the outbound path.
///
/// Server events are the ground truth; local sends never touch the mirror.
pub struct ClientSession {
    user: String,
    cipher: CipherBundle,
    mirror: Mirror,
    outbound: mpsc::UnboundedSender<ClientCommand>,
    expected_history: Option<usize>,
    connected_clients: usize,
}

impl ClientSession {
    pub fn new(
        user: String,
        cipher: CipherBundle,
        outbound: mpsc::UnboundedSender<ClientCommand>,
    ) -> Self {
        Self {
            user,
            cipher,
            mirror: Mirror::default(),
            outbound,
            expected_history: None,
            connected_clients: 0,
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn cipher(&self) -> &CipherBundle {
        &self.cipher
    }

    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    pub fn connected_clients(&self) -> usize {
        self.connected_clients
    }

    /// Encrypt and queue a message. Returns as soon as the frame is queued.
    pub fn send_message(&self, text: &str) -> Result<(), SendError> {
        let ciphertext = self
            .cipher
            .encrypt_text(text)
            .map_err(|e| SendError::Encrypt(e.to_string()))?;
        self.send(ClientCommand::Message {
            user: self.user.clone(),
            ciphertext,
            timestamp: Some(now_timestamp()),
        })
    }

    /// Toggle our `emoji` reaction on a message, judged from the local mirror.
    /// Returns `true` when a removal was requested.
    pub fn send_reaction(&self, message_id: u64, emoji: &str) -> Result<bool, SendError> {
        let remove = self.mirror.has_reaction(message_id, emoji, &self.user);
        self.send(ClientCommand::Reaction {
            message_id,
            emoji: emoji.to_string(),
            user: self.user.clone(),
            remove,
        })?;
        Ok(remove)
    }

    fn send(&self, cmd: ClientCommand) -> Result<(), SendError> {
        self.outbound.send(cmd).map_err(|_| SendError::Disconnected)
    }

    /// Fold one server event into the mirror, in arrival order.
    pub fn apply(&mut self, event: ServerEvent) -> Applied {
        match event {
            ServerEvent::Hello { message_count } => {
                self.expected_history = Some(message_count);
                Applied::Hello { message_count }
            }
            ServerEvent::History { messages } => self.on_history(messages),
            ServerEvent::Message { message } => self.on_message(message),
            ServerEvent::Reaction {
                message_id,
                reaction,
                action,
            } => self.on_reaction(message_id, reaction, action),
            ServerEvent::Presence { connected_clients } => {
                self.connected_clients = connected_clients;
                Applied::Presence { connected_clients }
            }
        }
    }

    pub fn on_history(&mut self, messages: Vec<Message>) -> Applied {
        if let Some(expected) = self.expected_history.take() {
            if expected != messages.len() {
                warn!(
                    "Server announced {} messages but replayed {}",
                    expected,
                    messages.len()
                );
            }
        }
        if !self.mirror.is_empty() {
            debug!("History replay replaces {} mirrored messages", self.mirror.len());
        }
        let len = messages.len();
        self.mirror.replace(messages);
        Applied::History { len }
    }

    pub fn on_message(&mut self, message: Message) -> Applied {
        let message_id = message.id;
        let from_self = message.author == self.user;
        match self.mirror.push(message) {
            Some(index) => Applied::Message { index, from_self },
            None => {
                debug!("Ignoring already mirrored message {}", message_id);
                Applied::Duplicate { message_id }
            }
        }
    }

    pub fn on_reaction(&mut self, message_id: u64, reaction: Reaction, action: ReactionAction) -> Applied {
        let changed = self.mirror.apply_reaction(message_id, reaction.clone(), action);
        if !changed {
            debug!("Reaction event for message {} changed nothing", message_id);
        }
        Applied::Reaction {
            message_id,
            reaction,
            action,
            changed,
        }
    }
}
