use serde::{Deserialize, Serialize};

use crate::models::{Message, Reaction};

/// Whether a reaction event adds or removes the reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionAction {
    Add,
    Remove,
}

/// Events sent FROM server TO clients over the WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First frame on every connection
    Hello { message_count: usize },

    /// Full ledger replay, sent once right after `Hello`
    History { messages: Vec<Message> },

    /// A new encrypted message was appended
    Message { message: Message },

    /// A reaction was added to or removed from a message
    Reaction {
        message_id: u64,
        reaction: Reaction,
        action: ReactionAction,
    },

    /// Number of live connections changed
    Presence { connected_clients: usize },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Post an encrypted message. The server stamps it if `timestamp` is absent.
    Message {
        user: String,
        ciphertext: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<String>,
    },

    /// Add (or, with `remove`, take back) a reaction
    Reaction {
        message_id: u64,
        emoji: String,
        user: String,
        #[serde(default)]
        remove: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaction_command_defaults_to_add() {
        let cmd: ClientCommand = serde_json::from_str(
            r#"{"type":"reaction","message_id":3,"emoji":"👍","user":"alice"}"#,
        )
        .unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Reaction {
                message_id: 3,
                emoji: "👍".into(),
                user: "alice".into(),
                remove: false,
            }
        );
    }

    #[test]
    fn message_command_without_timestamp_parses() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"message","user":"bob","ciphertext":"zz"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Message { timestamp: None, .. }));
    }

    #[test]
    fn commands_missing_fields_are_rejected() {
        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"message","user":"bob"}"#).is_err());
        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"reaction","emoji":"x"}"#).is_err());
        assert!(serde_json::from_str::<ClientCommand>(r#"{"type":"typing"}"#).is_err());
    }

    #[test]
    fn reaction_event_wire_shape() {
        let event = ServerEvent::Reaction {
            message_id: 4,
            reaction: Reaction {
                emoji: "🎉".into(),
                user: "carol".into(),
                timestamp: "t".into(),
            },
            action: ReactionAction::Remove,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "reaction");
        assert_eq!(json["action"], "remove");
        assert_eq!(json["reaction"]["user"], "carol");
    }

    #[test]
    fn presence_event_wire_shape() {
        let json = serde_json::to_string(&ServerEvent::Presence { connected_clients: 2 }).unwrap();
        assert_eq!(json, r#"{"type":"presence","connected_clients":2}"#);
    }
}
