use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use cchat_types::events::ClientCommand;

use crate::relay::Relay;

/// Handle a single WebSocket connection until the peer goes away.
///
/// A writer task drains this connection's outbound queue; the receive loop runs
/// here so that a command already being applied is never cancelled halfway.
pub async fn handle_connection(socket: WebSocket, relay: Relay) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut outbound) = match relay.join().await {
        Ok(joined) => joined,
        Err(e) => {
            warn!("Failed to register connection: {}", e);
            return;
        }
    };
    info!("Connection {} joined", conn_id);

    // Forward queued frames (greeting, broadcasts) -> client
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    // Read commands from client
    loop {
        let frame = tokio::select! {
            frame = receiver.next() => frame,
            _ = &mut send_task => {
                debug!("Connection {} write side closed", conn_id);
                break;
            }
        };

        match frame {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(cmd) => handle_command(&relay, conn_id, cmd).await,
                Err(e) => {
                    debug!(
                        "{} dropped malformed frame: {} -- raw: {}",
                        conn_id,
                        e,
                        text.chars().take(200).collect::<String>()
                    );
                }
            },
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!("Connection {} read error: {}", conn_id, e);
                break;
            }
        }
    }

    relay.leave(conn_id).await;
    send_task.abort();
    info!("Connection {} left", conn_id);
}

async fn handle_command(relay: &Relay, conn_id: Uuid, cmd: ClientCommand) {
    match cmd {
        ClientCommand::Message {
            user,
            ciphertext,
            timestamp,
        } => match relay.post_message(user, ciphertext, timestamp).await {
            Ok(Some(message)) => {
                debug!("{} -> message {} from {}", conn_id, message.id, message.author);
            }
            Ok(None) => trace!("{} sent a message with empty fields, dropped", conn_id),
            Err(e) => warn!("{} message not applied: {}", conn_id, e),
        },

        ClientCommand::Reaction {
            message_id,
            emoji,
            user,
            remove,
        } => match relay.react(message_id, emoji, user, remove).await {
            Ok(Some(reaction)) => {
                debug!(
                    "{} -> reaction {} {} by {} on {}",
                    conn_id,
                    if remove { "remove" } else { "add" },
                    reaction.emoji,
                    reaction.user,
                    message_id
                );
            }
            Ok(None) => trace!("{} reaction on {} changed nothing", conn_id, message_id),
            Err(e) => warn!("{} reaction not applied: {}", conn_id, e),
        },
    }
}
