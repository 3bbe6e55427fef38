//! End-to-end relay tests: the real router on a loopback port, driven by
//! WebSocket clients.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use cchat_gateway::relay::Relay;
use cchat_ledger::Ledger;
use cchat_types::events::{ClientCommand, ReactionAction, ServerEvent};
use cchat_types::models::{HistoryFile, Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(relay: Relay) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, cchat_gateway::router(relay)).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{}/", addr)).await.unwrap();
    ws
}

async fn next_event(ws: &mut Client) -> ServerEvent {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for server event")
            .expect("stream ended")
            .unwrap();
        if let WsMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Next event that is not a presence update.
async fn next_content(ws: &mut Client) -> ServerEvent {
    loop {
        match next_event(ws).await {
            ServerEvent::Presence { .. } => continue,
            event => return event,
        }
    }
}

/// Consume hello + history and return the replayed messages.
async fn handshake(ws: &mut Client) -> Vec<Message> {
    assert!(matches!(next_event(ws).await, ServerEvent::Hello { .. }));
    match next_event(ws).await {
        ServerEvent::History { messages } => messages,
        other => panic!("expected history, got {:?}", other),
    }
}

async fn send(ws: &mut Client, cmd: &ClientCommand) {
    let json = serde_json::to_string(cmd).unwrap();
    ws.send(WsMessage::Text(json.into())).await.unwrap();
}

fn post(user: &str, ciphertext: &str) -> ClientCommand {
    ClientCommand::Message {
        user: user.into(),
        ciphertext: ciphertext.into(),
        timestamp: None,
    }
}

fn react(message_id: u64, emoji: &str, user: &str, remove: bool) -> ClientCommand {
    ClientCommand::Reaction {
        message_id,
        emoji: emoji.into(),
        user: user.into(),
        remove,
    }
}

#[tokio::test]
async fn handshake_sends_hello_then_history() {
    let ledger = Ledger::in_memory();
    ledger.append_message("alice", "one", None).unwrap();
    ledger.append_message("bob", "two", None).unwrap();
    let addr = spawn_server(Relay::new(ledger)).await;

    let mut ws = connect(addr).await;
    assert_eq!(next_event(&mut ws).await, ServerEvent::Hello { message_count: 2 });
    match next_event(&mut ws).await {
        ServerEvent::History { messages } => {
            let ids: Vec<u64> = messages.iter().map(|m| m.id).collect();
            assert_eq!(ids, vec![1, 2]);
        }
        other => panic!("expected history, got {:?}", other),
    }
    assert_eq!(next_event(&mut ws).await, ServerEvent::Presence { connected_clients: 1 });
}

#[tokio::test]
async fn messages_fan_out_to_every_client() {
    let addr = spawn_server(Relay::new(Ledger::in_memory())).await;
    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    handshake(&mut alice).await;
    handshake(&mut bob).await;

    send(&mut alice, &post("alice", "c1")).await;

    for ws in [&mut alice, &mut bob] {
        match next_content(ws).await {
            ServerEvent::Message { message } => {
                assert_eq!(message.id, 1);
                assert_eq!(message.author, "alice");
                assert_eq!(message.ciphertext, "c1");
                assert!(!message.timestamp.is_empty());
            }
            other => panic!("expected message, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn duplicate_reactions_are_not_rebroadcast() {
    let addr = spawn_server(Relay::new(Ledger::in_memory())).await;
    let mut alice = connect(addr).await;
    handshake(&mut alice).await;

    send(&mut alice, &post("alice", "c1")).await;
    send(&mut alice, &react(1, "👍", "bob", false)).await;
    send(&mut alice, &react(1, "👍", "bob", false)).await;
    send(&mut alice, &react(1, "👍", "bob", true)).await;
    send(&mut alice, &react(1, "👍", "bob", true)).await;
    send(&mut alice, &post("alice", "marker")).await;

    assert!(matches!(next_content(&mut alice).await, ServerEvent::Message { .. }));
    match next_content(&mut alice).await {
        ServerEvent::Reaction { message_id, reaction, action } => {
            assert_eq!(message_id, 1);
            assert_eq!(reaction.emoji, "👍");
            assert_eq!(action, ReactionAction::Add);
        }
        other => panic!("expected reaction add, got {:?}", other),
    }
    match next_content(&mut alice).await {
        ServerEvent::Reaction { action, .. } => assert_eq!(action, ReactionAction::Remove),
        other => panic!("expected reaction remove, got {:?}", other),
    }
    match next_content(&mut alice).await {
        ServerEvent::Message { message } => assert_eq!(message.ciphertext, "marker"),
        other => panic!("expected marker message, got {:?}", other),
    }
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let addr = spawn_server(Relay::new(Ledger::in_memory())).await;
    let mut ws = connect(addr).await;
    handshake(&mut ws).await;

    ws.send(WsMessage::Text("not json".into())).await.unwrap();
    ws.send(WsMessage::Text(r#"{"type":"message","user":"a"}"#.into())).await.unwrap();
    ws.send(WsMessage::Text(r#"{"type":"nope"}"#.into())).await.unwrap();
    ws.send(WsMessage::Binary(vec![1u8, 2, 3].into())).await.unwrap();
    send(&mut ws, &post("", "empty author")).await;
    send(&mut ws, &post("alice", "still here")).await;

    match next_content(&mut ws).await {
        ServerEvent::Message { message } => {
            assert_eq!(message.id, 1);
            assert_eq!(message.ciphertext, "still here");
        }
        other => panic!("expected message, got {:?}", other),
    }
}

#[tokio::test]
async fn presence_tracks_connects_and_disconnects() {
    let addr = spawn_server(Relay::new(Ledger::in_memory())).await;
    let mut alice = connect(addr).await;
    handshake(&mut alice).await;
    assert_eq!(next_event(&mut alice).await, ServerEvent::Presence { connected_clients: 1 });

    let mut bob = connect(addr).await;
    handshake(&mut bob).await;
    assert_eq!(next_event(&mut alice).await, ServerEvent::Presence { connected_clients: 2 });

    bob.close(None).await.unwrap();
    assert_eq!(next_event(&mut alice).await, ServerEvent::Presence { connected_clients: 1 });
}

#[tokio::test]
async fn late_joiner_replays_the_ledger() {
    let relay = Relay::new(Ledger::in_memory());
    let addr = spawn_server(relay.clone()).await;
    let mut alice = connect(addr).await;
    handshake(&mut alice).await;

    send(&mut alice, &post("alice", "c1")).await;
    send(&mut alice, &post("alice", "c2")).await;
    send(&mut alice, &react(2, "🎉", "alice", false)).await;
    for _ in 0..3 {
        next_content(&mut alice).await;
    }

    let mut bob = connect(addr).await;
    let replay = handshake(&mut bob).await;
    assert_eq!(replay, relay.ledger().snapshot().unwrap());
    assert_eq!(replay[1].reactions.len(), 1);

    send(&mut alice, &post("alice", "c3")).await;
    match next_content(&mut bob).await {
        ServerEvent::Message { message } => assert_eq!(message.id, 3),
        other => panic!("expected message, got {:?}", other),
    }
}

#[tokio::test]
async fn restart_from_history_file_continues_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    let seeded = Ledger::in_memory();
    seeded.append_message("alice", "one", None).unwrap();
    seeded.append_message("bob", "two", None).unwrap();
    let file = HistoryFile {
        next_id: 3,
        messages: seeded.snapshot().unwrap(),
    };
    std::fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

    let addr = spawn_server(Relay::new(Ledger::open(&path))).await;
    let mut ws = connect(addr).await;
    assert_eq!(handshake(&mut ws).await.len(), 2);

    send(&mut ws, &post("carol", "three")).await;
    match next_content(&mut ws).await {
        ServerEvent::Message { message } => assert_eq!(message.id, 3),
        other => panic!("expected message, got {:?}", other),
    }
}
