//! WebSocket relay: connection registry, fan-out, and the per-connection
//! protocol loop in front of the message ledger.

pub mod connection;
pub mod dispatcher;
pub mod relay;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::relay::Relay;

/// Router serving the relay's WebSocket endpoint at `/`.
pub fn router(relay: Relay) -> Router {
    Router::new().route("/", get(ws_upgrade)).with_state(relay)
}

async fn ws_upgrade(State(relay): State<Relay>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, relay))
}
