use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use cchat_types::events::ServerEvent;

/// Receiving half of a connection's outbound queue, drained by its writer task.
pub type Outbound = mpsc::Receiver<Utf8Bytes>;

/// Frames a connection may have queued before it counts as lagging.
pub const OUTBOUND_CAPACITY: usize = 256;

/// Result of one fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fanout {
    pub delivered: usize,
    /// Connections dropped from the registry because their queue was full.
    pub evicted: usize,
}

/// Tracks live connections and fans events out to them.
#[derive(Clone, Default)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

#[derive(Default)]
struct DispatcherInner {
    /// Per-connection outbound queues: conn_id -> sender
    connections: RwLock<HashMap<Uuid, mpsc::Sender<Utf8Bytes>>>,
}

/// Serialize an event into a text frame.
pub fn encode(event: &ServerEvent) -> Option<Utf8Bytes> {
    match serde_json::to_string(event) {
        Ok(json) => Some(json.into()),
        Err(e) => {
            warn!("Failed to encode event: {}", e);
            None
        }
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. `greeting` is queued ahead of anything broadcast
    /// after this call returns. Returns (conn_id, outbound queue).
    pub async fn register(&self, greeting: &[ServerEvent]) -> (Uuid, Outbound) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY.max(greeting.len()));
        for frame in greeting.iter().filter_map(encode) {
            let _ = tx.try_send(frame);
        }
        self.inner.connections.write().await.insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Remove a connection. Returns false if it was already gone.
    pub async fn unregister(&self, conn_id: Uuid) -> bool {
        self.inner.connections.write().await.remove(&conn_id).is_some()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    /// Queue an event for every live connection. The event is serialized once;
    /// a closed queue is skipped without affecting the others. A connection whose
    /// queue is full is removed from the registry, which closes its queue once
    /// the writer drains it.
    pub async fn broadcast(&self, event: &ServerEvent) -> Fanout {
        let mut fanout = Fanout::default();
        let mut lagging = Vec::new();
        {
            let connections = self.inner.connections.read().await;
            if connections.is_empty() {
                return fanout;
            }
            let Some(frame) = encode(event) else {
                return fanout;
            };

            for (conn_id, tx) in connections.iter() {
                match tx.try_send(frame.clone()) {
                    Ok(()) => fanout.delivered += 1,
                    Err(TrySendError::Full(_)) => lagging.push(*conn_id),
                    Err(TrySendError::Closed(_)) => {
                        debug!("Connection {} already closed, skipping", conn_id)
                    }
                }
            }
        }

        if !lagging.is_empty() {
            let mut connections = self.inner.connections.write().await;
            for conn_id in lagging {
                if connections.remove(&conn_id).is_some() {
                    warn!("Connection {} is not reading, dropping it", conn_id);
                    fanout.evicted += 1;
                }
            }
        }
        fanout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_event(frame: Utf8Bytes) -> ServerEvent {
        serde_json::from_str(frame.as_str()).unwrap()
    }

    #[tokio::test]
    async fn greeting_is_queued_before_broadcasts() {
        let dispatcher = Dispatcher::new();
        let (_, mut rx) = dispatcher
            .register(&[ServerEvent::Hello { message_count: 0 }])
            .await;
        dispatcher.broadcast(&ServerEvent::Presence { connected_clients: 1 }).await;

        assert_eq!(frame_event(rx.recv().await.unwrap()), ServerEvent::Hello { message_count: 0 });
        assert_eq!(
            frame_event(rx.recv().await.unwrap()),
            ServerEvent::Presence { connected_clients: 1 }
        );
    }

    #[tokio::test]
    async fn broadcast_skips_dead_connections() {
        let dispatcher = Dispatcher::new();
        let (_, dead) = dispatcher.register(&[]).await;
        let (_, mut live) = dispatcher.register(&[]).await;
        drop(dead);

        let event = ServerEvent::Presence { connected_clients: 2 };
        assert_eq!(dispatcher.broadcast(&event).await.delivered, 1);
        assert_eq!(frame_event(live.recv().await.unwrap()), event);
    }

    #[tokio::test]
    async fn broadcast_to_empty_registry_is_noop() {
        let dispatcher = Dispatcher::new();
        assert_eq!(
            dispatcher.broadcast(&ServerEvent::Presence { connected_clients: 0 }).await,
            Fanout::default()
        );
    }

    #[tokio::test]
    async fn unregister_closes_queue() {
        let dispatcher = Dispatcher::new();
        let (id, mut rx) = dispatcher.register(&[]).await;
        assert_eq!(dispatcher.connection_count().await, 1);
        assert!(dispatcher.unregister(id).await);
        assert!(!dispatcher.unregister(id).await);
        assert_eq!(dispatcher.connection_count().await, 0);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn lagging_connection_is_evicted_alone() {
        let dispatcher = Dispatcher::new();
        let (_, _stalled) = dispatcher.register(&[]).await;
        let (_, mut live) = dispatcher.register(&[]).await;

        let event = ServerEvent::Presence { connected_clients: 2 };
        let mut evicted = 0;
        for _ in 0..=OUTBOUND_CAPACITY {
            let fanout = dispatcher.broadcast(&event).await;
            evicted += fanout.evicted;
            // keep the live peer drained
            assert_eq!(frame_event(live.recv().await.unwrap()), event);
        }

        assert_eq!(evicted, 1);
        assert_eq!(dispatcher.connection_count().await, 1);
        assert_eq!(dispatcher.broadcast(&event).await.delivered, 1);
    }
}
