use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::rustls::{self, RootCertStore};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, connect_async_tls_with_config};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cchat_types::events::{ClientCommand, ServerEvent};

use crate::config::ClientConfig;

/// What the reader task hands to the session loop.
#[derive(Debug)]
pub enum Inbound {
    Event(ServerEvent),
    /// The socket is gone. Carries the close reason or read error, if any.
    Closed(Option<String>),
}

/// A live WebSocket to the relay, split into a reader and a writer task.
pub struct Connection {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    outbound: mpsc::UnboundedSender<ClientCommand>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

pub async fn connect(config: &ClientConfig) -> Result<Connection> {
    let connector = if config.server.starts_with("wss://") {
        Some(tls_connector(config)?)
    } else {
        None
    };

    let (ws, _) = connect_async_tls_with_config(config.server.as_str(), None, false, connector)
        .await
        .with_context(|| format!("Failed to connect to {}", config.server))?;
    info!("Connected to {}", config.server);

    let (mut sink, mut stream) = ws.split();
    let (inbound_tx, inbound) = mpsc::unbounded_channel();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientCommand>();
    let cancel = CancellationToken::new();

    let reader_cancel = cancel.clone();
    let reader = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                frame = stream.next() => frame,
                _ = reader_cancel.cancelled() => return,
            };

            let closed = match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => {
                            if inbound_tx.send(Inbound::Event(event)).is_err() {
                                return;
                            }
                        }
                        Err(e) => debug!("Dropping unparseable server frame: {}", e),
                    }
                    continue;
                }
                Some(Ok(Message::Close(frame))) => {
                    Inbound::Closed(frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty()))
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => Inbound::Closed(Some(e.to_string())),
                None => Inbound::Closed(None),
            };
            let _ = inbound_tx.send(closed);
            return;
        }
    });

    let writer_cancel = cancel.clone();
    let writer = tokio::spawn(async move {
        loop {
            // queued commands go out before a cancellation is honoured
            let cmd = tokio::select! {
                biased;
                cmd = outbound_rx.recv() => cmd,
                _ = writer_cancel.cancelled() => None,
            };
            let Some(cmd) = cmd else {
                let _ = sink.close().await;
                return;
            };

            let json = match serde_json::to_string(&cmd) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to encode command: {}", e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(json.into())).await {
                debug!("Write failed, stopping writer: {}", e);
                return;
            }
        }
    });

    Ok(Connection {
        inbound,
        outbound,
        cancel,
        reader,
        writer,
    })
}

impl Connection {
    pub fn outbound(&self) -> mpsc::UnboundedSender<ClientCommand> {
        self.outbound.clone()
    }

    /// Next event from the server. `None` once the reader is gone and drained.
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.inbound.recv().await
    }

    /// Stop both tasks and wait for them, closing the socket if still open.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.writer.await {
            debug!("Writer task ended abnormally: {}", e);
        }
        if let Err(e) = self.reader.await {
            debug!("Reader task ended abnormally: {}", e);
        }
    }
}

fn tls_connector(config: &ClientConfig) -> Result<Connector> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    if let Some(path) = &config.ca_cert {
        let pem = std::fs::read(path)
            .with_context(|| format!("Failed to read CA cert: {}", path.display()))?;
        for cert in rustls_pemfile::certs(&mut &pem[..]) {
            let cert = cert.context("Failed to parse CA certificate")?;
            roots.add(cert).context("Invalid CA certificate")?;
        }
    }

    let tls = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(Connector::Rustls(Arc::new(tls)))
}
