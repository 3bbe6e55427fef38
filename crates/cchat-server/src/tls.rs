use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tower::Service;
use tracing::{debug, warn};

use crate::config::TlsPaths;

pub fn build_tls_acceptor(paths: &TlsPaths) -> Result<TlsAcceptor> {
    let cert_pem = std::fs::read(&paths.cert)
        .with_context(|| format!("Failed to read TLS cert: {}", paths.cert.display()))?;
    let key_pem = std::fs::read(&paths.key)
        .with_context(|| format!("Failed to read TLS key: {}", paths.key.display()))?;

    let certs: Vec<_> = rustls_pemfile::certs(&mut &cert_pem[..])
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to parse TLS certificates")?;
    let key = rustls_pemfile::private_key(&mut &key_pem[..])
        .context("Failed to parse TLS private key")?
        .context("No private key found in PEM file")?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("Invalid TLS configuration")?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Accept loop for `wss://`: TLS handshake, then hand the stream to hyper with
/// upgrades enabled so the WebSocket route works.
pub async fn serve_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    app: Router,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    continue;
                }
            },
            _ = &mut shutdown => break,
        };

        let acceptor = acceptor.clone();
        let app = app.clone();
        tokio::spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!("TLS handshake with {} failed: {}", peer, e);
                    return;
                }
            };

            let service = hyper::service::service_fn(move |request: hyper::Request<Incoming>| {
                app.clone().call(request)
            });
            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .serve_connection_with_upgrades(TokioIo::new(stream), service)
                .await
            {
                debug!("Connection from {} ended: {}", peer, e);
            }
        });
    }

    Ok(())
}
