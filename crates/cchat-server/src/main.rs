mod config;
mod tls;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use cchat_gateway::relay::Relay;
use cchat_ledger::Ledger;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cchat_server=debug,cchat_gateway=debug,cchat_ledger=info,tower_http=debug".into()
            }),
        )
        .init();

    let _ = tokio_rustls::rustls::crypto::ring::default_provider().install_default();

    let config = ServerConfig::from_env()?;

    // Init ledger
    let ledger = match &config.history_path {
        Some(path) => Ledger::open(path),
        None => {
            info!("No CCHAT_HISTORY_PATH set, history is kept in memory only");
            Ledger::in_memory()
        }
    };

    let app = cchat_gateway::router(Relay::new(ledger)).layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(config.addr).await?;

    match &config.tls {
        Some(paths) => {
            let acceptor = tls::build_tls_acceptor(paths)?;
            info!("cchat server listening on wss://{}", config.addr);
            tls::serve_tls(listener, acceptor, app, shutdown_signal()).await?;
        }
        None => {
            info!("cchat server listening on ws://{}", config.addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
    }

    info!("cchat server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
